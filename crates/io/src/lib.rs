// File I/O - CSV ingestion into the mediated schema, labeled-pair export

pub mod export;
pub mod loader;

pub use export::export_labeled;
pub use loader::{build_store, load_source, LoadedSource};
