use std::fmt;

use crate::model::Source;

#[derive(Debug)]
pub enum LinkError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (unknown field, bad fraction, etc.).
    ConfigValidation(String),
    /// A required mediated field cannot be derived from the source schema.
    Schema { source: Source, column: String },
    /// Source-local id parse failure.
    IdParse { source: Source, value: String },
    /// Source-local id appears more than once within a source.
    DuplicateId { source: Source, id: u64 },
    /// Fewer labeled match pairs than the trained classifier needs.
    TrainingInsufficient { needed: usize, got: usize },
    /// IO error (file read, CSV decode, etc.).
    Io(String),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Schema { source, column } => {
                write!(f, "source '{source}': cannot derive mediated field from column '{column}'")
            }
            Self::IdParse { source, value } => {
                write!(f, "source '{source}': cannot parse record id '{value}'")
            }
            Self::DuplicateId { source, id } => {
                write!(f, "source '{source}': duplicate record id {id}")
            }
            Self::TrainingInsufficient { needed, got } => {
                write!(f, "insufficient labeled data: need {needed} pairs, got {got}")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for LinkError {}
