//! CLI Exit Code Registry
//!
//! Single source of truth for all CLI exit codes. Exit codes are part of
//! the shell contract — scripts rely on them.
//!
//! | Code | Meaning                                           |
//! |------|---------------------------------------------------|
//! | 0    | Success                                           |
//! | 1    | General error (unspecified)                       |
//! | 2    | CLI usage error (bad args, missing file)          |
//! | 3    | Invalid linkage config                            |
//! | 4    | Runtime error (IO, schema, bad input data)        |
//! | 5    | Insufficient labeled data for the trained path    |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Runtime failure: unreadable input, schema mismatch, bad ids.
pub const EXIT_RUNTIME: u8 = 4;

/// The trained classifier had too few labeled pairs to fit.
/// The rule classifier remains available as a fallback.
pub const EXIT_TRAINING: u8 = 5;
