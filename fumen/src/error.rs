use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the `fumen` crate's codec and façade (§7 of the spec).
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{context} truncated")]
    Truncated { context: &'static str },
    #[error("unknown note type_id {type_id}")]
    UnknownNoteKind { type_id: u16 },
    #[error("{context} out of range: {value}")]
    LengthOverflow { context: &'static str, value: i64 },
    #[error(transparent)]
    Tja(#[from] tja::Error),
}
