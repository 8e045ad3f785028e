use std::path::PathBuf;

use thiserror::Error;

use crate::format::FormatError;

/// The one error type every store operation returns.
///
/// Expected caller mistakes (duplicate names, unknown profiles) are not errors;
/// those operations return `bool`.
#[derive(Error, Debug)]
pub enum StorageError {
    /// File system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file that does not decode as what was written to it.
    #[error("corrupt data in {path}: {source}")]
    Corrupt {
        /// File that failed to decode.
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    /// A name that cannot identify an assessor or query set.
    #[error("invalid name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },
}

impl StorageError {
    /// Maps a decode failure on `path`: I/O stays I/O, anything else is corruption.
    pub fn decode(path: impl Into<PathBuf>, source: FormatError) -> Self {
        match source {
            FormatError::Io(err) => StorageError::Io(err),
            source => StorageError::Corrupt {
                path: path.into(),
                source,
            },
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, StorageError::Corrupt { .. })
    }
}

/// Convenience result type for store operations.
pub type StorageResult<T> = Result<T, StorageError>;
