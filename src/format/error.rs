//! Text format error types.

use thiserror::Error;

/// Errors raised while decoding a key=value file.
///
/// Every variant except [`FormatError::Io`] means the file content is not what the
/// writer produced; callers treat those as corruption and do not retry.
#[derive(Error, Debug)]
pub enum FormatError {
    /// I/O error from the underlying reader.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file ended before the expected key.
    #[error("unexpected end of file, expected '{expected}'")]
    UnexpectedEof { expected: &'static str },

    /// A key other than the expected one was found.
    #[error("line {line}: expected key '{expected}', found '{found}'")]
    UnexpectedKey {
        line: usize,
        expected: &'static str,
        found: String,
    },

    /// A line without `=` or with a broken escape sequence.
    #[error("line {line}: malformed entry")]
    MalformedLine { line: usize },

    /// A value that does not parse as the expected type.
    #[error("line {line}: invalid value for '{key}': '{value}'")]
    InvalidValue {
        line: usize,
        key: &'static str,
        value: String,
    },

    /// Entries that parse individually but contradict each other.
    #[error("inconsistent entry: {0}")]
    Inconsistent(&'static str),

    /// A digest that is not the expected number of hex characters.
    #[error("invalid digest '{value}'")]
    InvalidDigest { value: String },
}

/// Convenience result type for format operations.
pub type FormatResult<T> = Result<T, FormatError>;
