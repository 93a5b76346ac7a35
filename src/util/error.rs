//! Error types for emcore.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for emcore operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Type name not present in the registry
    #[error("Unknown type: '{0}'")]
    UnknownType(String),

    /// A value could not be coerced into the requested type
    #[error("Cannot convert '{value}' to {target}")]
    Conversion { value: String, target: String },

    /// No backend registered for a format id or extension
    #[error("Unsupported format: '{0}'")]
    UnsupportedFormat(String),

    /// Header or payload does not match the expected layout
    #[error("Corrupt file {path}: {reason}")]
    CorruptFile { path: PathBuf, reason: String },

    /// A data line does not match its block header
    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    /// Stack or row index outside bounds
    #[error("Index {index} out of range (count: {count})")]
    IndexOutOfRange { index: usize, count: usize },

    /// Column name or id already present
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// Column name or id not present
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Named block not present in a table file
    #[error("Unknown table: '{0}'")]
    UnknownTable(String),

    /// Typed access with the wrong element type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Element-wise operation on arrays of different shape
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// Type cannot be stored by a container or a format backend
    #[error("Unsupported type '{ty}' for {context}")]
    UnsupportedType { ty: String, context: String },

    /// Invalid argument passed by the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation requires an open file session
    #[error("No file is open")]
    NotOpen,

    /// Write attempted on a session opened read-only
    #[error("File opened read-only: {0}")]
    ReadOnly(PathBuf),

    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a conversion error.
    pub fn conversion(value: impl ToString, target: impl ToString) -> Self {
        Self::Conversion {
            value: value.to_string(),
            target: target.to_string(),
        }
    }

    /// Create a corrupt file error.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Result type alias for emcore operations.
pub type Result<T> = std::result::Result<T, Error>;
