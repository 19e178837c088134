//! Error types for colv.
//!
//! Library code returns [`Result`], the binary wraps it in `anyhow` for context.
//! Cancellation is reported as an error so that `?` unwinds a long scan without
//! touching any cursor state on the way out.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for colv operations.
#[derive(Error, Debug)]
pub enum ColvError {
    /// File system or stream I/O failure
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Path is not a regular file: {path}")]
    NotAFile { path: PathBuf },

    /// Memory mapping of a file or spill store failed
    #[error("Memory mapping failed: {message}")]
    MemoryMappingError { message: String },

    #[error("Compression error: {message}")]
    CompressionError { message: String },

    /// A user supplied pattern (search, split, ignore, highlight) did not compile
    #[error("Invalid pattern '{pattern}': {message}")]
    PatternError { pattern: String, message: String },

    /// A long running operation was interrupted through its cancel token
    #[error("Operation interrupted")]
    Cancelled,

    #[error("UI operation failed: {message}")]
    UIError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Invalid navigation argument, rule syntax or command line value
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

/// Standard Result type for colv operations.
pub type Result<T> = std::result::Result<T, ColvError>;

impl ColvError {
    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    pub fn memory_mapping(message: impl Into<String>) -> Self {
        Self::MemoryMappingError {
            message: message.into(),
        }
    }

    pub fn compression(message: impl Into<String>) -> Self {
        Self::CompressionError {
            message: message.into(),
        }
    }

    pub fn pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PatternError {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    pub fn ui(message: impl Into<String>) -> Self {
        Self::UIError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// True when the error only reports an interrupted operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<std::io::Error> for ColvError {
    fn from(err: std::io::Error) -> Self {
        let message = match err.kind() {
            std::io::ErrorKind::NotFound => "File not found",
            std::io::ErrorKind::PermissionDenied => "Permission denied",
            _ => "IO operation failed",
        };
        Self::FileError {
            message: message.to_string(),
            source: err,
        }
    }
}

impl From<regex::Error> for ColvError {
    fn from(err: regex::Error) -> Self {
        Self::PatternError {
            pattern: String::new(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ColvError::file_error(
            "Failed to open file",
            std::io::Error::new(std::io::ErrorKind::NotFound, "No such file"),
        );
        assert_eq!(
            error.to_string(),
            "File operation failed: Failed to open file"
        );

        let error = ColvError::pattern("(", "unclosed group");
        assert_eq!(error.to_string(), "Invalid pattern '(': unclosed group");

        let error = ColvError::FileNotFound {
            path: PathBuf::from("/missing.log"),
        };
        assert_eq!(error.to_string(), "File not found: /missing.log");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error: ColvError = io_error.into();
        match error {
            ColvError::FileError { message, .. } => assert_eq!(message, "Permission denied"),
            _ => panic!("expected FileError"),
        }
    }

    #[test]
    fn test_cancelled_is_distinguishable() {
        assert!(ColvError::Cancelled.is_cancelled());
        assert!(!ColvError::ui("boom").is_cancelled());
        assert_eq!(ColvError::Cancelled.to_string(), "Operation interrupted");
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;

        let error = ColvError::file_error(
            "Read failed",
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"),
        );
        assert!(error.source().is_some());
        assert!(ColvError::invalid_argument("bad").source().is_none());
    }
}
