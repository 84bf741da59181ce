//! # Error Handling
//!
//! Error types for VDataBProt operations.
//!
//! Four conditions are part of the public contract and callers are expected
//! to match on them:
//!
//! - `VectorNotFound`: read of an id that was never written
//! - `CorruptPayload`: the compressed payload can no longer be decompressed
//! - `IntegrityViolation`: the payload decompresses but hashes to the wrong fingerprint
//! - `SelfLinkRejected`: a link whose source and target are the same id
//!
//! Everything else is plumbing (I/O, serialization, configuration).

use thiserror::Error;

/// Result type alias for VDataBProt operations
pub type Result<T> = std::result::Result<T, Error>;

/// Primary error type for VDataBProt
#[derive(Error, Debug)]
pub enum Error {
    // Access errors
    #[error("Vector not found: {id}")]
    VectorNotFound { id: String },

    #[error("Corrupt payload: {message}")]
    CorruptPayload { message: String },

    #[error("Integrity violation for {id}: expected fingerprint {expected}, got {actual}")]
    IntegrityViolation {
        id: String,
        expected: String,
        actual: String,
    },

    // Link graph errors
    #[error("Self link rejected for {id}")]
    SelfLinkRejected { id: String },

    // Storage errors
    #[error("Record log corruption in {path}: {message}")]
    LogCorruption { path: String, message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Compression failed: {message}")]
    Compression { message: String },

    // System errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        source: std::io::Error,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::VectorNotFound { .. } => true,
            Error::SelfLinkRejected { .. } => true,
            Error::CorruptPayload { .. } => false,
            Error::IntegrityViolation { .. } => false,
            Error::LogCorruption { .. } => false,
            Error::Io { .. } => false,
            _ => true,
        }
    }

    /// True for the two data-loss conditions a patrol counts as corruption
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::CorruptPayload { .. } | Error::IntegrityViolation { .. }
        )
    }

    /// Get error code for monitoring
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::VectorNotFound { .. } => "VECTOR_NOT_FOUND",
            Error::CorruptPayload { .. } => "CORRUPT_PAYLOAD",
            Error::IntegrityViolation { .. } => "INTEGRITY_VIOLATION",
            Error::SelfLinkRejected { .. } => "SELF_LINK_REJECTED",
            Error::LogCorruption { .. } => "LOG_CORRUPTION",
            Error::Serialization { .. } => "SERIALIZATION_ERROR",
            Error::Compression { .. } => "COMPRESSION_ERROR",
            Error::Io { .. } => "IO_ERROR",
            Error::Configuration { .. } => "CONFIG_ERROR",
            Error::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

/// Extension trait for adding context to results
pub trait ResultExt<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| match e {
            Error::Io { message, source } => Error::Io {
                message: format!("{}: {}", f(), message),
                source,
            },
            other => Error::Internal {
                message: format!("{}: {}", f(), other),
            },
        })
    }
}
