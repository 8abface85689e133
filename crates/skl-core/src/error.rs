//! Error types for skl.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level result type for skl operations.
pub type Result<T> = std::result::Result<T, SklError>;

/// Top-level error type for skl.
#[derive(Debug, Error)]
pub enum SklError {
    #[error("timed out after {timeout_ms}ms waiting for lock on {}", path.display())]
    LockTimeout { path: PathBuf, timeout_ms: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl SklError {
    /// Whether this error came from lock contention rather than I/O or input.
    #[must_use]
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_display_human_readable_messages() {
        let err = SklError::LockTimeout {
            path: PathBuf::from("/tmp/skills/app/modules"),
            timeout_ms: 5000,
        };
        let msg = err.to_string();
        assert!(msg.contains("5000ms"));
        assert!(msg.contains("/tmp/skills/app/modules"));
        assert!(err.is_lock_timeout());

        let err = SklError::Config("unknown field `foo`".to_string());
        assert!(err.to_string().contains("foo"));
        assert!(!err.is_lock_timeout());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: SklError = io.into();
        assert!(matches!(err, SklError::Io(_)));
    }
}
