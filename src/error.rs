// MIT License - Copyright (c) 2026 Peter Wright
// Error types

/// All errors that can occur in the envisalink-tpi library.
#[derive(Debug, thiserror::Error)]
pub enum TpiError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed frame {frame:?}: {reason}")]
    MalformedFrame { frame: String, reason: String },

    #[error("Not connected")]
    NotConnected,

    #[error("A session is already active")]
    AlreadyConnected,

    #[error("Invalid command table: {details}")]
    CommandTable { details: String },

    #[error("Invalid configuration: {details}")]
    InvalidConfig { details: String },
}

impl TpiError {
    /// Build a [`TpiError::MalformedFrame`] for the given frame.
    pub fn malformed(frame: &str, reason: impl Into<String>) -> Self {
        TpiError::MalformedFrame {
            frame: frame.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error is transient and the connection should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TpiError::Io(_) | TpiError::NotConnected)
    }
}

pub type Result<T> = std::result::Result<T, TpiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let io = TpiError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert!(io.is_retryable());
        assert!(TpiError::NotConnected.is_retryable());
        assert!(!TpiError::AlreadyConnected.is_retryable());
        assert!(!TpiError::malformed("60", "too short").is_retryable());
    }

    #[test]
    fn test_malformed_display() {
        let err = TpiError::malformed("60", "missing zone field");
        assert_eq!(err.to_string(), "Malformed frame \"60\": missing zone field");
    }
}
