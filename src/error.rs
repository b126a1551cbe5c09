//! Error types for the data service boundary.

use thiserror::Error;

/// Errors raised while running or talking to the data service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The background service thread could not be spawned
    #[error("Failed to spawn service thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The backend failed to answer a request
    #[error("Backend error: {message}")]
    Backend {
        /// Description of the failure
        message: String,
    },

    /// A request payload could not be interpreted
    #[error("Malformed request: {0}")]
    MalformedRequest(#[from] serde_json::Error),

    /// The service thread is gone
    #[error("Service disconnected")]
    Disconnected,
}

impl ServiceError {
    /// Create a backend error with a message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_message() {
        let err = ServiceError::backend("DB does not exist");
        assert_eq!(err.to_string(), "Backend error: DB does not exist");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "no threads left");
        let err: ServiceError = io.into();
        assert!(matches!(err, ServiceError::Spawn(_)));
    }
}
