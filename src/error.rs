//! Error types for the head tracking library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Snapshot (de)serialization failed
    #[error("Snapshot encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// HTTP transport to the detection server failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Detection server returned a body that is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Robot session could not be established
    #[error("Connection error: {0}")]
    Connection(String),

    /// A robot service is not offered by the session
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Actuator read or write failed
    #[error("Actuator error: {0}")]
    Actuator(String),

    /// Actuator did not answer within the configured deadline
    #[error("Actuator call timed out after {0:?}")]
    ActuatorTimeout(std::time::Duration),

    /// Detection call failed
    #[error("Detector error: {0}")]
    Detector(String),

    /// Frame capture failed
    #[error("Frame source error: {0}")]
    FrameSource(String),

    /// Model parameters do not match the configured architecture
    #[error("Model shape error: {0}")]
    ModelShape(String),

    /// Snapshot content is unusable
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Session lifecycle misuse (already running, worker spawn failure)
    #[error("Session error: {0}")]
    Session(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error only affects the current detection cycle
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Actuator(_)
                | Self::ActuatorTimeout(_)
                | Self::Detector(_)
                | Self::FrameSource(_)
                | Self::Http(_)
                | Self::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Actuator("stiffness off".to_string()).is_transient());
        assert!(Error::ActuatorTimeout(Duration::from_millis(200)).is_transient());
        assert!(Error::Detector("502".to_string()).is_transient());
        assert!(!Error::Connection("refused".to_string()).is_transient());
        assert!(!Error::ModelShape("hidden 32 != 64".to_string()).is_transient());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::InvalidInput("right < left".to_string());
        assert_eq!(err.to_string(), "Invalid input: right < left");

        let err = Error::ActuatorTimeout(Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));
    }
}
