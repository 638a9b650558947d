use crate::session::{SessionEvent, SessionState};

/// Result alias that carries the custom [`MaskCamError`] type.
pub type Result<T> = std::result::Result<T, MaskCamError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MaskCamError {
    /// Free-form failure surfaced to the user as-is.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Sprite or frame could not be decoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
    /// The camera (or other capture device) could not be acquired.
    #[error("capture device unavailable: {0}")]
    Capture(String),
    /// The session controller refused an event in its current state.
    #[error("{event:?} is not allowed while {state:?}")]
    Session {
        state: SessionState,
        event: SessionEvent,
    },
    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl MaskCamError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for MaskCamError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MaskCamError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Failure of a single re-encoding exchange.
///
/// Transport problems and service rejections are kept apart so callers can
/// tell a flaky network from bad input, even though both currently end the
/// session in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    /// The request never produced an HTTP response (connect, timeout, body).
    #[error("upload transport failed: {0}")]
    Transport(String),
    /// The service answered with a non-success status.
    #[error("re-encoding service rejected the upload with status {status}")]
    Rejected { status: u16 },
    /// The request could not be assembled from the configuration.
    #[error("upload request could not be built: {0}")]
    Request(String),
    /// There was nothing to send.
    #[error("recording contains no media")]
    EmptyRecording,
}

impl UploadError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Status-code class (`4` for 4xx, `5` for 5xx) of a rejection.
    pub fn status_class(&self) -> Option<u16> {
        match self {
            Self::Rejected { status } => Some(status / 100),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(value: reqwest::Error) -> Self {
        match value.status() {
            Some(status) => Self::Rejected {
                status: status.as_u16(),
            },
            None => Self::Transport(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinguishes_transport_from_rejection() {
        let transport = UploadError::Transport("connection refused".into());
        let rejected = UploadError::Rejected { status: 503 };

        assert!(transport.is_transport());
        assert!(!transport.is_rejected());
        assert_eq!(transport.status_class(), None);

        assert!(rejected.is_rejected());
        assert_eq!(rejected.status_class(), Some(5));
    }

    #[test]
    fn session_error_names_state_and_event() {
        let err = MaskCamError::Session {
            state: SessionState::Uploading,
            event: SessionEvent::StartRecording,
        };
        let text = err.to_string();
        assert!(text.contains("StartRecording"));
        assert!(text.contains("Uploading"));
    }
}
