use std::sync::Arc;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    WebRtc(Arc<webrtc::Error>),
    #[error("relay transport failed: {0}")]
    Relay(Arc<tungstenite::Error>),
    #[error("relay channel closed")]
    RelayClosed,
    #[error("malformed envelope: {0}")]
    Envelope(String),
    #[error("media acquisition failed: {0}")]
    Media(String),
    #[error("invalid options: {0}")]
    Options(String),
}

impl Error {
    pub fn envelope<S: Into<String>>(reason: S) -> Self {
        Error::Envelope(reason.into())
    }

    /// Errors after which the client cannot continue: the relay is gone or
    /// never came up.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Relay(_) | Error::RelayClosed | Error::Media(_))
    }
}

impl From<webrtc::Error> for Error {
    fn from(value: webrtc::Error) -> Self {
        Error::WebRtc(Arc::new(value))
    }
}

impl From<tungstenite::Error> for Error {
    fn from(value: tungstenite::Error) -> Self {
        Error::Relay(Arc::new(value))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Envelope(value.to_string())
    }
}
