use crate::backend::types::SinkId;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Connection to audio server failed: {0}")]
    Connection(String),
    #[error("Not connected to audio server")]
    NotConnected,
    #[error("Sink not found: {0}")]
    NotFound(SinkId),
    #[error("Audio server has no default sink")]
    NoDefaultSink,
    #[error("Request rejected by audio server: {0}")]
    Rejected(String),
    #[error("Timed out waiting for {0}")]
    Timeout(String),
    #[error("Request dropped before the audio server answered: {0}")]
    Dropped(String),
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}
