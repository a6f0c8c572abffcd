use std::fmt;
use super::error::ControlError;
use crate::volume::ChannelVolumes;

/// Lifecycle of one client context.
///
/// `Connected` and `Error` are terminal: a context never reconnects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Error,
}

/// How a caller names a sink: the server-assigned index or the stable name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SinkId {
    Index(u32),
    Name(String),
}

impl SinkId {
    /// Reads numeric text as an index and anything else as a name.
    pub fn parse(value: &str) -> Self {
        match value.parse::<u32>() {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Name(value.to_string()),
        }
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{}", index),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<u32> for SinkId {
    fn from(index: u32) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for SinkId {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for SinkId {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// A sink as delivered by the server.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SinkRecord {
    pub index: u32,
    pub name: String,
    pub description: String,
    pub volume: ChannelVolumes,
    pub mute: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub server_name: Option<String>,
    pub server_version: Option<String>,
    pub default_sink_name: Option<String>,
}

use async_trait::async_trait;

/// Asynchronous access to an audio server, one request per call.
///
/// Each future resolves once the server has answered the request it issued.
/// Implementations publish connection state from their own state-change
/// notifications; callers only read it.
#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;
    fn state(&self) -> ConnectionState;

    /// Starts connecting and resolves once the state leaves `Connecting`.
    async fn connect(&mut self, client_name: &str) -> Result<(), ControlError>;
    async fn sink_info_list(&self) -> Result<Vec<SinkRecord>, ControlError>;
    /// `Ok(None)` when the server knows no sink under `id`.
    async fn sink_info(&self, id: &SinkId) -> Result<Option<SinkRecord>, ControlError>;
    async fn server_info(&self) -> Result<ServerInfo, ControlError>;
    /// Resolves to the server's acknowledgement flag.
    async fn set_sink_volume(&self, index: u32, volume: &ChannelVolumes) -> Result<bool, ControlError>;
    async fn set_sink_mute(&self, index: u32, mute: bool) -> Result<bool, ControlError>;

    /// Disconnects if connected and releases the event loop. Safe to repeat.
    fn disconnect(&mut self);
}
