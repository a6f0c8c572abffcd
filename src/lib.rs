pub mod backend;
pub mod blocking;
pub mod config;
pub mod connection;
#[cfg(feature = "pulse")]
pub mod pulse;
pub mod sink;
pub mod volume;

pub use backend::{Backend, ConnectionState, ControlError, ServerInfo, SinkId, SinkRecord};
pub use config::{Config, ClientConfig, VolumeConfig};
pub use connection::Connection;
#[cfg(feature = "pulse")]
pub use pulse::PulseBackend;
pub use sink::Sink;
pub use volume::{ChannelVolumes, Volume, MAX_CHANNELS};
