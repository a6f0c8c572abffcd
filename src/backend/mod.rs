pub mod types;
pub mod error;
#[cfg(test)]
pub(crate) mod fake;

pub use types::{Backend, ConnectionState, ServerInfo, SinkId, SinkRecord};
pub use error::ControlError;
