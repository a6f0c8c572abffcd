//! Synchronous wrapper around [`crate::connection::Connection`].
//!
//! Each call blocks the current thread until the server answers or the
//! timeout elapses. Do not use from inside an async runtime.

use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

use crate::backend::{Backend, ConnectionState, ControlError, SinkId};
use crate::connection;
use crate::sink::Sink;

#[derive(Debug)]
pub struct Connection {
    // Declared first so the connection is closed before the runtime goes away.
    inner: connection::Connection,
    runtime: Runtime,
}

impl Connection {
    /// Connects to the default PulseAudio server as `client_name`.
    #[cfg(feature = "pulse")]
    pub fn new(client_name: &str) -> Result<Self, ControlError> {
        let mut config = crate::config::Config::default();
        config.client.name = client_name.to_string();
        Self::from_config(&config)
    }

    #[cfg(feature = "pulse")]
    pub fn from_config(config: &crate::config::Config) -> Result<Self, ControlError> {
        let backend = crate::pulse::PulseBackend::new(config.server_address());
        Self::with_backend(Box::new(backend), &config.client.name, config.timeout())
    }

    pub fn with_backend(
        backend: Box<dyn Backend>,
        client_name: &str,
        timeout: Duration,
    ) -> Result<Self, ControlError> {
        let runtime = Builder::new_current_thread().enable_time().build()?;
        let inner = runtime.block_on(connection::Connection::connect(backend, client_name, timeout))?;
        Ok(Self { inner, runtime })
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.inner.set_timeout(timeout);
    }

    pub fn list_sinks(&self) -> Result<Vec<Sink>, ControlError> {
        self.runtime.block_on(self.inner.list_sinks())
    }

    pub fn get_sink(&self, id: &SinkId) -> Result<Sink, ControlError> {
        self.runtime.block_on(self.inner.get_sink(id))
    }

    pub fn get_sink_by_index(&self, index: u32) -> Result<Sink, ControlError> {
        self.runtime.block_on(self.inner.get_sink_by_index(index))
    }

    pub fn get_sink_by_name(&self, name: &str) -> Result<Sink, ControlError> {
        self.runtime.block_on(self.inner.get_sink_by_name(name))
    }

    pub fn get_default_sink(&self) -> Result<Sink, ControlError> {
        self.runtime.block_on(self.inner.get_default_sink())
    }

    pub fn set_sink_volume(&self, sink: &mut Sink, percent: i32) -> Result<(), ControlError> {
        self.runtime.block_on(self.inner.set_sink_volume(sink, percent))
    }

    pub fn set_sink_mute(&self, sink: &Sink, mute: bool) -> Result<(), ControlError> {
        self.runtime.block_on(self.inner.set_sink_mute(sink, mute))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{sink_record, FakeBackend, FakeServer};
    use crate::volume::{ChannelVolumes, Volume};

    fn connect(server: FakeServer) -> (Connection, std::sync::Arc<std::sync::Mutex<FakeServer>>) {
        let (backend, server) = FakeBackend::new(server);
        let connection = Connection::with_backend(Box::new(backend), "blocking", Duration::from_millis(200))
            .unwrap();
        (connection, server)
    }

    #[test]
    fn test_blocking_round_trip() {
        let (connection, _server) = connect(FakeServer::with_sinks(vec![
            sink_record(1, "speakers", &[65536, 65536]),
            sink_record(2, "headphones", &[0, 0]),
        ]));
        assert_eq!(connection.state(), ConnectionState::Connected);

        let sinks = connection.list_sinks().unwrap();
        assert_eq!(sinks.len(), 2);

        let mut default = connection.get_default_sink().unwrap();
        assert_eq!(default.name, "speakers");

        connection.set_sink_volume(&mut default, 120).unwrap();
        connection.set_sink_mute(&default, true).unwrap();

        let refreshed = connection.get_sink(&SinkId::Index(1)).unwrap();
        assert_eq!(refreshed.volume, ChannelVolumes::uniform(2, Volume(78643)));
        assert_eq!(refreshed.volume_percent, 120);
        assert!(refreshed.mute);
    }

    #[test]
    fn test_blocking_not_found() {
        let (connection, _server) = connect(FakeServer::default());

        let result = connection.get_sink_by_name("nothing");
        assert!(matches!(result, Err(ControlError::NotFound(_))));
    }

    #[test]
    fn test_blocking_connect_refused() {
        let server = FakeServer {
            refuse_connection: true,
            ..FakeServer::default()
        };
        let (backend, _server) = FakeBackend::new(server);

        let result = Connection::with_backend(Box::new(backend), "blocking", Duration::from_millis(200));
        assert!(matches!(result, Err(ControlError::Connection(_))));
    }

    #[test]
    fn test_blocking_drop_disconnects() {
        let (connection, server) = connect(FakeServer::default());
        drop(connection);
        assert_eq!(server.lock().unwrap().disconnects, 1);
    }
}
