use std::future::Future;
use std::time::Duration;

use crate::backend::{Backend, ConnectionState, ControlError, SinkId};
use crate::sink::Sink;
use crate::volume::Volume;

/// One client session with the audio server.
///
/// Every operation issues a single request (two for `get_default_sink`),
/// waits for the server's answer and gives up after `timeout`.
#[derive(Debug)]
pub struct Connection {
    backend: Box<dyn Backend>,
    timeout: Duration,
}

impl Connection {
    /// Connects `backend` as `client_name`.
    ///
    /// A failed context is final: the backend is released and nothing is
    /// retried.
    pub async fn connect(
        mut backend: Box<dyn Backend>,
        client_name: &str,
        timeout: Duration,
    ) -> Result<Self, ControlError> {
        tracing::debug!("Connecting to {} backend as '{}'", backend.name(), client_name);
        match tokio::time::timeout(timeout, backend.connect(client_name)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("Failed to connect to audio server: {}", e);
                return Err(e);
            }
            Err(_) => return Err(ControlError::Timeout("connection".to_string())),
        }
        tracing::info!("Connected to audio server via {} backend", backend.name());

        Ok(Self { backend, timeout })
    }

    /// Connects to the PulseAudio server named in `config`.
    #[cfg(feature = "pulse")]
    pub async fn open(config: &crate::config::Config) -> Result<Self, ControlError> {
        let backend = crate::pulse::PulseBackend::new(config.server_address());
        Self::connect(Box::new(backend), &config.client.name, config.timeout()).await
    }

    pub fn state(&self) -> ConnectionState {
        self.backend.state()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    async fn request<T>(
        &self,
        what: &str,
        request: impl Future<Output = Result<T, ControlError>>,
    ) -> Result<T, ControlError> {
        if self.state() != ConnectionState::Connected {
            return Err(ControlError::NotConnected);
        }
        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ControlError::Timeout(what.to_string()))?
    }

    /// All sinks, in the order the server lists them.
    pub async fn list_sinks(&self) -> Result<Vec<Sink>, ControlError> {
        let records = self.request("sink list", self.backend.sink_info_list()).await?;
        tracing::debug!("Server listed {} sinks", records.len());
        Ok(records.iter().map(Sink::from_record).collect())
    }

    pub async fn get_sink(&self, id: &SinkId) -> Result<Sink, ControlError> {
        match self.request("sink info", self.backend.sink_info(id)).await? {
            Some(record) => Ok(Sink::from(record)),
            None => Err(ControlError::NotFound(id.clone())),
        }
    }

    pub async fn get_sink_by_index(&self, index: u32) -> Result<Sink, ControlError> {
        self.get_sink(&SinkId::Index(index)).await
    }

    pub async fn get_sink_by_name(&self, name: &str) -> Result<Sink, ControlError> {
        self.get_sink(&SinkId::from(name)).await
    }

    /// The server info only names the default sink, so this takes a second
    /// round-trip to fetch the sink itself.
    pub async fn get_default_sink(&self) -> Result<Sink, ControlError> {
        let info = self.request("server info", self.backend.server_info()).await?;
        let name = info.default_sink_name.ok_or(ControlError::NoDefaultSink)?;
        self.get_sink_by_name(&name).await
    }

    /// Sets every channel of `sink` to `percent` of full scale.
    ///
    /// The snapshot is updated before the request goes out; on error it no
    /// longer matches the server.
    pub async fn set_sink_volume(&self, sink: &mut Sink, percent: i32) -> Result<(), ControlError> {
        let volume = Volume::from_percent(percent);
        sink.volume.set_all(volume);
        sink.volume_percent = sink.volume.percent();

        tracing::debug!("Setting sink {} volume to {}% ({:?})", sink.index, percent, volume);
        let acked = self
            .request("sink volume", self.backend.set_sink_volume(sink.index, &sink.volume))
            .await?;
        if !acked {
            tracing::warn!("Server rejected volume change for sink {}", sink.name);
            return Err(ControlError::Rejected(format!("set volume of sink {}", sink.name)));
        }
        Ok(())
    }

    pub async fn set_sink_mute(&self, sink: &Sink, mute: bool) -> Result<(), ControlError> {
        tracing::debug!("Setting sink {} mute to {}", sink.index, mute);
        let acked = self
            .request("sink mute", self.backend.set_sink_mute(sink.index, mute))
            .await?;
        if !acked {
            tracing::warn!("Server rejected mute change for sink {}", sink.name);
            return Err(ControlError::Rejected(format!("set mute of sink {}", sink.name)));
        }
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.backend.state() == ConnectionState::Connected {
            tracing::debug!("Closing audio server connection");
            self.backend.disconnect();
        }
    }
}
