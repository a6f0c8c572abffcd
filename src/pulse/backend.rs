use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};

use super::mainloop::{self, Reply, Request};
use crate::backend::{Backend, ConnectionState, ControlError, ServerInfo, SinkId, SinkRecord};
use crate::volume::ChannelVolumes;

/// `Backend` on top of libpulse, driven by a dedicated mainloop thread.
#[derive(Debug)]
pub struct PulseBackend {
    server: Option<String>,
    requests: Option<mpsc::Sender<Request>>,
    worker: Option<JoinHandle<()>>,
    state: watch::Receiver<ConnectionState>,
}

impl PulseBackend {
    /// `server` is a PulseAudio server string; `None` picks the default server.
    pub fn new(server: Option<String>) -> Self {
        let (_, state) = watch::channel(ConnectionState::Connecting);
        Self {
            server,
            requests: None,
            worker: None,
            state,
        }
    }

    async fn request<T>(&self, what: &str, make: impl FnOnce(Reply<T>) -> Request) -> Result<T, ControlError> {
        let requests = self.requests.as_ref().ok_or(ControlError::NotConnected)?;
        let (reply, response) = oneshot::channel();
        tracing::debug!("Sending {} request", what);
        requests
            .send(make(reply))
            .map_err(|_| ControlError::Dropped(what.to_string()))?;
        response
            .await
            .map_err(|_| ControlError::Dropped(what.to_string()))?
    }
}

impl Default for PulseBackend {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Drop for PulseBackend {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[async_trait]
impl Backend for PulseBackend {
    fn name(&self) -> &'static str {
        "pulse"
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    async fn connect(&mut self, client_name: &str) -> Result<(), ControlError> {
        if self.worker.is_some() {
            return Err(ControlError::Connection("context already created".to_string()));
        }

        let (state_tx, mut state_rx) = watch::channel(ConnectionState::Connecting);
        let (requests, inbox) = mpsc::channel();
        let client_name = client_name.to_string();
        let server = self.server.clone();
        let worker = thread::Builder::new()
            .name("pulse-mainloop".to_string())
            .spawn(move || mainloop::run(client_name, server, state_tx, inbox))?;

        self.requests = Some(requests);
        self.worker = Some(worker);
        self.state = state_rx.clone();

        // A closed channel means the thread gave up without reporting.
        let state = state_rx
            .wait_for(|s| *s != ConnectionState::Connecting)
            .await
            .map(|state| *state)
            .unwrap_or(ConnectionState::Error);
        match state {
            ConnectionState::Connected => Ok(()),
            _ => Err(ControlError::Connection(format!(
                "PulseAudio context failed ({})",
                self.server.as_deref().unwrap_or("default server")
            ))),
        }
    }

    async fn sink_info_list(&self) -> Result<Vec<SinkRecord>, ControlError> {
        self.request("sink list", Request::SinkInfoList).await
    }

    async fn sink_info(&self, id: &SinkId) -> Result<Option<SinkRecord>, ControlError> {
        let id = id.clone();
        self.request("sink info", move |reply| Request::SinkInfo(id, reply)).await
    }

    async fn server_info(&self) -> Result<ServerInfo, ControlError> {
        self.request("server info", Request::ServerInfo).await
    }

    async fn set_sink_volume(&self, index: u32, volume: &ChannelVolumes) -> Result<bool, ControlError> {
        let volume = volume.clone();
        self.request("sink volume", move |reply| Request::SetSinkVolume { index, volume, reply })
            .await
    }

    async fn set_sink_mute(&self, index: u32, mute: bool) -> Result<bool, ControlError> {
        self.request("sink mute", move |reply| Request::SetSinkMute { index, mute, reply })
            .await
    }

    fn disconnect(&mut self) {
        if let Some(requests) = self.requests.take() {
            let _ = requests.send(Request::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("PulseAudio mainloop thread panicked");
            }
        }
    }
}
