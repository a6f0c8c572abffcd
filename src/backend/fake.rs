//! In-memory audio server for tests.

use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use super::error::ControlError;
use super::types::{Backend, ConnectionState, ServerInfo, SinkId, SinkRecord};
use crate::volume::{ChannelVolumes, Volume};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum FakeRequest {
    Connect(String),
    SinkInfoList,
    SinkInfo(SinkId),
    ServerInfo,
    SetSinkVolume(u32, ChannelVolumes),
    SetSinkMute(u32, bool),
}

#[derive(Debug, Default)]
pub(crate) struct FakeServer {
    pub sinks: Vec<SinkRecord>,
    pub default_sink: Option<String>,
    pub refuse_connection: bool,
    /// Never answer anything.
    pub stall: bool,
    pub reject_mutations: bool,
    /// The server went away after the connection was made.
    pub lost: bool,
    pub requests: Vec<FakeRequest>,
    pub disconnects: usize,
}

impl FakeServer {
    pub fn with_sinks(sinks: Vec<SinkRecord>) -> Self {
        let default_sink = sinks.first().map(|s| s.name.clone());
        Self { sinks, default_sink, ..Self::default() }
    }

    /// Requests issued after the connection was made.
    pub fn round_trips(&self) -> usize {
        self.requests
            .iter()
            .filter(|r| !matches!(r, FakeRequest::Connect(_)))
            .count()
    }
}

pub(crate) fn sink_record(index: u32, name: &str, volumes: &[u32]) -> SinkRecord {
    SinkRecord {
        index,
        name: name.to_string(),
        description: format!("{} output", name),
        volume: ChannelVolumes::new(volumes.iter().map(|v| Volume(*v))),
        mute: false,
    }
}

#[derive(Debug)]
pub(crate) struct FakeBackend {
    server: Arc<Mutex<FakeServer>>,
    state: ConnectionState,
}

impl FakeBackend {
    pub fn new(server: FakeServer) -> (Self, Arc<Mutex<FakeServer>>) {
        let server = Arc::new(Mutex::new(server));
        (
            Self { server: Arc::clone(&server), state: ConnectionState::Connecting },
            server,
        )
    }

    /// Records `request` and reports whether the server is stalled.
    fn record(&self, request: FakeRequest) -> bool {
        let mut server = self.server.lock().unwrap();
        server.requests.push(request);
        server.stall
    }

    async fn answer<T>(&self, request: FakeRequest, reply: impl FnOnce(&mut FakeServer) -> T) -> T {
        if self.record(request) {
            std::future::pending::<()>().await;
        }
        let mut server = self.server.lock().unwrap();
        reply(&mut server)
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn state(&self) -> ConnectionState {
        if self.state == ConnectionState::Connected && self.server.lock().unwrap().lost {
            return ConnectionState::Error;
        }
        self.state
    }

    async fn connect(&mut self, client_name: &str) -> Result<(), ControlError> {
        let refused = self
            .answer(FakeRequest::Connect(client_name.to_string()), |s| s.refuse_connection)
            .await;
        if refused {
            self.state = ConnectionState::Error;
            return Err(ControlError::Connection("connection refused".to_string()));
        }
        self.state = ConnectionState::Connected;
        Ok(())
    }

    async fn sink_info_list(&self) -> Result<Vec<SinkRecord>, ControlError> {
        Ok(self.answer(FakeRequest::SinkInfoList, |s| s.sinks.clone()).await)
    }

    async fn sink_info(&self, id: &SinkId) -> Result<Option<SinkRecord>, ControlError> {
        let found = self
            .answer(FakeRequest::SinkInfo(id.clone()), |s| {
                s.sinks
                    .iter()
                    .find(|sink| match id {
                        SinkId::Index(index) => sink.index == *index,
                        SinkId::Name(name) => sink.name == *name,
                    })
                    .cloned()
            })
            .await;
        Ok(found)
    }

    async fn server_info(&self) -> Result<ServerInfo, ControlError> {
        let default_sink_name = self
            .answer(FakeRequest::ServerInfo, |s| s.default_sink.clone())
            .await;
        Ok(ServerInfo {
            server_name: Some("fake".to_string()),
            server_version: None,
            default_sink_name,
        })
    }

    async fn set_sink_volume(&self, index: u32, volume: &ChannelVolumes) -> Result<bool, ControlError> {
        let request = FakeRequest::SetSinkVolume(index, volume.clone());
        let acked = self
            .answer(request, |s| {
                if s.reject_mutations {
                    return false;
                }
                match s.sinks.iter_mut().find(|sink| sink.index == index) {
                    Some(sink) => {
                        sink.volume = volume.clone();
                        true
                    }
                    None => false,
                }
            })
            .await;
        Ok(acked)
    }

    async fn set_sink_mute(&self, index: u32, mute: bool) -> Result<bool, ControlError> {
        let acked = self
            .answer(FakeRequest::SetSinkMute(index, mute), |s| {
                if s.reject_mutations {
                    return false;
                }
                match s.sinks.iter_mut().find(|sink| sink.index == index) {
                    Some(sink) => {
                        sink.mute = mute;
                        true
                    }
                    None => false,
                }
            })
            .await;
        Ok(acked)
    }

    fn disconnect(&mut self) {
        if self.state == ConnectionState::Connected {
            self.server.lock().unwrap().disconnects += 1;
        }
        self.state = ConnectionState::Error;
    }
}
