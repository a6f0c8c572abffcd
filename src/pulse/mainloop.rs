//! Mainloop thread: owns the PulseAudio mainloop and context, which must
//! never leave the thread that created them.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::{Receiver, TryRecvError};

use libpulse_binding as pulse;
use pulse::callbacks::ListResult;
use pulse::context::introspect::{ServerInfo as PaServerInfo, SinkInfo};
use pulse::context::{Context, FlagSet as ContextFlagSet, State as ContextState};
use pulse::error::PAErr;
use pulse::mainloop::standard::Mainloop;
use pulse::proplist::{properties, Proplist};
use pulse::time::MicroSeconds;
use pulse::volume::{ChannelVolumes as PaChannelVolumes, Volume as PaVolume};
use tokio::sync::{oneshot, watch};

use crate::backend::{ConnectionState, ControlError, ServerInfo, SinkId, SinkRecord};
use crate::volume::{ChannelVolumes, Volume};

/// Upper bound on one poll, so queued requests are picked up promptly.
const POLL_INTERVAL: MicroSeconds = MicroSeconds(20_000);

/// The server never assigns this index.
const INVALID_INDEX: u32 = u32::MAX;

pub(crate) type Reply<T> = oneshot::Sender<Result<T, ControlError>>;

pub(crate) enum Request {
    SinkInfoList(Reply<Vec<SinkRecord>>),
    SinkInfo(SinkId, Reply<Option<SinkRecord>>),
    ServerInfo(Reply<ServerInfo>),
    SetSinkVolume {
        index: u32,
        volume: ChannelVolumes,
        reply: Reply<bool>,
    },
    SetSinkMute {
        index: u32,
        mute: bool,
        reply: Reply<bool>,
    },
    Shutdown,
}

impl Request {
    fn fail(self, error: ControlError) {
        // Send errors mean the caller timed out and went away.
        match self {
            Request::SinkInfoList(reply) => {
                let _ = reply.send(Err(error));
            }
            Request::SinkInfo(_, reply) => {
                let _ = reply.send(Err(error));
            }
            Request::ServerInfo(reply) => {
                let _ = reply.send(Err(error));
            }
            Request::SetSinkVolume { reply, .. } | Request::SetSinkMute { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Request::Shutdown => {}
        }
    }
}

/// Marks the connection unusable however the thread ends, panics included.
struct PublishErrorOnExit(Rc<watch::Sender<ConnectionState>>);

impl Drop for PublishErrorOnExit {
    fn drop(&mut self) {
        self.0.send_replace(ConnectionState::Error);
    }
}

pub(crate) fn run(
    client_name: String,
    server: Option<String>,
    state: watch::Sender<ConnectionState>,
    requests: Receiver<Request>,
) {
    let state = Rc::new(state);
    let _exit = PublishErrorOnExit(Rc::clone(&state));

    if server.as_deref().is_some_and(|s| s.contains('\0')) {
        tracing::error!("PulseAudio server string contains a NUL byte");
        return;
    }
    let Some(mut mainloop) = Mainloop::new() else {
        tracing::error!("Failed to create PulseAudio mainloop");
        return;
    };
    let Some(context) = new_context(&mainloop, &client_name) else {
        tracing::error!("Failed to create PulseAudio context for '{}'", client_name);
        return;
    };
    let context = Rc::new(RefCell::new(context));

    let weak = Rc::downgrade(&context);
    let callback_state = Rc::clone(&state);
    context.borrow_mut().set_state_callback(Some(Box::new(move || {
        if let Some(context) = weak.upgrade() {
            publish_state(&context, &callback_state);
        }
    })));

    tracing::debug!(
        "Connecting to PulseAudio server {} as '{}'",
        server.as_deref().unwrap_or("<default>"),
        client_name
    );
    let connected = context
        .borrow_mut()
        .connect(server.as_deref(), ContextFlagSet::NOFLAGS, None);
    if let Err(err) = connected {
        tracing::error!("PulseAudio connect failed: {:?}", err);
        state.send_replace(ConnectionState::Error);
    }
    // Transitions made inside connect() were not observable from the callback.
    publish_state(&context, &state);

    'run: loop {
        loop {
            match requests.try_recv() {
                Ok(Request::Shutdown) | Err(TryRecvError::Disconnected) => break 'run,
                Ok(request) => {
                    if let Some(request) = screen(request) {
                        dispatch(&context, request);
                    }
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        if let Err(err) = iterate(&mut mainloop) {
            tracing::error!("PulseAudio mainloop failed: {:?}", err);
            break;
        }
    }

    shutdown(&context);
}

fn new_context(mainloop: &Mainloop, client_name: &str) -> Option<Context> {
    if client_name.contains('\0') {
        return None;
    }
    let mut proplist = Proplist::new()?;
    proplist
        .set_str(properties::APPLICATION_NAME, client_name)
        .ok()?;
    Context::new_with_proplist(mainloop, client_name, &proplist)
}

fn publish_state(context: &RefCell<Context>, state: &watch::Sender<ConnectionState>) {
    // connect() and disconnect() fire the callback while the context is
    // mutably borrowed.
    let Ok(context) = context.try_borrow() else {
        return;
    };
    let next = match context.get_state() {
        ContextState::Ready => ConnectionState::Connected,
        ContextState::Failed | ContextState::Terminated => ConnectionState::Error,
        _ => return,
    };
    if *state.borrow() != next {
        tracing::debug!("PulseAudio context state: {:?}", next);
        state.send_replace(next);
    }
}

fn iterate(mainloop: &mut Mainloop) -> Result<(), PAErr> {
    mainloop.prepare(Some(POLL_INTERVAL))?;
    mainloop.poll()?;
    mainloop.dispatch()?;
    Ok(())
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('\0')
}

/// Answers requests libpulse would refuse outright and passes the rest on.
///
/// libpulse-binding panics when the C library declines to start an
/// operation, so these never reach it. Lookups answer "no such sink",
/// mutations answer a negative acknowledgement.
fn screen(request: Request) -> Option<Request> {
    let refused = match &request {
        Request::SinkInfo(SinkId::Name(name), _) => !is_valid_name(name),
        Request::SinkInfo(SinkId::Index(index), _) => *index == INVALID_INDEX,
        Request::SetSinkVolume { index, volume, .. } => *index == INVALID_INDEX || !volume.is_valid(),
        Request::SetSinkMute { index, .. } => *index == INVALID_INDEX,
        _ => false,
    };
    if !refused {
        return Some(request);
    }

    match request {
        Request::SinkInfo(id, reply) => {
            tracing::debug!("No sink can be named {:?}", id);
            let _ = reply.send(Ok(None));
        }
        Request::SetSinkVolume { index, reply, .. } | Request::SetSinkMute { index, reply, .. } => {
            tracing::warn!("Refusing invalid change for sink {}", index);
            let _ = reply.send(Ok(false));
        }
        _ => {}
    }
    None
}

fn dispatch(context: &RefCell<Context>, request: Request) {
    let context = context.borrow();
    if context.get_state() != ContextState::Ready {
        request.fail(ControlError::NotConnected);
        return;
    }

    let mut introspector = context.introspect();
    match request {
        Request::SinkInfoList(reply) => {
            let mut collector = SinkCollector::new(reply);
            introspector.get_sink_info_list(move |result: ListResult<&SinkInfo<'_>>| match result {
                ListResult::Item(info) => collector.push(sink_record(info)),
                ListResult::End => collector.finish(),
                ListResult::Error => collector.fail(),
            });
        }
        Request::SinkInfo(SinkId::Index(index), reply) => {
            introspector.get_sink_info_by_index(index, lookup_sink(reply));
        }
        Request::SinkInfo(SinkId::Name(name), reply) => {
            introspector.get_sink_info_by_name(&name, lookup_sink(reply));
        }
        Request::ServerInfo(reply) => {
            introspector.get_server_info(server_info(reply));
        }
        Request::SetSinkVolume { index, volume, reply } => {
            introspector.set_sink_volume_by_index(index, &native_volume(&volume), Some(acknowledge(reply)));
        }
        Request::SetSinkMute { index, mute, reply } => {
            introspector.set_sink_mute_by_index(index, mute, Some(acknowledge(reply)));
        }
        Request::Shutdown => {}
    }
}

fn shutdown(context: &RefCell<Context>) {
    let mut context = context.borrow_mut();
    context.set_state_callback(None);
    if context.get_state() == ContextState::Ready {
        context.disconnect();
        tracing::info!("Disconnected from PulseAudio server");
    }
}

fn sink_record(info: &SinkInfo<'_>) -> SinkRecord {
    SinkRecord {
        index: info.index,
        name: info.name.as_deref().unwrap_or_default().to_string(),
        description: info.description.as_deref().unwrap_or_default().to_string(),
        volume: ChannelVolumes::new(info.volume.get().iter().map(|v| Volume(v.0))),
        mute: info.mute,
    }
}

fn native_volume(volume: &ChannelVolumes) -> PaChannelVolumes {
    let mut native = PaChannelVolumes::default();
    native.set_len(volume.len() as u8);
    for (slot, value) in native.get_mut().iter_mut().zip(volume.values()) {
        *slot = PaVolume(value.0);
    }
    native
}

/// Buffers every record up to the end-of-list marker, then replies once.
struct SinkCollector {
    reply: Option<Reply<Vec<SinkRecord>>>,
    sinks: Vec<SinkRecord>,
}

impl SinkCollector {
    fn new(reply: Reply<Vec<SinkRecord>>) -> Self {
        Self { reply: Some(reply), sinks: Vec::new() }
    }

    fn push(&mut self, record: SinkRecord) {
        self.sinks.push(record);
    }

    fn finish(&mut self) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(Ok(std::mem::take(&mut self.sinks)));
        }
    }

    fn fail(&mut self) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(Err(ControlError::Rejected("sink list query failed".to_string())));
        }
    }
}

/// Keeps the first record of a single-sink query.
///
/// The server ends a lookup for an unknown index or name with an error
/// instead of an empty list, so every error is reported as "no such sink".
/// Other failures (a dying context) show up as a state change instead.
struct SinkLookup {
    reply: Option<Reply<Option<SinkRecord>>>,
    found: Option<SinkRecord>,
}

impl SinkLookup {
    fn new(reply: Reply<Option<SinkRecord>>) -> Self {
        Self { reply: Some(reply), found: None }
    }

    fn push(&mut self, record: SinkRecord) {
        if self.found.is_none() {
            self.found = Some(record);
        }
    }

    fn finish(&mut self) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(Ok(self.found.take()));
        }
    }
}

fn lookup_sink(reply: Reply<Option<SinkRecord>>) -> impl FnMut(ListResult<&SinkInfo<'_>>) + 'static {
    let mut lookup = SinkLookup::new(reply);
    move |result: ListResult<&SinkInfo<'_>>| match result {
        ListResult::Item(info) => lookup.push(sink_record(info)),
        ListResult::End | ListResult::Error => lookup.finish(),
    }
}

fn server_info(reply: Reply<ServerInfo>) -> impl FnMut(&PaServerInfo<'_>) + 'static {
    let mut reply = Some(reply);
    move |info: &PaServerInfo<'_>| {
        if let Some(reply) = reply.take() {
            let _ = reply.send(Ok(ServerInfo {
                server_name: info.server_name.as_deref().map(str::to_string),
                server_version: info.server_version.as_deref().map(str::to_string),
                default_sink_name: info.default_sink_name.as_deref().map(str::to_string),
            }));
        }
    }
}

fn acknowledge(reply: Reply<bool>) -> Box<dyn FnMut(bool) + 'static> {
    let mut reply = Some(reply);
    Box::new(move |success| {
        if let Some(reply) = reply.take() {
            let _ = reply.send(Ok(success));
        }
    })
}
