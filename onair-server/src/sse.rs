use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::get,
};
use futures_util::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    convert::Infallible,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll, Waker},
};
use utoipa::ToSchema;

use onair_core::Id;
use onair_station::StationEvent;

use crate::{
    context::ServerContext,
    serialized::{BroadcastSession, ControlChange, EmergencyBroadcast, Port, ToSerialized},
    Router,
};

type ConnectionId = Id<Connection>;

/// What the station tells every connected console.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ServerEvent {
    /// A broadcaster went on the air.
    SessionStarted { session: BroadcastSession },
    /// A broadcaster signed off.
    SessionEnded { session_id: i32 },
    /// A newer session or an emergency forced a session off the air.
    SessionInterrupted { session_id: i32 },
    /// Another console changed the session, this is its new state.
    SessionSynced { session: BroadcastSession },
    /// The session row is gone, the console should go idle.
    SessionRemoved { session_id: i32 },
    /// The studio microphone was opened or closed.
    MicrophoneToggled { session_id: i32, live: bool },
    /// The console switched between automation and live mixing.
    ModeChanged {
        session_id: i32,
        previous: &'static str,
        mode: &'static str,
    },
    /// An emergency broadcast went out.
    EmergencyDeclared { broadcast: EmergencyBroadcast },
    /// A recognized control moved on the connected mixer surface.
    MixerControlChanged { change: ControlChange },
    /// The hardware live flag was toggled.
    MixerLiveChanged { live: bool },
    /// A mixer surface was connected.
    DeviceConnected { port: Port },
    /// The connected mixer surface went away.
    DeviceDisconnected { port: Port },
}

impl From<StationEvent> for ServerEvent {
    fn from(value: StationEvent) -> Self {
        match value {
            StationEvent::SessionStarted { session } => Self::SessionStarted {
                session: session.to_serialized(),
            },
            StationEvent::SessionEnded { session_id } => Self::SessionEnded { session_id },
            StationEvent::SessionInterrupted { session_id } => {
                Self::SessionInterrupted { session_id }
            }
            StationEvent::SessionSynced { session } => Self::SessionSynced {
                session: session.to_serialized(),
            },
            StationEvent::SessionRemoved { session_id } => Self::SessionRemoved { session_id },
            StationEvent::MicrophoneToggled { session_id, live } => {
                Self::MicrophoneToggled { session_id, live }
            }
            StationEvent::ModeChanged {
                session_id,
                previous,
                mode,
            } => Self::ModeChanged {
                session_id,
                previous: previous.name(),
                mode: mode.name(),
            },
            StationEvent::EmergencyDeclared { broadcast } => Self::EmergencyDeclared {
                broadcast: broadcast.to_serialized(),
            },
            StationEvent::MixerControlChanged { change } => Self::MixerControlChanged {
                change: change.to_serialized(),
            },
            StationEvent::MixerLiveChanged { live } => Self::MixerLiveChanged { live },
            StationEvent::DeviceConnected { port } => Self::DeviceConnected {
                port: port.to_serialized(),
            },
            StationEvent::DeviceDisconnected { port } => Self::DeviceDisconnected {
                port: port.to_serialized(),
            },
        }
    }
}

/// Manages server sent event connections
pub struct ServerSentEvents {
    me: Weak<Self>,
    connections: Mutex<Vec<Connection>>,
}

struct Connection {
    id: ConnectionId,
    pending_messages: Arc<Mutex<Vec<ServerEvent>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

pub struct ConnectionHandle {
    id: ConnectionId,
    /// A reference to [Connection]'s pending messages
    pending_messages: Arc<Mutex<Vec<ServerEvent>>>,
    /// A reference to [Connection]'s stored [Waker]
    waker: Arc<Mutex<Option<Waker>>>,
    /// Required to remove connection when dropped
    manager: Weak<ServerSentEvents>,
}

impl ServerSentEvents {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            connections: Default::default(),
        })
    }

    pub fn broadcast(&self, event: ServerEvent) {
        let connections = self.connections.lock();

        for connection in connections.iter() {
            connection.send(event.clone())
        }
    }

    fn connect(&self) -> ConnectionHandle {
        let connection = Connection::new();
        let handle = connection.handle(self.me.clone());

        self.connections.lock().push(connection);
        handle
    }

    fn disconnect(&self, id: ConnectionId) {
        self.connections.lock().retain(|c| c.id != id)
    }
}

impl Connection {
    fn new() -> Self {
        Self {
            id: ConnectionId::new(),
            pending_messages: Default::default(),
            waker: Default::default(),
        }
    }

    fn send(&self, message: ServerEvent) {
        self.pending_messages.lock().push(message);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }
    }

    fn handle(&self, manager: Weak<ServerSentEvents>) -> ConnectionHandle {
        ConnectionHandle {
            id: self.id,
            pending_messages: self.pending_messages.clone(),
            waker: self.waker.clone(),
            manager,
        }
    }
}

impl Stream for ConnectionHandle {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut pending_messages = self.pending_messages.lock();

        let next_event = pending_messages
            .pop()
            .map(|m| serde_json::to_string(&m).expect("serializes properly"));

        if let Some(event) = next_event {
            return Poll::Ready(Some(Ok(Event::default().data(event))));
        }

        *self.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.disconnect(self.id)
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/events",
    tag = "events",
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of events from the station",
            body = ServerEvent
        )
    )
)]
async fn event_stream(State(context): State<ServerContext>) -> Sse<ConnectionHandle> {
    Sse::new(context.sse.connect()).keep_alive(KeepAlive::default())
}

pub fn router() -> Router {
    Router::new().route("/", get(event_stream))
}
