use crossbeam::channel::{Receiver, Sender};

use onair_core::{
    BroadcastMode, BroadcastSession, ControlChange, EmergencyBroadcast, PrimaryKey,
};

use crate::PortInfo;

pub type EventSender = Sender<StationEvent>;
pub type EventReceiver = Receiver<StationEvent>;

/// Events emitted by the station as its state changes.
#[derive(Debug, Clone)]
pub enum StationEvent {
    /// A broadcaster went on the air.
    SessionStarted { session: BroadcastSession },
    /// A broadcaster signed off.
    SessionEnded { session_id: PrimaryKey },
    /// A newer session or an emergency forced a session off the air.
    SessionInterrupted { session_id: PrimaryKey },
    /// The realtime feed replaced the local copy of a session.
    SessionSynced { session: BroadcastSession },
    /// The realtime feed reported a session row as gone.
    SessionRemoved { session_id: PrimaryKey },
    /// The studio microphone was opened or closed.
    MicrophoneToggled {
        session_id: PrimaryKey,
        live: bool,
    },
    /// The console switched between automation and live mixing.
    ModeChanged {
        session_id: PrimaryKey,
        previous: BroadcastMode,
        mode: BroadcastMode,
    },
    /// An emergency broadcast went out.
    EmergencyDeclared { broadcast: EmergencyBroadcast },
    /// A recognized control moved on the connected mixer surface.
    MixerControlChanged { change: ControlChange },
    /// The hardware live flag was toggled, by pad or by hand.
    MixerLiveChanged { live: bool },
    /// A mixer surface was connected.
    DeviceConnected { port: PortInfo },
    /// The connected mixer surface went away.
    DeviceDisconnected { port: PortInfo },
}
