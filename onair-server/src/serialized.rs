//! All schemas that are exposed from endpoints are defined here
//! along with the conversions from the station's types

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use onair_core::{
    weekday_index, BroadcastSession as SessionData, Capabilities as CapabilitySet,
    ControlChange as ControlChangeData, EmergencyBroadcast as EmergencyData,
    MixerState as MixerStateData, TimeSlot as TimeSlotData,
};
use onair_station::{
    PortInfo, PortKind, ScannedPort as ScannedPortData, SessionData as LoginData, UserData,
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: i32,
    username: String,
    display_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    token: String,
    user: User,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastSession {
    pub id: i32,
    pub broadcaster: i32,
    pub kind: &'static str,
    pub status: &'static str,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub microphone_live: bool,
    pub mode: &'static str,
    pub emergency_override: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    id: i32,
    name: String,
    assigned_user: i32,
    backup_user: Option<i32>,
    /// 0 is sunday, matching how the schedule is stored
    day_of_week: i16,
    starts_at: NaiveTime,
    ends_at: NaiveTime,
    recurring: bool,
    kind: &'static str,
    active: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    can_go_live: bool,
    can_control_microphone: bool,
    can_control_music: bool,
    can_trigger_jingles: bool,
    can_switch_modes: bool,
    can_emergency_override: bool,
    can_manage_audio: bool,
    can_view_analytics: bool,
}

/// Everything a console needs to render the broadcast panel
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastState {
    pub session: Option<BroadcastSession>,
    pub capabilities: Capabilities,
    pub current_slot: Option<TimeSlot>,
    pub microphone_active: bool,
    pub current_mode: &'static str,
    pub is_live: bool,
    pub can_broadcast: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MicrophoneState {
    pub live: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyBroadcast {
    id: i32,
    title: String,
    message: String,
    priority: &'static str,
    kind: &'static str,
    triggered_by: i32,
    status: &'static str,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    affected_sessions: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    id: String,
    name: String,
    kind: &'static str,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScannedPort {
    id: String,
    name: String,
    kind: &'static str,
    available: bool,
    detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ControlChange {
    control: &'static str,
    level: u8,
    at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MixerStatus {
    crossfader: u8,
    channel_one_volume: u8,
    channel_two_volume: u8,
    master_volume: u8,
    mic_level: u8,
    live: bool,
    last_change: Option<ControlChange>,
}

/// The full state of the hardware bridge
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HardwareStatus {
    pub mixer: MixerStatus,
    pub active_port: Option<Port>,
    pub scanning: bool,
}

pub fn port_kind_name(kind: PortKind) -> &'static str {
    match kind {
        PortKind::Midi => "midi",
        PortKind::Audio => "audio",
    }
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl<I, O> ToSerialized<Option<O>> for Option<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Option<O> {
        self.as_ref().map(|x| x.to_serialized())
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

impl ToSerialized<LoginResult> for LoginData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<BroadcastSession> for SessionData {
    fn to_serialized(&self) -> BroadcastSession {
        BroadcastSession {
            id: self.id,
            broadcaster: self.broadcaster,
            kind: self.kind.name(),
            status: self.status.name(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            microphone_live: self.microphone_live,
            mode: self.mode.name(),
            emergency_override: self.emergency_override,
            notes: self.notes.clone(),
        }
    }
}

impl ToSerialized<TimeSlot> for TimeSlotData {
    fn to_serialized(&self) -> TimeSlot {
        TimeSlot {
            id: self.id,
            name: self.name.clone(),
            assigned_user: self.assigned_user,
            backup_user: self.backup_user,
            day_of_week: weekday_index(self.weekday),
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            recurring: self.recurring,
            kind: self.kind.name(),
            active: self.active,
        }
    }
}

impl ToSerialized<Capabilities> for CapabilitySet {
    fn to_serialized(&self) -> Capabilities {
        Capabilities {
            can_go_live: self.can_go_live,
            can_control_microphone: self.can_control_microphone,
            can_control_music: self.can_control_music,
            can_trigger_jingles: self.can_trigger_jingles,
            can_switch_modes: self.can_switch_modes,
            can_emergency_override: self.can_emergency_override,
            can_manage_audio: self.can_manage_audio,
            can_view_analytics: self.can_view_analytics,
        }
    }
}

impl ToSerialized<EmergencyBroadcast> for EmergencyData {
    fn to_serialized(&self) -> EmergencyBroadcast {
        EmergencyBroadcast {
            id: self.id,
            title: self.title.clone(),
            message: self.message.clone(),
            priority: self.priority.name(),
            kind: self.kind.name(),
            triggered_by: self.triggered_by,
            status: self.status.name(),
            created_at: self.created_at,
            resolved_at: self.resolved_at,
            affected_sessions: self.affected_sessions.clone(),
        }
    }
}

impl ToSerialized<Port> for PortInfo {
    fn to_serialized(&self) -> Port {
        Port {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: port_kind_name(self.kind),
        }
    }
}

impl ToSerialized<ScannedPort> for ScannedPortData {
    fn to_serialized(&self) -> ScannedPort {
        ScannedPort {
            id: self.info.id.clone(),
            name: self.info.name.clone(),
            kind: port_kind_name(self.info.kind),
            available: self.available,
            detail: self.detail.clone(),
        }
    }
}

impl ToSerialized<ControlChange> for ControlChangeData {
    fn to_serialized(&self) -> ControlChange {
        ControlChange {
            control: self.control.name(),
            level: self.level,
            at: self.at,
        }
    }
}

impl ToSerialized<MixerStatus> for MixerStateData {
    fn to_serialized(&self) -> MixerStatus {
        MixerStatus {
            crossfader: self.crossfader,
            channel_one_volume: self.channel_one_volume,
            channel_two_volume: self.channel_two_volume,
            master_volume: self.master_volume,
            mic_level: self.mic_level,
            live: self.live,
            last_change: self.last_change.as_ref().map(|c| c.to_serialized()),
        }
    }
}
