use chrono::{DateTime, Utc};

use onair_core::{
    BroadcastSession, EmergencyKind, EmergencyPriority, PrimaryKey, SessionKind,
};

/// A station account
#[derive(Debug, Clone)]
pub struct UserData {
    pub id: PrimaryKey,
    pub username: String,
    pub password: String,
    pub display_name: String,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user_id: PrimaryKey,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewBroadcastSession {
    pub broadcaster_id: PrimaryKey,
    pub kind: SessionKind,
}

#[derive(Debug)]
pub struct NewEmergencyBroadcast {
    pub title: String,
    pub message: String,
    pub priority: EmergencyPriority,
    pub kind: EmergencyKind,
    pub triggered_by: PrimaryKey,
}

/// The result of starting a broadcast session
#[derive(Debug)]
pub struct StartedBroadcast {
    pub session: BroadcastSession,
    /// Sessions that were still active for the broadcaster and got interrupted
    pub interrupted: Vec<PrimaryKey>,
}

/// A change to a broadcast session row, as delivered by the store's feed
#[derive(Debug, Clone)]
pub enum SessionChange {
    /// The row was inserted or updated, this is its new state
    Updated(BroadcastSession),
    /// The row is gone
    Deleted(PrimaryKey),
}
