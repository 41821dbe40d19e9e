use std::pin::Pin;

use async_trait::async_trait;
use chrono::Weekday;
use futures_util::Stream;
use thiserror::Error;

use onair_core::{
    BroadcastMode, BroadcastSession, EmergencyBroadcast, PrimaryKey, Role, TimeSlot,
};

mod data;
pub use data::*;

mod pg;
pub use pg::*;

#[cfg(test)]
pub(crate) mod memory;

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// A feed of changes to broadcast session rows, however the store delivers them.
pub type SessionChanges = Pin<Box<dyn Stream<Item = SessionChange> + Send>>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

impl DatabaseError {
    /// An internal error carrying just a message, for rows that fail to decode.
    pub fn corrupt(resource: &'static str, column: &'static str) -> Self {
        Self::Internal(format!("{resource} row has an unrecognized {column}").into())
    }
}

/// Represents a type that can fetch and mutate station data
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn check_for_admin(&self) -> Result<bool>;
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    async fn user_by_username(&self, username: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;

    /// Returns the user's assigned roles. Rows with unknown role names are skipped.
    async fn roles_for_user(&self, user_id: PrimaryKey) -> Result<Vec<Role>>;
    async fn assign_role(&self, user_id: PrimaryKey, role: Role) -> Result<()>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;

    async fn slots_for_day(&self, weekday: Weekday) -> Result<Vec<TimeSlot>>;
    async fn slots_for_user(&self, user_id: PrimaryKey) -> Result<Vec<TimeSlot>>;

    async fn active_session_for(
        &self,
        broadcaster_id: PrimaryKey,
    ) -> Result<Option<BroadcastSession>>;
    async fn active_sessions(&self) -> Result<Vec<BroadcastSession>>;
    /// Interrupts any active session for the broadcaster and inserts the new
    /// one as a single atomic step. A concurrent start surfaces as a conflict.
    async fn start_broadcast_session(
        &self,
        new_session: NewBroadcastSession,
    ) -> Result<StartedBroadcast>;
    async fn end_broadcast_session(&self, session_id: PrimaryKey) -> Result<BroadcastSession>;
    async fn set_session_microphone(
        &self,
        session_id: PrimaryKey,
        live: bool,
    ) -> Result<BroadcastSession>;
    async fn set_session_mode(
        &self,
        session_id: PrimaryKey,
        mode: BroadcastMode,
    ) -> Result<BroadcastSession>;

    /// Inserts the emergency broadcast and flags every active session in one
    /// atomic step, returning the affected session ids on the result.
    async fn create_emergency_broadcast(
        &self,
        new_broadcast: NewEmergencyBroadcast,
    ) -> Result<EmergencyBroadcast>;

    /// Opens a feed of changes to broadcast session rows.
    async fn watch_sessions(&self) -> Result<SessionChanges>;
}

/// Helper trait to reduce boilerplate when mapping store errors
pub trait IntoDatabaseError {
    fn any(self) -> DatabaseError;
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn conflict_or_any(self, resource: &'static str, field: &'static str, value: &str)
        -> DatabaseError;
}
