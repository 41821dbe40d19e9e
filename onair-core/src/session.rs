use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::PrimaryKey;

/// How a session puts audio on air.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// A broadcaster is in the chair.
    Live,
    /// The playout system runs the session.
    Automation,
}

impl SessionKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "live" => Some(Self::Live),
            "automation" => Some(Self::Automation),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Automation => "automation",
        }
    }
}

/// The lifecycle state of a broadcast session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    /// The broadcaster signed off themselves.
    Ended,
    /// A newer session or an emergency forced this one off the air.
    Interrupted,
}

impl SessionStatus {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "active" => Some(Self::Active),
            "ended" => Some(Self::Ended),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Ended => "ended",
            Self::Interrupted => "interrupted",
        }
    }

    /// Terminal statuses never move again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Validates a lifecycle edge.
    pub fn check_transition(self, next: SessionStatus) -> Result<(), TransitionError> {
        match (self, next) {
            (Self::Active, Self::Ended) | (Self::Active, Self::Interrupted) => Ok(()),
            (from, to) => Err(TransitionError { from, to }),
        }
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("a session cannot go from {from} to {to}")]
pub struct TransitionError {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

/// What the console is currently doing with the air signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastMode {
    /// The playout system picks the music. Every session starts here.
    #[default]
    Automation,
    /// The broadcaster drives the mix.
    Live,
}

impl BroadcastMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "automation" => Some(Self::Automation),
            "live" => Some(Self::Live),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Automation => "automation",
            Self::Live => "live",
        }
    }
}

/// One contiguous broadcasting attempt by a broadcaster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastSession {
    pub id: PrimaryKey,
    /// The user on the air
    pub broadcaster: PrimaryKey,
    pub kind: SessionKind,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub microphone_live: bool,
    pub mode: BroadcastMode,
    /// Set when an emergency broadcast takes priority over this session
    pub emergency_override: bool,
    pub notes: Option<String>,
}

impl BroadcastSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_active_sessions_can_end_or_be_interrupted() {
        assert!(SessionStatus::Active
            .check_transition(SessionStatus::Ended)
            .is_ok());
        assert!(SessionStatus::Active
            .check_transition(SessionStatus::Interrupted)
            .is_ok());
    }

    #[test]
    fn test_terminal_statuses_are_final() {
        let error = SessionStatus::Ended
            .check_transition(SessionStatus::Active)
            .unwrap_err();

        assert_eq!(error.from, SessionStatus::Ended);

        assert!(SessionStatus::Interrupted
            .check_transition(SessionStatus::Ended)
            .is_err());
    }

    #[test]
    fn test_every_session_starts_in_automation() {
        assert_eq!(BroadcastMode::default(), BroadcastMode::Automation);
    }

    #[test]
    fn test_status_names_round_trip() {
        for status in [
            SessionStatus::Active,
            SessionStatus::Ended,
            SessionStatus::Interrupted,
        ] {
            assert_eq!(SessionStatus::from_name(status.name()), Some(status));
        }

        assert_eq!(SessionStatus::from_name("paused"), None);
    }
}
