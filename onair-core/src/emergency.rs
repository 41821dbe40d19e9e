use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PrimaryKey;

/// How urgent an emergency broadcast is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergencyPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl EmergencyPriority {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Why an emergency broadcast went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergencyKind {
    /// A real alert that must reach listeners.
    Alert,
    /// A scheduled test of the override path.
    Drill,
    /// The station itself is in trouble.
    Technical,
}

impl EmergencyKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "alert" => Some(Self::Alert),
            "drill" => Some(Self::Drill),
            "technical" => Some(Self::Technical),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::Drill => "drill",
            Self::Technical => "technical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergencyStatus {
    Issued,
    Resolved,
}

impl EmergencyStatus {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "issued" => Some(Self::Issued),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Resolved => "resolved",
        }
    }
}

/// An admin-triggered signal that takes priority over every active session.
/// This is a signaling primitive, it does not stop playback by itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergencyBroadcast {
    pub id: PrimaryKey,
    pub title: String,
    pub message: String,
    pub priority: EmergencyPriority,
    pub kind: EmergencyKind,
    /// The admin who pulled the lever
    pub triggered_by: PrimaryKey,
    pub status: EmergencyStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// The sessions that were on the air when this broadcast went out
    pub affected_sessions: Vec<PrimaryKey>,
}
