use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use onair_core::PrimaryKey;

/// An operator action worth keeping a record of.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub user_id: PrimaryKey,
    pub action: AuditAction,
    pub at: DateTime<Utc>,
    /// Free-form context, like the previous mode of a mode switch
    pub detail: Option<String>,
}

impl AuditEvent {
    pub fn new(user_id: PrimaryKey, action: AuditAction) -> Self {
        Self {
            user_id,
            action,
            at: Utc::now(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditAction {
    SessionStarted,
    SessionEnded,
    MicrophoneToggled,
    ModeSwitched,
    EmergencyDeclared,
    MixerControlChanged,
    /// Anything the console reports that has no dedicated variant
    Other,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit sink is unavailable: {0}")]
    Unavailable(String),
}

/// A destination for audit records. The station treats recording as
/// best-effort, a failing sink never blocks an operation.
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Writes audit records to the log until a real destination exists.
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        debug!(
            "audit: user {} {:?} {}",
            event.user_id,
            event.action,
            event.detail.as_deref().unwrap_or("")
        );

        Ok(())
    }
}
