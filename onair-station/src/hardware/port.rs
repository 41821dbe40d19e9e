use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// What kind of device a port is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    Midi,
    Audio,
}

/// A connectable hardware port, as reported by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInfo {
    pub id: String,
    pub name: String,
    pub kind: PortKind,
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Port {0} does not exist")]
    NotFound(String),
    /// Another application holds the device exclusively
    #[error("Port {0} is in use by another application")]
    ExclusiveAccess(String),
    #[error("Device backend failure: {0}")]
    Backend(String),
}

pub type MessageReceiver = mpsc::Receiver<Vec<u8>>;

/// An open message stream to a port. The stream ending means the
/// device went away.
pub struct PortConnection {
    pub info: PortInfo,
    pub messages: MessageReceiver,
}

/// A source of connectable mixer ports.
///
/// Whether a port is actually usable is determined by probing it with
/// [PortProvider::open], never by guessing from its name. A port held
/// by other dj software surfaces as [DeviceError::ExclusiveAccess].
#[async_trait]
pub trait PortProvider: Send + Sync + 'static {
    /// Enumerates every port currently visible to this provider.
    async fn list_ports(&self) -> Result<Vec<PortInfo>, DeviceError>;

    /// Opens the port's message stream.
    async fn open(&self, port_id: &str) -> Result<PortConnection, DeviceError>;
}

/// A port's availability as determined by a scan probe.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedPort {
    #[serde(flatten)]
    pub info: PortInfo,
    pub available: bool,
    /// Why the port is unavailable, when it is not
    pub detail: Option<String>,
}
