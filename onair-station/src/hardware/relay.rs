use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{DeviceError, PortConnection, PortInfo, PortKind, PortProvider};

/// How many raw messages may queue up before a feeder is pushed back
const MESSAGE_BUFFER: usize = 64;

/// A [PortProvider] whose ports are registered programmatically and fed
/// raw controller messages by whatever transports them, like the
/// console relay endpoint or a test.
pub struct RelayPortProvider {
    ports: DashMap<String, RelayPort>,
    next_port: AtomicU64,
}

struct RelayPort {
    info: PortInfo,
    /// Simulates a device exclusively held by another application
    busy: AtomicBool,
    /// The send side of the currently open stream, if any
    sender: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
}

impl RelayPortProvider {
    pub fn new() -> Self {
        Self {
            ports: Default::default(),
            next_port: AtomicU64::new(1),
        }
    }

    /// Registers a port, returning its id.
    pub fn register(&self, name: &str, kind: PortKind) -> String {
        let id = format!("relay-{}", self.next_port.fetch_add(1, Ordering::Relaxed));

        let info = PortInfo {
            id: id.clone(),
            name: name.to_string(),
            kind,
        };

        self.ports.insert(
            id.clone(),
            RelayPort {
                info,
                busy: AtomicBool::new(false),
                sender: Mutex::new(None),
            },
        );

        id
    }

    /// Marks a port as exclusively held, as a real device is when other
    /// dj software owns it.
    pub fn set_busy(&self, port_id: &str, busy: bool) {
        if let Some(port) = self.ports.get(port_id) {
            port.busy.store(busy, Ordering::Relaxed)
        }
    }

    /// Pushes a raw controller message into the port's open stream.
    pub async fn feed(&self, port_id: &str, message: Vec<u8>) -> Result<(), DeviceError> {
        let sender = self
            .ports
            .get(port_id)
            .ok_or_else(|| DeviceError::NotFound(port_id.to_string()))?
            .sender
            .lock()
            .clone();

        let sender = sender
            .ok_or_else(|| DeviceError::Backend(format!("port {port_id} is not open")))?;

        sender
            .send(message)
            .await
            .map_err(|_| DeviceError::Backend(format!("port {port_id} stream is closed")))
    }

    /// Drops the open stream, as an unplugged device would.
    pub fn unplug(&self, port_id: &str) {
        if let Some(port) = self.ports.get(port_id) {
            port.sender.lock().take();
        }
    }
}

impl Default for RelayPortProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortProvider for RelayPortProvider {
    async fn list_ports(&self) -> Result<Vec<PortInfo>, DeviceError> {
        let mut ports: Vec<_> = self.ports.iter().map(|p| p.info.clone()).collect();

        ports.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(ports)
    }

    async fn open(&self, port_id: &str) -> Result<PortConnection, DeviceError> {
        let port = self
            .ports
            .get(port_id)
            .ok_or_else(|| DeviceError::NotFound(port_id.to_string()))?;

        if port.busy.load(Ordering::Relaxed) {
            return Err(DeviceError::ExclusiveAccess(port.info.name.clone()));
        }

        let (sender, receiver) = mpsc::channel(MESSAGE_BUFFER);
        *port.sender.lock() = Some(sender);

        Ok(PortConnection {
            info: port.info.clone(),
            messages: receiver,
        })
    }
}
