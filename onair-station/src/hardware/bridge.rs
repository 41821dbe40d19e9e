use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use onair_core::{Id, MixerControl, MixerMessage, MixerState, PrimaryKey};

use crate::{BroadcastManager, Database, StationContext, StationEvent};

use super::{DeviceError, PortConnection, PortInfo, PortProvider, ScannedPort};

/// Connects a hardware mixer surface to the broadcast layer: discovers
/// ports, pumps their message streams, and keeps the mixer state.
pub struct HardwareBridge<Db> {
    context: StationContext<Db>,
    broadcast: Arc<BroadcastManager<Db>>,
    provider: Arc<dyn PortProvider>,
    mixer: Arc<Mutex<MixerState>>,
    active: Arc<Mutex<Option<ActivePort>>>,
    scanning: AtomicBool,
}

struct ActivePort {
    /// Tells a finished pump apart from its replacement
    instance: Id<ActivePort>,
    info: PortInfo,
    task: JoinHandle<()>,
}

impl<Db> HardwareBridge<Db>
where
    Db: Database,
{
    pub fn new(
        context: &StationContext<Db>,
        broadcast: &Arc<BroadcastManager<Db>>,
        provider: Arc<dyn PortProvider>,
    ) -> Self {
        Self {
            context: context.clone(),
            broadcast: broadcast.clone(),
            provider,
            mixer: Default::default(),
            active: Default::default(),
            scanning: AtomicBool::new(false),
        }
    }

    /// Enumerates ports and probes each one for availability. Ports held
    /// by other software are reported individually, a busy device never
    /// aborts the scan. Nothing is left connected.
    pub async fn scan(&self) -> Result<Vec<ScannedPort>, DeviceError> {
        self.scanning.store(true, Ordering::SeqCst);
        let result = self.probe_ports().await;
        self.scanning.store(false, Ordering::SeqCst);

        result
    }

    async fn probe_ports(&self) -> Result<Vec<ScannedPort>, DeviceError> {
        let ports = self.provider.list_ports().await?;

        // Enumerations tend to repeat devices, keep the first of each
        let mut seen = HashSet::new();
        let mut scanned = vec![];

        for info in ports {
            if !seen.insert((info.kind, info.name.clone())) {
                continue;
            }

            // Probing the connected port would steal its stream
            if self.active_port().is_some_and(|p| p.id == info.id) {
                scanned.push(ScannedPort {
                    info,
                    available: true,
                    detail: None,
                });
                continue;
            }

            match self.provider.open(&info.id).await {
                Ok(connection) => {
                    drop(connection);

                    scanned.push(ScannedPort {
                        info,
                        available: true,
                        detail: None,
                    });
                }
                Err(e) => {
                    debug!("Port {} is unavailable: {e}", info.name);

                    scanned.push(ScannedPort {
                        info,
                        available: false,
                        detail: Some(e.to_string()),
                    });
                }
            }
        }

        Ok(scanned)
    }

    /// Opens a port and starts pumping its messages, replacing any
    /// previous connection. The operator is whoever's console asked,
    /// their control movements are logged under their name.
    pub async fn connect(
        &self,
        operator: PrimaryKey,
        port_id: &str,
    ) -> Result<PortInfo, DeviceError> {
        self.disconnect();

        let connection = self.provider.open(port_id).await?;
        let info = connection.info.clone();
        let instance = Id::new();

        let task = tokio::spawn(Self::pump(
            self.context.clone(),
            self.broadcast.clone(),
            self.mixer.clone(),
            self.active.clone(),
            connection,
            operator,
            instance,
        ));

        *self.active.lock() = Some(ActivePort {
            instance,
            info: info.clone(),
            task,
        });

        info!("Connected to {}", info.name);

        self.context
            .emit(StationEvent::DeviceConnected { port: info.clone() });

        Ok(info)
    }

    /// Disconnects the active port, if any.
    pub fn disconnect(&self) {
        let port = self.active.lock().take();

        if let Some(port) = port {
            port.task.abort();

            info!("Disconnected from {}", port.info.name);

            self.context
                .emit(StationEvent::DeviceDisconnected { port: port.info });
        }
    }

    /// Flips the hardware live flag, as the transport pads would.
    pub fn toggle_live(&self) -> bool {
        let live = {
            let mut mixer = self.mixer.lock();
            mixer.live = !mixer.live;
            mixer.live
        };

        self.context.emit(StationEvent::MixerLiveChanged { live });

        live
    }

    pub fn status(&self) -> MixerState {
        self.mixer.lock().clone()
    }

    pub fn active_port(&self) -> Option<PortInfo> {
        self.active.lock().as_ref().map(|p| p.info.clone())
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    async fn pump(
        context: StationContext<Db>,
        broadcast: Arc<BroadcastManager<Db>>,
        mixer: Arc<Mutex<MixerState>>,
        active: Arc<Mutex<Option<ActivePort>>>,
        mut connection: PortConnection,
        operator: PrimaryKey,
        instance: Id<ActivePort>,
    ) {
        while let Some(raw) = connection.messages.recv().await {
            let Some(message) = MixerMessage::parse(&raw) else {
                continue;
            };

            if let MixerMessage::Control { controller, value } = message {
                if MixerControl::from_controller(controller).is_none() {
                    debug!("Unmapped controller {controller} moved to {value}");
                }
            }

            let change = mixer.lock().apply(message, Utc::now());

            match message {
                MixerMessage::GoLive => {
                    context.emit(StationEvent::MixerLiveChanged { live: true })
                }
                MixerMessage::Stop => {
                    context.emit(StationEvent::MixerLiveChanged { live: false })
                }
                MixerMessage::Control { .. } => {}
            }

            if let Some(change) = change {
                context.emit(StationEvent::MixerControlChanged { change });

                // Best-effort, a network hiccup must never stall the performer
                let broadcast = broadcast.clone();

                tokio::spawn(async move {
                    if let Err(e) = broadcast.log_control(operator, change).await {
                        warn!("Failed to forward control change: {e}");
                    }
                });
            }
        }

        // The stream closed, the device is gone
        let disconnected = {
            let mut active = active.lock();

            match active.as_ref() {
                Some(port) if port.instance == instance => active.take().map(|p| p.info),
                _ => None,
            }
        };

        if let Some(info) = disconnected {
            info!("{} disconnected", info.name);
            context.emit(StationEvent::DeviceDisconnected { port: info });
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{test_station, test_station_with_relay, EventReceiver, PortKind};

    use std::time::Duration;

    use onair_core::Role;

    fn wait_for(
        receiver: &EventReceiver,
        predicate: impl Fn(&StationEvent) -> bool,
    ) -> StationEvent {
        let deadline = std::time::Instant::now() + Duration::from_secs(2);

        loop {
            let remaining = deadline
                .checked_duration_since(std::time::Instant::now())
                .expect("event arrives before the deadline");

            let event = receiver
                .recv_timeout(remaining)
                .expect("event arrives before the deadline");

            if predicate(&event) {
                return event;
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_scan_dedupes_and_reports_busy_ports() {
        let (_db, station, relay) = test_station_with_relay();

        relay.register("DJ Controller", PortKind::Midi);
        relay.register("DJ Controller", PortKind::Midi);
        let held = relay.register("Other Software Deck", PortKind::Midi);

        relay.set_busy(&held, true);

        let scanned = station.hardware.scan().await.unwrap();

        assert_eq!(scanned.len(), 2, "duplicate names collapse to one");

        let busy = scanned
            .iter()
            .find(|p| p.info.name == "Other Software Deck")
            .unwrap();

        assert!(!busy.available);
        assert!(busy.detail.is_some());

        let free = scanned
            .iter()
            .find(|p| p.info.name == "DJ Controller")
            .unwrap();

        assert!(free.available);
        assert!(!station.hardware.is_scanning());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller_messages_drive_the_mixer_state() {
        let (db, station, relay) = test_station_with_relay();
        let operator = db.add_user("dj", &[Role::Dj]);
        let port = relay.register("DJ Controller", PortKind::Midi);

        station.hardware.connect(operator, &port).await.unwrap();

        wait_for(&station.event_receiver, |e| {
            matches!(e, StationEvent::DeviceConnected { .. })
        });

        relay.feed(&port, vec![0xB0, 7, 127]).await.unwrap();

        wait_for(&station.event_receiver, |e| {
            matches!(e, StationEvent::MixerControlChanged { .. })
        });

        assert_eq!(station.hardware.status().master_volume, 100);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_transport_pads_toggle_live() {
        let (db, station, relay) = test_station_with_relay();
        let operator = db.add_user("dj", &[Role::Dj]);
        let port = relay.register("DJ Controller", PortKind::Midi);

        station.hardware.connect(operator, &port).await.unwrap();

        relay.feed(&port, vec![0x90, 36, 127]).await.unwrap();

        wait_for(&station.event_receiver, |e| {
            matches!(e, StationEvent::MixerLiveChanged { live: true })
        });

        assert!(station.hardware.status().live);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_an_unplugged_device_clears_the_connection() {
        let (db, station, relay) = test_station_with_relay();
        let operator = db.add_user("dj", &[Role::Dj]);
        let port = relay.register("DJ Controller", PortKind::Midi);

        station.hardware.connect(operator, &port).await.unwrap();
        assert!(station.hardware.active_port().is_some());

        relay.unplug(&port);

        wait_for(&station.event_receiver, |e| {
            matches!(e, StationEvent::DeviceDisconnected { .. })
        });

        assert!(station.hardware.active_port().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_toggle_live_works_without_a_connection() {
        let (_db, station) = test_station();

        assert!(station.hardware.toggle_live());
        assert!(!station.hardware.toggle_live());
    }
}
