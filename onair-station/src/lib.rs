mod access;
mod audit;
mod auth;
mod broadcast;
mod db;
mod events;
mod hardware;
mod realtime;
mod schedule;
mod util;

use std::sync::Arc;

use crossbeam::channel::unbounded;
use realtime::SessionSync;

pub use access::*;
pub use audit::*;
pub use auth::*;
pub use broadcast::*;
pub use db::*;
pub use events::*;
pub use hardware::*;
pub use schedule::*;

/// The onair station system, running broadcast sessions, the schedule
/// gate, hardware input, and the realtime mirror.
pub struct Station<Db> {
    context: StationContext<Db>,
    event_receiver: EventReceiver,

    pub auth: Auth<Db>,
    pub access: Access<Db>,
    pub schedule: ScheduleGate<Db>,
    pub broadcast: Arc<BroadcastManager<Db>>,
    pub hardware: HardwareBridge<Db>,
}

/// A type passed to the station's components, to access the store and
/// emit events.
pub struct StationContext<Db> {
    pub database: Arc<Db>,
    event_sender: EventSender,
}

impl<Db> Station<Db>
where
    Db: Database,
{
    pub fn new(database: Db, ports: Arc<dyn PortProvider>, audit: Arc<dyn AuditSink>) -> Self {
        Self::with_database(Arc::new(database), ports, audit)
    }

    pub fn with_database(
        database: Arc<Db>,
        ports: Arc<dyn PortProvider>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let (event_sender, event_receiver) = unbounded();

        let context = StationContext {
            database: database.clone(),
            event_sender,
        };

        let broadcast = Arc::new(BroadcastManager::new(&context, audit));
        let hardware = HardwareBridge::new(&context, &broadcast, ports);

        Self {
            auth: Auth::new(&database),
            access: Access::new(&database),
            schedule: ScheduleGate::new(&database),
            broadcast,
            hardware,
            context,
            event_receiver,
        }
    }

    /// Restores active sessions from the store and starts mirroring
    /// changes made by other writers.
    pub async fn start(&self) -> Result<()> {
        self.broadcast.restore().await?;
        SessionSync::spawn(&self.context, &self.broadcast);

        Ok(())
    }

    /// Receive events from the station. Blocks until one arrives.
    pub fn wait_for_event(&self) -> StationEvent {
        self.event_receiver
            .recv()
            .expect("event is received without error")
    }
}

impl<Db> StationContext<Db> {
    pub fn emit(&self, event: StationEvent) {
        self.event_sender.send(event).expect("event is sent")
    }
}

impl<Db> Clone for StationContext<Db> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            event_sender: self.event_sender.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_station() -> (
    Arc<db::memory::MemoryDatabase>,
    Station<db::memory::MemoryDatabase>,
) {
    let database = Arc::new(db::memory::MemoryDatabase::new());
    let station = test_station_with(database.clone());

    (database, station)
}

#[cfg(test)]
pub(crate) fn test_station_with(
    database: Arc<db::memory::MemoryDatabase>,
) -> Station<db::memory::MemoryDatabase> {
    Station::with_database(
        database,
        Arc::new(RelayPortProvider::new()),
        Arc::new(LogAuditSink),
    )
}

#[cfg(test)]
pub(crate) fn test_station_with_relay() -> (
    Arc<db::memory::MemoryDatabase>,
    Station<db::memory::MemoryDatabase>,
    Arc<RelayPortProvider>,
) {
    let database = Arc::new(db::memory::MemoryDatabase::new());
    let relay = Arc::new(RelayPortProvider::new());

    let station = Station::with_database(database.clone(), relay.clone(), Arc::new(LogAuditSink));

    (database, station, relay)
}
