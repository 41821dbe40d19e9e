use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use log::warn;

use crate::{BroadcastManager, Database, StationContext};

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// Mirrors broadcast session rows changed by other writers into the
/// local state, so every console of the station sees the same thing.
/// Last writer wins, there is no reconciliation of conflicting edits.
pub(crate) struct SessionSync;

impl SessionSync {
    /// Spawns the mirroring task. It resubscribes forever, a lost feed
    /// only means a delay until the next attempt.
    pub fn spawn<Db>(context: &StationContext<Db>, broadcast: &Arc<BroadcastManager<Db>>)
    where
        Db: Database,
    {
        let context = context.clone();
        let broadcast = broadcast.clone();

        tokio::spawn(async move {
            loop {
                match context.database.watch_sessions().await {
                    Ok(mut changes) => {
                        while let Some(change) = changes.next().await {
                            broadcast.apply_remote_change(change)
                        }

                        warn!("Session feed closed, resubscribing");
                    }
                    Err(e) => warn!("Failed to subscribe to session changes: {e}"),
                }

                tokio::time::sleep(RESUBSCRIBE_DELAY).await;
            }
        });
    }
}

#[cfg(test)]
mod test {
    use crate::db::memory::MemoryDatabase;
    use crate::{test_station_with, Database, NewBroadcastSession, StationEvent};

    use std::sync::Arc;
    use std::time::Duration;

    use onair_core::{Role, SessionKind};

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sessions_started_elsewhere_are_mirrored() {
        let db = Arc::new(MemoryDatabase::new());
        let station = test_station_with(db.clone());

        let dj = db.add_user("dj", &[Role::Dj]);

        station.start().await.unwrap();

        // Another process writes a session directly to the store
        db.start_broadcast_session(NewBroadcastSession {
            broadcaster_id: dj,
            kind: SessionKind::Live,
        })
        .await
        .unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);

        loop {
            let remaining = deadline
                .checked_duration_since(std::time::Instant::now())
                .expect("sync event arrives before the deadline");

            let event = station
                .event_receiver
                .recv_timeout(remaining)
                .expect("sync event arrives before the deadline");

            if let StationEvent::SessionSynced { session } = event {
                assert_eq!(session.broadcaster, dj);
                break;
            }
        }

        assert!(station.broadcast.is_live(dj));
    }
}
