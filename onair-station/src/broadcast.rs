use std::sync::Arc;

use chrono::{DateTime, Local};
use dashmap::DashMap;
use log::{info, warn};
use thiserror::Error;

use onair_core::{
    BroadcastMode, BroadcastSession, ControlChange, EmergencyBroadcast, EmergencyKind,
    EmergencyPriority, PrimaryKey, SessionKind,
};

use crate::{
    audit::{AuditAction, AuditError, AuditEvent, AuditSink},
    Access, Database, DatabaseError, NewBroadcastSession, NewEmergencyBroadcast, ScheduleGate,
    SessionChange, StationContext, StationEvent,
};

/// Runs the lifecycle of broadcast sessions: who may go on the air,
/// the microphone, the console mode, and the emergency override.
pub struct BroadcastManager<Db> {
    context: StationContext<Db>,
    access: Access<Db>,
    gate: ScheduleGate<Db>,
    audit: Arc<dyn AuditSink>,
    /// Local mirror of active sessions, keyed by broadcaster
    active: DashMap<PrimaryKey, BroadcastSession>,
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    /// The user's roles don't grant the capability for this operation
    #[error("Not authorized to {action}")]
    NotAuthorized { action: &'static str },
    /// Nobody gave this broadcaster a live slot covering the current time
    #[error("No live time slot covers this broadcaster right now")]
    OutsideTimeSlot,
    #[error("No active broadcast session")]
    NoActiveSession,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
}

/// The input for triggering an emergency broadcast
#[derive(Debug)]
pub struct NewEmergencyAlert {
    pub title: String,
    pub message: String,
    pub priority: EmergencyPriority,
    pub kind: EmergencyKind,
}

impl<Db> BroadcastManager<Db>
where
    Db: Database,
{
    pub fn new(context: &StationContext<Db>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            context: context.clone(),
            access: Access::new(&context.database),
            gate: ScheduleGate::new(&context.database),
            audit,
            active: Default::default(),
        }
    }

    /// Loads the active sessions from the store on init
    pub async fn restore(&self) -> Result<(), DatabaseError> {
        for session in self.context.database.active_sessions().await? {
            self.active.insert(session.broadcaster, session);
        }

        Ok(())
    }

    /// Puts a broadcaster on the air. Any session still active for them
    /// is interrupted by the store in the same step that creates the new
    /// one, so at most one session per broadcaster is ever active.
    pub async fn start_session(
        &self,
        broadcaster: PrimaryKey,
        kind: SessionKind,
    ) -> Result<BroadcastSession, BroadcastError> {
        self.start_session_at(broadcaster, kind, Local::now()).await
    }

    pub(crate) async fn start_session_at(
        &self,
        broadcaster: PrimaryKey,
        kind: SessionKind,
        now: DateTime<Local>,
    ) -> Result<BroadcastSession, BroadcastError> {
        let capabilities = self.access.capabilities_for(broadcaster).await;

        if !capabilities.can_go_live {
            return Err(BroadcastError::NotAuthorized { action: "go live" });
        }

        // Admins broadcast whenever they want, everyone else needs a slot
        if !self.access.is_admin(broadcaster).await
            && self.gate.slot_at(broadcaster, now).await.is_none()
        {
            return Err(BroadcastError::OutsideTimeSlot);
        }

        let started = self
            .context
            .database
            .start_broadcast_session(NewBroadcastSession {
                broadcaster_id: broadcaster,
                kind,
            })
            .await
            .map_err(BroadcastError::Db)?;

        for session_id in started.interrupted {
            info!("Session {session_id} was interrupted by a newer session");

            self.context
                .emit(StationEvent::SessionInterrupted { session_id });
        }

        let session = started.session;
        self.active.insert(broadcaster, session.clone());

        info!(
            "Broadcaster {broadcaster} went on the air with session {}",
            session.id
        );

        self.context.emit(StationEvent::SessionStarted {
            session: session.clone(),
        });

        self.record(AuditEvent::new(broadcaster, AuditAction::SessionStarted))
            .await;

        Ok(session)
    }

    /// Signs the broadcaster off, ending their active session.
    pub async fn end_session(
        &self,
        broadcaster: PrimaryKey,
    ) -> Result<BroadcastSession, BroadcastError> {
        let session = self.require_active(broadcaster).await?;

        let ended = self
            .context
            .database
            .end_broadcast_session(session.id)
            .await
            .map_err(BroadcastError::Db)?;

        self.active.remove(&broadcaster);

        info!("Broadcaster {broadcaster} signed off from session {}", ended.id);

        self.context
            .emit(StationEvent::SessionEnded { session_id: ended.id });

        self.record(AuditEvent::new(broadcaster, AuditAction::SessionEnded))
            .await;

        Ok(ended)
    }

    /// Opens or closes the studio microphone, returning the new state.
    pub async fn toggle_microphone(
        &self,
        broadcaster: PrimaryKey,
    ) -> Result<bool, BroadcastError> {
        let capabilities = self.access.capabilities_for(broadcaster).await;

        if !capabilities.can_control_microphone {
            return Err(BroadcastError::NotAuthorized {
                action: "control the microphone",
            });
        }

        let session = self.require_active(broadcaster).await?;

        let updated = self
            .context
            .database
            .set_session_microphone(session.id, !session.microphone_live)
            .await
            .map_err(BroadcastError::Db)?;

        let live = updated.microphone_live;
        self.active.insert(broadcaster, updated.clone());

        self.context.emit(StationEvent::MicrophoneToggled {
            session_id: updated.id,
            live,
        });

        self.record(
            AuditEvent::new(broadcaster, AuditAction::MicrophoneToggled)
                .with_detail(if live { "open" } else { "closed" }),
        )
        .await;

        Ok(live)
    }

    /// Switches the console between automation and live mixing.
    /// The previous mode is only kept in the audit record.
    pub async fn switch_mode(
        &self,
        broadcaster: PrimaryKey,
        mode: BroadcastMode,
    ) -> Result<BroadcastSession, BroadcastError> {
        let capabilities = self.access.capabilities_for(broadcaster).await;

        if !capabilities.can_switch_modes {
            return Err(BroadcastError::NotAuthorized {
                action: "switch modes",
            });
        }

        let session = self.require_active(broadcaster).await?;
        let previous = session.mode;

        let updated = self
            .context
            .database
            .set_session_mode(session.id, mode)
            .await
            .map_err(BroadcastError::Db)?;

        self.active.insert(broadcaster, updated.clone());

        self.context.emit(StationEvent::ModeChanged {
            session_id: updated.id,
            previous,
            mode,
        });

        self.record(
            AuditEvent::new(broadcaster, AuditAction::ModeSwitched)
                .with_detail(format!("{} to {}", previous.name(), mode.name())),
        )
        .await;

        Ok(updated)
    }

    /// Sends out an emergency broadcast, flagging every active session.
    /// This signals downstream consumers, it does not stop playback.
    pub async fn trigger_emergency(
        &self,
        user_id: PrimaryKey,
        alert: NewEmergencyAlert,
    ) -> Result<EmergencyBroadcast, BroadcastError> {
        let capabilities = self.access.capabilities_for(user_id).await;

        if !capabilities.can_emergency_override {
            return Err(BroadcastError::NotAuthorized {
                action: "trigger an emergency broadcast",
            });
        }

        let broadcast = self
            .context
            .database
            .create_emergency_broadcast(NewEmergencyBroadcast {
                title: alert.title,
                message: alert.message,
                priority: alert.priority,
                kind: alert.kind,
                triggered_by: user_id,
            })
            .await
            .map_err(BroadcastError::Db)?;

        for mut entry in self.active.iter_mut() {
            if broadcast.affected_sessions.contains(&entry.id) {
                entry.emergency_override = true
            }
        }

        warn!(
            "Emergency broadcast {} ({}) takes priority over {} active sessions",
            broadcast.id,
            broadcast.title,
            broadcast.affected_sessions.len()
        );

        self.context.emit(StationEvent::EmergencyDeclared {
            broadcast: broadcast.clone(),
        });

        self.record(
            AuditEvent::new(user_id, AuditAction::EmergencyDeclared)
                .with_detail(broadcast.title.clone()),
        )
        .await;

        Ok(broadcast)
    }

    /// Records an action reported by the console itself.
    pub async fn log_action(
        &self,
        user_id: PrimaryKey,
        action: AuditAction,
        detail: Option<String>,
    ) -> Result<(), AuditError> {
        let mut event = AuditEvent::new(user_id, action);
        event.detail = detail;

        self.audit.record(event).await
    }

    /// Forwards a recognized control movement from the hardware bridge.
    /// Best-effort by contract, the bridge logs failures and moves on.
    pub async fn log_control(
        &self,
        operator: PrimaryKey,
        change: ControlChange,
    ) -> Result<(), AuditError> {
        let detail = serde_json::to_string(&change).unwrap_or_default();

        self.audit
            .record(AuditEvent::new(operator, AuditAction::MixerControlChanged).with_detail(detail))
            .await
    }

    /// Replaces local state with what the realtime feed delivered.
    /// The feed is authoritative, last writer wins.
    pub(crate) fn apply_remote_change(&self, change: SessionChange) {
        match change {
            SessionChange::Updated(session) => {
                if session.status.is_terminal() {
                    self.active.remove(&session.broadcaster);
                } else {
                    self.active.insert(session.broadcaster, session.clone());
                }

                self.context.emit(StationEvent::SessionSynced { session });
            }
            SessionChange::Deleted(session_id) => {
                self.active.retain(|_, session| session.id != session_id);
                self.context.emit(StationEvent::SessionRemoved { session_id });
            }
        }
    }

    pub fn current_session(&self, broadcaster: PrimaryKey) -> Option<BroadcastSession> {
        self.active.get(&broadcaster).map(|s| s.clone())
    }

    pub fn is_live(&self, broadcaster: PrimaryKey) -> bool {
        self.current_session(broadcaster).is_some()
    }

    pub fn microphone_active(&self, broadcaster: PrimaryKey) -> bool {
        self.current_session(broadcaster)
            .map(|s| s.microphone_live)
            .unwrap_or(false)
    }

    /// The console mode of the broadcaster's session. Idle broadcasters
    /// read as automation, the mode every session starts in.
    pub fn current_mode(&self, broadcaster: PrimaryKey) -> BroadcastMode {
        self.current_session(broadcaster)
            .map(|s| s.mode)
            .unwrap_or_default()
    }

    /// Every session the station believes is on the air right now
    pub fn active_sessions(&self) -> Vec<BroadcastSession> {
        self.active.iter().map(|s| s.clone()).collect()
    }

    async fn require_active(
        &self,
        broadcaster: PrimaryKey,
    ) -> Result<BroadcastSession, BroadcastError> {
        self.context
            .database
            .active_session_for(broadcaster)
            .await
            .map_err(BroadcastError::Db)?
            .ok_or(BroadcastError::NoActiveSession)
    }

    async fn record(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(event).await {
            warn!("Failed to record audit event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::memory::MemoryDatabase;
    use crate::{audit::LogAuditSink, test_station};

    use chrono::{NaiveTime, TimeZone};
    use onair_core::{Role, SessionStatus, SlotKind, TimeSlot};

    fn alert() -> NewEmergencyAlert {
        NewEmergencyAlert {
            title: "Storm warning".to_string(),
            message: "Severe weather over the transmitter site".to_string(),
            priority: EmergencyPriority::High,
            kind: EmergencyKind::Alert,
        }
    }

    // 2026-08-04 is a tuesday
    fn tuesday_morning() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 4, 7, 30, 0).unwrap()
    }

    fn morning_slot(user: PrimaryKey) -> TimeSlot {
        TimeSlot {
            id: 1,
            name: "Morning drive".to_string(),
            assigned_user: user,
            backup_user: None,
            weekday: chrono::Weekday::Tue,
            starts_at: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            ends_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            recurring: true,
            kind: SlotKind::Live,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_admins_broadcast_at_any_time() {
        let (db, station) = test_station();
        let admin = db.add_user("admin", &[Role::Admin]);

        let session = station
            .broadcast
            .start_session(admin, SessionKind::Live)
            .await
            .expect("admin goes live without a slot");

        assert_eq!(session.mode, BroadcastMode::Automation);
        assert!(!session.microphone_live);
        assert!(station.broadcast.is_live(admin));
    }

    #[tokio::test]
    async fn test_djs_need_a_live_slot() {
        let (db, station) = test_station();
        let dj = db.add_user("dj", &[Role::Dj]);

        let refused = station
            .broadcast
            .start_session_at(dj, SessionKind::Live, tuesday_morning())
            .await;

        assert!(matches!(refused, Err(BroadcastError::OutsideTimeSlot)));
        assert!(db.all_broadcast_sessions().is_empty(), "nothing was written");

        db.add_slot(morning_slot(dj));

        station
            .broadcast
            .start_session_at(dj, SessionKind::Live, tuesday_morning())
            .await
            .expect("dj goes live inside their slot");
    }

    #[tokio::test]
    async fn test_listeners_may_not_go_live_at_all() {
        let (db, station) = test_station();
        let listener = db.add_user("fan", &[Role::Listener]);

        let refused = station
            .broadcast
            .start_session(listener, SessionKind::Live)
            .await;

        assert!(matches!(
            refused,
            Err(BroadcastError::NotAuthorized { .. })
        ));
    }

    #[tokio::test]
    async fn test_a_second_start_interrupts_the_first_session() {
        let (db, station) = test_station();
        let admin = db.add_user("admin", &[Role::Admin]);

        let first = station
            .broadcast
            .start_session(admin, SessionKind::Live)
            .await
            .unwrap();

        let second = station
            .broadcast
            .start_session(admin, SessionKind::Live)
            .await
            .unwrap();

        let sessions = db.all_broadcast_sessions();
        let stored_first = sessions.iter().find(|s| s.id == first.id).unwrap();

        assert_eq!(stored_first.status, SessionStatus::Interrupted);
        assert!(stored_first.ended_at.is_some());

        let active: Vec<_> = sessions.iter().filter(|s| s.is_active()).collect();
        assert_eq!(active.len(), 1, "exactly one session stays active");
        assert_eq!(active[0].id, second.id);
    }

    #[tokio::test]
    async fn test_ending_a_session_requires_one() {
        let (db, station) = test_station();
        let admin = db.add_user("admin", &[Role::Admin]);

        let refused = station.broadcast.end_session(admin).await;
        assert!(matches!(refused, Err(BroadcastError::NoActiveSession)));

        station
            .broadcast
            .start_session(admin, SessionKind::Live)
            .await
            .unwrap();

        let ended = station.broadcast.end_session(admin).await.unwrap();

        assert_eq!(ended.status, SessionStatus::Ended);
        assert!(ended.ended_at.is_some());
        assert!(!station.broadcast.is_live(admin));
        assert_eq!(
            station.broadcast.current_mode(admin),
            BroadcastMode::Automation,
            "idle broadcasters read as automation"
        );
    }

    #[tokio::test]
    async fn test_two_rapid_toggles_return_the_microphone_to_rest() {
        let (db, station) = test_station();
        let admin = db.add_user("admin", &[Role::Admin]);

        station
            .broadcast
            .start_session(admin, SessionKind::Live)
            .await
            .unwrap();

        assert!(station.broadcast.toggle_microphone(admin).await.unwrap());
        assert!(!station.broadcast.toggle_microphone(admin).await.unwrap());
        assert!(!station.broadcast.microphone_active(admin));
    }

    #[tokio::test]
    async fn test_presenters_may_not_switch_modes() {
        let (db, station) = test_station();
        let presenter = db.add_user("host", &[Role::Presenter]);

        db.add_slot(morning_slot(presenter));

        station
            .broadcast
            .start_session_at(presenter, SessionKind::Live, tuesday_morning())
            .await
            .unwrap();

        assert!(station
            .broadcast
            .toggle_microphone(presenter)
            .await
            .is_ok());

        let refused = station
            .broadcast
            .switch_mode(presenter, BroadcastMode::Live)
            .await;

        assert!(matches!(
            refused,
            Err(BroadcastError::NotAuthorized { .. })
        ));
    }

    #[tokio::test]
    async fn test_mode_stays_automation_until_switched() {
        let (db, station) = test_station();
        let admin = db.add_user("admin", &[Role::Admin]);

        station
            .broadcast
            .start_session(admin, SessionKind::Live)
            .await
            .unwrap();

        assert_eq!(
            station.broadcast.current_mode(admin),
            BroadcastMode::Automation
        );

        let updated = station
            .broadcast
            .switch_mode(admin, BroadcastMode::Live)
            .await
            .unwrap();

        assert_eq!(updated.mode, BroadcastMode::Live);
        assert_eq!(station.broadcast.current_mode(admin), BroadcastMode::Live);
    }

    #[tokio::test]
    async fn test_emergency_requires_the_override_capability() {
        let (db, station) = test_station();
        let dj = db.add_user("dj", &[Role::Dj]);

        let refused = station.broadcast.trigger_emergency(dj, alert()).await;

        assert!(matches!(
            refused,
            Err(BroadcastError::NotAuthorized { .. })
        ));
        assert!(db.all_emergencies().is_empty(), "nothing was written");
    }

    #[tokio::test]
    async fn test_emergency_flags_every_active_session() {
        let (db, station) = test_station();
        let admin = db.add_user("admin", &[Role::Admin]);
        let dj = db.add_user("dj", &[Role::Dj]);

        db.add_slot(morning_slot(dj));

        let admin_session = station
            .broadcast
            .start_session(admin, SessionKind::Live)
            .await
            .unwrap();

        let dj_session = station
            .broadcast
            .start_session_at(dj, SessionKind::Live, tuesday_morning())
            .await
            .unwrap();

        let broadcast = station
            .broadcast
            .trigger_emergency(admin, alert())
            .await
            .unwrap();

        assert_eq!(broadcast.affected_sessions.len(), 2);
        assert!(broadcast.affected_sessions.contains(&admin_session.id));
        assert!(broadcast.affected_sessions.contains(&dj_session.id));

        for session in db.all_broadcast_sessions() {
            assert!(session.emergency_override);
        }

        assert!(
            station
                .broadcast
                .current_session(dj)
                .unwrap()
                .emergency_override,
            "the local mirror is flagged as well"
        );
    }

    #[tokio::test]
    async fn test_remote_changes_replace_local_state() {
        let (db, station) = test_station();
        let admin = db.add_user("admin", &[Role::Admin]);

        let session = station
            .broadcast
            .start_session(admin, SessionKind::Live)
            .await
            .unwrap();

        // Another console opened the microphone
        let mut remote = session.clone();
        remote.microphone_live = true;

        station
            .broadcast
            .apply_remote_change(SessionChange::Updated(remote));

        assert!(station.broadcast.microphone_active(admin));

        // Another console ended the session
        let mut ended = session.clone();
        ended.status = SessionStatus::Ended;

        station
            .broadcast
            .apply_remote_change(SessionChange::Updated(ended));

        assert!(!station.broadcast.is_live(admin), "back to idle");

        // A deleted row also resets to idle
        station
            .broadcast
            .start_session(admin, SessionKind::Live)
            .await
            .unwrap();

        let current = station.broadcast.current_session(admin).unwrap();

        station
            .broadcast
            .apply_remote_change(SessionChange::Deleted(current.id));

        assert!(!station.broadcast.is_live(admin));
    }

    #[tokio::test]
    async fn test_restore_picks_up_sessions_from_the_store() {
        let db = Arc::new(MemoryDatabase::new());
        let admin = db.add_user("admin", &[Role::Admin]);

        db.start_broadcast_session(NewBroadcastSession {
            broadcaster_id: admin,
            kind: SessionKind::Live,
        })
        .await
        .unwrap();

        let station = crate::Station::with_database(
            db.clone(),
            Arc::new(crate::RelayPortProvider::new()),
            Arc::new(LogAuditSink),
        );

        station.broadcast.restore().await.unwrap();

        assert!(station.broadcast.is_live(admin));
    }
}
