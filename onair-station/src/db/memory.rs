//! An in-memory [Database] used by the station's tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc, Weekday};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use onair_core::{
    BroadcastMode, BroadcastSession, EmergencyBroadcast, EmergencyStatus, PrimaryKey, Role,
    SessionStatus, TimeSlot,
};

use super::{
    Database, DatabaseError, NewBroadcastSession, NewEmergencyBroadcast, NewSession, NewUser,
    Result, SessionChange, SessionChanges, SessionData, StartedBroadcast, UserData,
};

pub struct MemoryDatabase {
    state: Mutex<State>,
    feed: broadcast::Sender<SessionChange>,
    /// When set, every operation fails. Used to test fail-closed paths.
    failing: AtomicBool,
}

#[derive(Default)]
struct State {
    next_id: PrimaryKey,
    users: Vec<UserData>,
    sessions: Vec<StoredSession>,
    roles: HashMap<PrimaryKey, Vec<Role>>,
    slots: Vec<TimeSlot>,
    broadcasts: Vec<BroadcastSession>,
    emergencies: Vec<EmergencyBroadcast>,
}

struct StoredSession {
    id: PrimaryKey,
    token: String,
    user_id: PrimaryKey,
    expires_at: DateTime<Utc>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(64);

        Self {
            state: Mutex::new(State::default()),
            feed,
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Creates a user with the given roles, returning its id.
    pub fn add_user(&self, username: &str, roles: &[Role]) -> PrimaryKey {
        let mut state = self.state.lock();
        let id = state.allocate_id();

        state.users.push(UserData {
            id,
            username: username.to_string(),
            password: String::new(),
            display_name: username.to_string(),
        });
        state.roles.insert(id, roles.to_vec());

        id
    }

    pub fn add_slot(&self, slot: TimeSlot) {
        self.state.lock().slots.push(slot)
    }

    pub fn all_broadcast_sessions(&self) -> Vec<BroadcastSession> {
        self.state.lock().broadcasts.clone()
    }

    pub fn all_emergencies(&self) -> Vec<EmergencyBroadcast> {
        self.state.lock().emergencies.clone()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(DatabaseError::Internal("injected failure".into()));
        }

        Ok(())
    }

    fn publish(&self, change: SessionChange) {
        // Nobody watching is fine
        let _ = self.feed.send(change);
    }
}

impl State {
    fn allocate_id(&mut self) -> PrimaryKey {
        self.next_id += 1;
        self.next_id
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn check_for_admin(&self) -> Result<bool> {
        self.check()?;

        Ok(self
            .state
            .lock()
            .roles
            .values()
            .any(|roles| roles.contains(&Role::Admin)))
    }

    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.check()?;

        self.state
            .lock()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        self.check()?;

        self.state
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "username",
            })
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.check()?;

        let mut state = self.state.lock();

        if state.users.iter().any(|u| u.username == new_user.username) {
            return Err(DatabaseError::Conflict {
                resource: "user",
                field: "username",
                value: new_user.username,
            });
        }

        let id = state.allocate_id();
        let user = UserData {
            id,
            username: new_user.username,
            password: new_user.password,
            display_name: new_user.display_name,
        };

        state.users.push(user.clone());
        Ok(user)
    }

    async fn roles_for_user(&self, user_id: PrimaryKey) -> Result<Vec<Role>> {
        self.check()?;

        Ok(self
            .state
            .lock()
            .roles
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn assign_role(&self, user_id: PrimaryKey, role: Role) -> Result<()> {
        self.check()?;

        let mut state = self.state.lock();
        let roles = state.roles.entry(user_id).or_default();

        if !roles.contains(&role) {
            roles.push(role)
        }

        Ok(())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        self.check()?;

        let state = self.state.lock();

        let session = state
            .sessions
            .iter()
            .find(|s| s.token == token)
            .ok_or(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            })?;

        let user = state
            .users
            .iter()
            .find(|u| u.id == session.user_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })?;

        Ok(SessionData {
            id: session.id,
            token: session.token.clone(),
            expires_at: session.expires_at,
            user,
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.check()?;

        {
            let mut state = self.state.lock();
            let id = state.allocate_id();

            state.sessions.push(StoredSession {
                id,
                token: new_session.token.clone(),
                user_id: new_session.user_id,
                expires_at: new_session.expires_at,
            });
        }

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        self.check()?;

        self.state.lock().sessions.retain(|s| s.token != token);
        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        self.check()?;

        let now = Utc::now();
        self.state.lock().sessions.retain(|s| s.expires_at > now);
        Ok(())
    }

    async fn slots_for_day(&self, weekday: Weekday) -> Result<Vec<TimeSlot>> {
        self.check()?;

        let mut slots: Vec<_> = self
            .state
            .lock()
            .slots
            .iter()
            .filter(|s| s.weekday == weekday)
            .cloned()
            .collect();

        slots.sort_by_key(|s| (s.starts_at, s.id));
        Ok(slots)
    }

    async fn slots_for_user(&self, user_id: PrimaryKey) -> Result<Vec<TimeSlot>> {
        self.check()?;

        Ok(self
            .state
            .lock()
            .slots
            .iter()
            .filter(|s| s.assigned_user == user_id || s.backup_user == Some(user_id))
            .cloned()
            .collect())
    }

    async fn active_session_for(
        &self,
        broadcaster_id: PrimaryKey,
    ) -> Result<Option<BroadcastSession>> {
        self.check()?;

        Ok(self
            .state
            .lock()
            .broadcasts
            .iter()
            .find(|s| s.broadcaster == broadcaster_id && s.is_active())
            .cloned())
    }

    async fn active_sessions(&self) -> Result<Vec<BroadcastSession>> {
        self.check()?;

        Ok(self
            .state
            .lock()
            .broadcasts
            .iter()
            .filter(|s| s.is_active())
            .cloned()
            .collect())
    }

    async fn start_broadcast_session(
        &self,
        new_session: NewBroadcastSession,
    ) -> Result<StartedBroadcast> {
        self.check()?;

        let mut changes = vec![];

        let started = {
            let mut state = self.state.lock();
            let mut interrupted = vec![];

            for session in state
                .broadcasts
                .iter_mut()
                .filter(|s| s.broadcaster == new_session.broadcaster_id && s.is_active())
            {
                session.status = SessionStatus::Interrupted;
                session.ended_at = Some(Utc::now());

                interrupted.push(session.id);
                changes.push(SessionChange::Updated(session.clone()));
            }

            let id = state.allocate_id();
            let session = BroadcastSession {
                id,
                broadcaster: new_session.broadcaster_id,
                kind: new_session.kind,
                status: SessionStatus::Active,
                started_at: Utc::now(),
                ended_at: None,
                microphone_live: false,
                mode: BroadcastMode::Automation,
                emergency_override: false,
                notes: None,
            };

            state.broadcasts.push(session.clone());
            changes.push(SessionChange::Updated(session.clone()));

            StartedBroadcast {
                session,
                interrupted,
            }
        };

        for change in changes {
            self.publish(change)
        }

        Ok(started)
    }

    async fn end_broadcast_session(&self, session_id: PrimaryKey) -> Result<BroadcastSession> {
        self.check()?;

        let session = {
            let mut state = self.state.lock();

            let session = state
                .broadcasts
                .iter_mut()
                .find(|s| s.id == session_id && s.is_active())
                .ok_or(DatabaseError::NotFound {
                    resource: "broadcast session",
                    identifier: "id",
                })?;

            session.status = SessionStatus::Ended;
            session.ended_at = Some(Utc::now());
            session.clone()
        };

        self.publish(SessionChange::Updated(session.clone()));
        Ok(session)
    }

    async fn set_session_microphone(
        &self,
        session_id: PrimaryKey,
        live: bool,
    ) -> Result<BroadcastSession> {
        self.check()?;

        let session = {
            let mut state = self.state.lock();

            let session = state
                .broadcasts
                .iter_mut()
                .find(|s| s.id == session_id && s.is_active())
                .ok_or(DatabaseError::NotFound {
                    resource: "broadcast session",
                    identifier: "id",
                })?;

            session.microphone_live = live;
            session.clone()
        };

        self.publish(SessionChange::Updated(session.clone()));
        Ok(session)
    }

    async fn set_session_mode(
        &self,
        session_id: PrimaryKey,
        mode: BroadcastMode,
    ) -> Result<BroadcastSession> {
        self.check()?;

        let session = {
            let mut state = self.state.lock();

            let session = state
                .broadcasts
                .iter_mut()
                .find(|s| s.id == session_id && s.is_active())
                .ok_or(DatabaseError::NotFound {
                    resource: "broadcast session",
                    identifier: "id",
                })?;

            session.mode = mode;
            session.clone()
        };

        self.publish(SessionChange::Updated(session.clone()));
        Ok(session)
    }

    async fn create_emergency_broadcast(
        &self,
        new_broadcast: NewEmergencyBroadcast,
    ) -> Result<EmergencyBroadcast> {
        self.check()?;

        let (broadcast, changes) = {
            let mut state = self.state.lock();
            let mut affected = vec![];
            let mut changes = vec![];

            for session in state.broadcasts.iter_mut().filter(|s| s.is_active()) {
                session.emergency_override = true;

                affected.push(session.id);
                changes.push(SessionChange::Updated(session.clone()));
            }

            let id = state.allocate_id();
            let broadcast = EmergencyBroadcast {
                id,
                title: new_broadcast.title,
                message: new_broadcast.message,
                priority: new_broadcast.priority,
                kind: new_broadcast.kind,
                triggered_by: new_broadcast.triggered_by,
                status: EmergencyStatus::Issued,
                created_at: Utc::now(),
                resolved_at: None,
                affected_sessions: affected,
            };

            state.emergencies.push(broadcast.clone());
            (broadcast, changes)
        };

        for change in changes {
            self.publish(change)
        }

        Ok(broadcast)
    }

    async fn watch_sessions(&self) -> Result<SessionChanges> {
        self.check()?;

        let receiver = self.feed.subscribe();

        let stream = futures_util::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(change) => return Some((change, receiver)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
