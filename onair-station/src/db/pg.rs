use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc, Weekday};
use futures_util::StreamExt;
use serde::Deserialize;
use sqlx::{
    postgres::{PgListener, PgPoolOptions},
    Error as SqlxError, PgPool,
};

use onair_core::{
    weekday_from_index, weekday_index, BroadcastMode, BroadcastSession, EmergencyBroadcast,
    EmergencyKind, EmergencyPriority, EmergencyStatus, PrimaryKey, Role, SessionKind,
    SessionStatus, SlotKind, TimeSlot,
};

use super::{
    Database, DatabaseError, IntoDatabaseError, NewBroadcastSession, NewEmergencyBroadcast,
    NewSession, NewUser, Result, SessionChange, SessionChanges, SessionData, StartedBroadcast,
    UserData,
};

/// The notification channel fed by the broadcast_sessions trigger.
const SESSION_CHANNEL: &str = "broadcast_sessions";

/// A postgres database implementation for the station
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }

    /// Runs the bundled migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: PrimaryKey,
    username: String,
    password: String,
    display_name: String,
}

impl From<UserRow> for UserData {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            password: row.password,
            display_name: row.display_name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: PrimaryKey,
    token: String,
    expires_at: DateTime<Utc>,
    user_id: PrimaryKey,
    username: String,
    password: String,
    display_name: String,
}

impl From<SessionRow> for SessionData {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            user: UserData {
                id: row.user_id,
                username: row.username,
                password: row.password,
                display_name: row.display_name,
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct TimeSlotRow {
    id: PrimaryKey,
    name: String,
    assigned_user_id: PrimaryKey,
    backup_user_id: Option<PrimaryKey>,
    day_of_week: i16,
    starts_at: NaiveTime,
    ends_at: NaiveTime,
    recurring: bool,
    kind: String,
    active: bool,
}

impl TryFrom<TimeSlotRow> for TimeSlot {
    type Error = DatabaseError;

    fn try_from(row: TimeSlotRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            assigned_user: row.assigned_user_id,
            backup_user: row.backup_user_id,
            weekday: weekday_from_index(row.day_of_week)
                .ok_or(DatabaseError::corrupt("time slot", "day_of_week"))?,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            recurring: row.recurring,
            kind: SlotKind::from_name(&row.kind)
                .ok_or(DatabaseError::corrupt("time slot", "kind"))?,
            active: row.active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BroadcastSessionRow {
    id: PrimaryKey,
    broadcaster_id: PrimaryKey,
    kind: String,
    status: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    microphone_live: bool,
    mode: String,
    emergency_override: bool,
    notes: Option<String>,
}

impl TryFrom<BroadcastSessionRow> for BroadcastSession {
    type Error = DatabaseError;

    fn try_from(row: BroadcastSessionRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            broadcaster: row.broadcaster_id,
            kind: SessionKind::from_name(&row.kind)
                .ok_or(DatabaseError::corrupt("broadcast session", "kind"))?,
            status: SessionStatus::from_name(&row.status)
                .ok_or(DatabaseError::corrupt("broadcast session", "status"))?,
            started_at: row.started_at,
            ended_at: row.ended_at,
            microphone_live: row.microphone_live,
            mode: BroadcastMode::from_name(&row.mode)
                .ok_or(DatabaseError::corrupt("broadcast session", "mode"))?,
            emergency_override: row.emergency_override,
            notes: row.notes,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EmergencyRow {
    id: PrimaryKey,
    title: String,
    message: String,
    priority: String,
    kind: String,
    triggered_by: PrimaryKey,
    status: String,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    affected_sessions: Vec<PrimaryKey>,
}

impl TryFrom<EmergencyRow> for EmergencyBroadcast {
    type Error = DatabaseError;

    fn try_from(row: EmergencyRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            title: row.title,
            message: row.message,
            priority: EmergencyPriority::from_name(&row.priority)
                .ok_or(DatabaseError::corrupt("emergency broadcast", "priority"))?,
            kind: EmergencyKind::from_name(&row.kind)
                .ok_or(DatabaseError::corrupt("emergency broadcast", "kind"))?,
            triggered_by: row.triggered_by,
            status: EmergencyStatus::from_name(&row.status)
                .ok_or(DatabaseError::corrupt("emergency broadcast", "status"))?,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
            affected_sessions: row.affected_sessions,
        })
    }
}

/// The payload the broadcast_sessions trigger publishes on pg_notify.
#[derive(Debug, Deserialize)]
struct SessionNotification {
    op: String,
    #[serde(default)]
    id: Option<PrimaryKey>,
    #[serde(default)]
    session: Option<WireSession>,
}

#[derive(Debug, Deserialize)]
struct WireSession {
    id: PrimaryKey,
    broadcaster_id: PrimaryKey,
    kind: String,
    status: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    microphone_live: bool,
    mode: String,
    emergency_override: bool,
    notes: Option<String>,
}

impl SessionNotification {
    fn into_change(self) -> Option<SessionChange> {
        match self.op.as_str() {
            "delete" => self.id.map(SessionChange::Deleted),
            "insert" | "update" => {
                let session = self.session?;

                Some(SessionChange::Updated(BroadcastSession {
                    id: session.id,
                    broadcaster: session.broadcaster_id,
                    kind: SessionKind::from_name(&session.kind)?,
                    status: SessionStatus::from_name(&session.status)?,
                    started_at: session.started_at,
                    ended_at: session.ended_at,
                    microphone_live: session.microphone_live,
                    mode: BroadcastMode::from_name(&session.mode)?,
                    emergency_override: session.emergency_override,
                    notes: session.notes,
                }))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn check_for_admin(&self) -> Result<bool> {
        let row: Option<(PrimaryKey,)> =
            sqlx::query_as("SELECT user_id FROM user_roles WHERE role = 'admin' LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| e.any())?;

        Ok(row.is_some())
    }

    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("user", "username"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (username, password, display_name)
             VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(&new_user.username)
        .bind(&new_user.password)
        .bind(&new_user.display_name)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.conflict_or_any("user", "username", &new_user.username))
    }

    async fn roles_for_user(&self, user_id: PrimaryKey) -> Result<Vec<Role>> {
        let names: Vec<(String,)> =
            sqlx::query_as("SELECT role FROM user_roles WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.any())?;

        Ok(names
            .into_iter()
            .filter_map(|(name,)| Role::from_name(&name))
            .collect())
    }

    async fn assign_role(&self, user_id: PrimaryKey, role: Role) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role)
             VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role.name())
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        sqlx::query_as::<_, SessionRow>(
            "SELECT
                sessions.*,
                users.username,
                users.password,
                users.display_name
            FROM sessions
                INNER JOIN users ON sessions.user_id = users.id
            WHERE token = $1",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.not_found_or("session", "token"))
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let (token,): (String,) = sqlx::query_as(
            "INSERT INTO sessions (token, user_id, expires_at)
             VALUES ($1, $2, $3)
             RETURNING token",
        )
        .bind(&new_session.token)
        .bind(new_session.user_id)
        .bind(new_session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.conflict_or_any("session", "token", &new_session.token))?;

        self.session_by_token(&token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        // Ensure session exists
        let _ = self.session_by_token(token).await?;

        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE now() > expires_at")
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn slots_for_day(&self, weekday: Weekday) -> Result<Vec<TimeSlot>> {
        let rows: Vec<TimeSlotRow> = sqlx::query_as(
            "SELECT * FROM time_slots WHERE day_of_week = $1 ORDER BY starts_at, id",
        )
        .bind(weekday_index(weekday))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn slots_for_user(&self, user_id: PrimaryKey) -> Result<Vec<TimeSlot>> {
        let rows: Vec<TimeSlotRow> = sqlx::query_as(
            "SELECT * FROM time_slots
             WHERE assigned_user_id = $1 OR backup_user_id = $1
             ORDER BY day_of_week, starts_at, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn active_session_for(
        &self,
        broadcaster_id: PrimaryKey,
    ) -> Result<Option<BroadcastSession>> {
        let row: Option<BroadcastSessionRow> = sqlx::query_as(
            "SELECT * FROM broadcast_sessions
             WHERE broadcaster_id = $1 AND status = 'active'",
        )
        .bind(broadcaster_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.any())?;

        row.map(TryInto::try_into).transpose()
    }

    async fn active_sessions(&self) -> Result<Vec<BroadcastSession>> {
        let rows: Vec<BroadcastSessionRow> =
            sqlx::query_as("SELECT * FROM broadcast_sessions WHERE status = 'active'")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.any())?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn start_broadcast_session(
        &self,
        new_session: NewBroadcastSession,
    ) -> Result<StartedBroadcast> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let interrupted: Vec<(PrimaryKey,)> = sqlx::query_as(
            "UPDATE broadcast_sessions
             SET status = 'interrupted', ended_at = now()
             WHERE broadcaster_id = $1 AND status = 'active'
             RETURNING id",
        )
        .bind(new_session.broadcaster_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        let row: BroadcastSessionRow = sqlx::query_as(
            "INSERT INTO broadcast_sessions (broadcaster_id, kind)
             VALUES ($1, $2)
             RETURNING *",
        )
        .bind(new_session.broadcaster_id)
        .bind(new_session.kind.name())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            e.conflict_or_any(
                "broadcast session",
                "broadcaster",
                &new_session.broadcaster_id.to_string(),
            )
        })?;

        tx.commit().await.map_err(|e| e.any())?;

        Ok(StartedBroadcast {
            session: row.try_into()?,
            interrupted: interrupted.into_iter().map(|(id,)| id).collect(),
        })
    }

    async fn end_broadcast_session(&self, session_id: PrimaryKey) -> Result<BroadcastSession> {
        let row: BroadcastSessionRow = sqlx::query_as(
            "UPDATE broadcast_sessions
             SET status = 'ended', ended_at = now()
             WHERE id = $1 AND status = 'active'
             RETURNING *",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("broadcast session", "id"))?;

        row.try_into()
    }

    async fn set_session_microphone(
        &self,
        session_id: PrimaryKey,
        live: bool,
    ) -> Result<BroadcastSession> {
        let row: BroadcastSessionRow = sqlx::query_as(
            "UPDATE broadcast_sessions
             SET microphone_live = $2
             WHERE id = $1 AND status = 'active'
             RETURNING *",
        )
        .bind(session_id)
        .bind(live)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("broadcast session", "id"))?;

        row.try_into()
    }

    async fn set_session_mode(
        &self,
        session_id: PrimaryKey,
        mode: BroadcastMode,
    ) -> Result<BroadcastSession> {
        let row: BroadcastSessionRow = sqlx::query_as(
            "UPDATE broadcast_sessions
             SET mode = $2
             WHERE id = $1 AND status = 'active'
             RETURNING *",
        )
        .bind(session_id)
        .bind(mode.name())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("broadcast session", "id"))?;

        row.try_into()
    }

    async fn create_emergency_broadcast(
        &self,
        new_broadcast: NewEmergencyBroadcast,
    ) -> Result<EmergencyBroadcast> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let (broadcast_id,): (PrimaryKey,) = sqlx::query_as(
            "INSERT INTO emergency_broadcasts (title, message, priority, kind, triggered_by)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(&new_broadcast.title)
        .bind(&new_broadcast.message)
        .bind(new_broadcast.priority.name())
        .bind(new_broadcast.kind.name())
        .bind(new_broadcast.triggered_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        let affected: Vec<(PrimaryKey,)> = sqlx::query_as(
            "UPDATE broadcast_sessions
             SET emergency_override = true
             WHERE status = 'active'
             RETURNING id",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        let affected: Vec<PrimaryKey> = affected.into_iter().map(|(id,)| id).collect();

        let row: EmergencyRow = sqlx::query_as(
            "UPDATE emergency_broadcasts
             SET affected_sessions = $2
             WHERE id = $1
             RETURNING *",
        )
        .bind(broadcast_id)
        .bind(&affected)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())?;

        row.try_into()
    }

    async fn watch_sessions(&self) -> Result<SessionChanges> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| e.any())?;

        listener.listen(SESSION_CHANNEL).await.map_err(|e| e.any())?;

        let stream = listener.into_stream().filter_map(|notification| {
            let change = notification
                .ok()
                .and_then(|n| serde_json::from_str::<SessionNotification>(n.payload()).ok())
                .and_then(SessionNotification::into_change);

            async move { change }
        });

        Ok(Box::pin(stream))
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => e.any(),
        }
    }

    fn conflict_or_any(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> DatabaseError {
        if let SqlxError::Database(ref e) = self {
            if e.is_unique_violation() {
                return DatabaseError::Conflict {
                    resource,
                    field,
                    value: value.to_string(),
                };
            }
        }

        self.any()
    }
}
