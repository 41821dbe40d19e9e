use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use log::warn;
use rand::rngs::OsRng;
use std::sync::Arc;
use thiserror::Error;

use onair_core::{PrimaryKey, Role};

use crate::{
    util::random_string, Database, DatabaseError, NewSession, NewUser, SessionData, UserData,
};

pub struct Auth<Db> {
    db: Arc<Db>,
    argon: Argon2<'static>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Username or password is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("An admin already exists")]
    AdminExists,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
}

impl<Db> Auth<Db>
where
    Db: Database,
{
    const SESSION_DURATION_IN_DAYS: i64 = 7;

    pub fn new(db: &Arc<Db>) -> Self {
        Self {
            db: db.clone(),
            argon: Argon2::default(),
        }
    }

    /// Logs in a user, returning a new session
    pub async fn login(&self, credentials: Credentials) -> Result<SessionData, AuthError> {
        self.clear_expired().await;

        let user = self
            .db
            .user_by_username(&credentials.username)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => AuthError::InvalidCredentials,
                err => AuthError::Db(err),
            })?;

        let stored_password = PasswordHash::parse(&user.password, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(credentials.password.as_bytes(), &stored_password)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let expires_at = Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS);

        let new_session = NewSession {
            token: random_string(32),
            user_id: user.id,
            expires_at,
        };

        self.db
            .create_session(new_session)
            .await
            .map_err(AuthError::Db)
    }

    /// Deletes the associated session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), DatabaseError> {
        self.db.delete_session_by_token(token).await
    }

    /// Creates the station's first admin, refusing if one already exists
    pub async fn register_first_admin(
        &self,
        new_user: NewPlainUser,
    ) -> Result<UserData, AuthError> {
        let has_admin = self.db.check_for_admin().await.map_err(AuthError::Db)?;

        if has_admin {
            return Err(AuthError::AdminExists);
        }

        self.create_user(new_user, &[Role::Admin]).await
    }

    /// Creates a user with the given roles
    pub async fn create_user(
        &self,
        new_user: NewPlainUser,
        roles: &[Role],
    ) -> Result<UserData, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hashed_password = self
            .argon
            .hash_password(new_user.password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        let user = self
            .db
            .create_user(NewUser {
                username: new_user.username,
                password: hashed_password,
                display_name: new_user.display_name,
            })
            .await
            .map_err(AuthError::Db)?;

        for role in roles {
            self.db
                .assign_role(user.id, *role)
                .await
                .map_err(AuthError::Db)?;
        }

        Ok(user)
    }

    /// Returns a session if it exists
    pub async fn session(&self, token: &str) -> Result<SessionData, DatabaseError> {
        self.db.session_by_token(token).await
    }

    pub async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData, DatabaseError> {
        self.db.user_by_id(user_id).await
    }

    async fn clear_expired(&self) {
        if let Err(e) = self.db.clear_expired_sessions().await {
            warn!("Failed to clear expired sessions: {e}");
        }
    }
}

#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug)]
pub struct NewPlainUser {
    pub username: String,
    pub password: String,
    pub display_name: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::memory::MemoryDatabase;

    fn plain_user(name: &str) -> NewPlainUser {
        NewPlainUser {
            username: name.to_string(),
            password: "correct horse".to_string(),
            display_name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_admin_registers_exactly_once() {
        let db = Arc::new(MemoryDatabase::new());
        let auth = Auth::new(&db);

        auth.register_first_admin(plain_user("morgan"))
            .await
            .expect("first admin registers");

        let error = auth
            .register_first_admin(plain_user("casey"))
            .await
            .unwrap_err();

        assert!(matches!(error, AuthError::AdminExists));
    }

    #[tokio::test]
    async fn test_login_verifies_the_password() {
        let db = Arc::new(MemoryDatabase::new());
        let auth = Auth::new(&db);

        auth.register_first_admin(plain_user("morgan"))
            .await
            .expect("admin registers");

        let session = auth
            .login(Credentials {
                username: "morgan".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .expect("login succeeds");

        assert_eq!(session.user.username, "morgan");

        let refused = auth
            .login(Credentials {
                username: "morgan".to_string(),
                password: "battery staple".to_string(),
            })
            .await;

        assert!(matches!(refused, Err(AuthError::InvalidCredentials)));
    }
}
