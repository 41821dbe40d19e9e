use std::sync::Arc;

use log::warn;

use onair_core::{Capabilities, PrimaryKey, Role};

use crate::Database;

/// Resolves what a user is allowed to do from their assigned roles.
/// Capabilities are recomputed from the store on every check, so a
/// role change takes effect on the next operation.
pub struct Access<Db> {
    db: Arc<Db>,
}

impl<Db> Access<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>) -> Self {
        Self { db: db.clone() }
    }

    /// The capability set for a user. A failed read resolves to no
    /// capabilities at all, never to a guess.
    pub async fn capabilities_for(&self, user_id: PrimaryKey) -> Capabilities {
        match self.db.roles_for_user(user_id).await {
            Ok(roles) => Capabilities::from_roles(&roles),
            Err(e) => {
                warn!("Failed to resolve roles for user {user_id}: {e}");
                Capabilities::none()
            }
        }
    }

    /// Whether the user holds the admin role. Fails closed like
    /// [Self::capabilities_for].
    pub async fn is_admin(&self, user_id: PrimaryKey) -> bool {
        match self.db.roles_for_user(user_id).await {
            Ok(roles) => roles.contains(&Role::Admin),
            Err(e) => {
                warn!("Failed to resolve roles for user {user_id}: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::memory::MemoryDatabase;

    #[tokio::test]
    async fn test_capabilities_come_from_assigned_roles() {
        let db = Arc::new(MemoryDatabase::new());
        let access = Access::new(&db);

        let dj = db.add_user("dj", &[Role::Dj]);
        let nobody = db.add_user("nobody", &[]);

        assert!(access.capabilities_for(dj).await.can_control_music);
        assert_eq!(access.capabilities_for(nobody).await, Capabilities::none());
    }

    #[tokio::test]
    async fn test_resolution_fails_closed() {
        let db = Arc::new(MemoryDatabase::new());
        let access = Access::new(&db);

        let admin = db.add_user("admin", &[Role::Admin]);
        db.set_failing(true);

        assert_eq!(access.capabilities_for(admin).await, Capabilities::none());
        assert!(!access.is_admin(admin).await);
    }
}
