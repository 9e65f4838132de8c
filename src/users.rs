use std::sync::Arc;
use teloxide::types::UserId;

use crate::database::{DatabaseError, DatabasePool};

/// Users who have sent `/start`, the audience of a broadcast.
#[derive(Clone)]
pub struct UserRegistry {
    pool: Arc<DatabasePool>,
}

impl UserRegistry {
    pub fn new(pool: Arc<DatabasePool>) -> Self {
        Self { pool }
    }

    /// Registers `user`. Repeated calls keep a single row; returns whether
    /// the user was new.
    pub async fn upsert(&self, user: UserId) -> Result<bool, DatabaseError> {
        let user_id = user.0 as i64;
        self.pool
            .execute_with_timeout(move |conn| {
                conn.execute("INSERT OR IGNORE INTO users (user_id) VALUES (?1)", [user_id])
            })
            .await
            .map(|inserted| inserted > 0)
    }

    pub async fn count(&self) -> Result<u64, DatabaseError> {
        self.pool
            .execute_with_timeout(|conn| {
                conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get::<_, i64>(0))
            })
            .await
            .map(|n| n as u64)
    }

    pub async fn all(&self) -> Result<Vec<UserId>, DatabaseError> {
        self.pool
            .execute_with_timeout(|conn| {
                let mut stmt = conn.prepare("SELECT user_id FROM users ORDER BY rowid")?;
                let users_iter = stmt.query_map([], |row| row.get::<_, i64>(0))?;
                let mut users = Vec::new();
                for user_result in users_iter {
                    users.push(UserId(user_result? as u64));
                }
                Ok(users)
            })
            .await
    }

    /// Returns whether a row was deleted.
    pub async fn remove(&self, user: UserId) -> Result<bool, DatabaseError> {
        let user_id = user.0 as i64;
        self.pool
            .execute_with_timeout(move |conn| {
                conn.execute("DELETE FROM users WHERE user_id = ?1", [user_id])
            })
            .await
            .map(|deleted| deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::temp_pool;

    #[tokio::test]
    async fn test_repeated_upsert_keeps_one_row() {
        let (pool, _dir) = temp_pool().await;
        let registry = UserRegistry::new(pool);

        assert!(registry.upsert(UserId(42)).await.unwrap());
        for _ in 0..3 {
            assert!(!registry.upsert(UserId(42)).await.unwrap());
        }
        registry.upsert(UserId(43)).await.unwrap();

        assert_eq!(registry.count().await.unwrap(), 2);
        assert_eq!(registry.all().await.unwrap(), vec![UserId(42), UserId(43)]);
    }

    #[tokio::test]
    async fn test_remove() {
        let (pool, _dir) = temp_pool().await;
        let registry = UserRegistry::new(pool);
        registry.upsert(UserId(1)).await.unwrap();
        registry.upsert(UserId(2)).await.unwrap();

        assert!(registry.remove(UserId(1)).await.unwrap());
        assert!(!registry.remove(UserId(1)).await.unwrap());
        assert_eq!(registry.all().await.unwrap(), vec![UserId(2)]);
    }

    #[tokio::test]
    async fn test_large_user_ids_survive_storage() {
        let (pool, _dir) = temp_pool().await;
        let registry = UserRegistry::new(pool);
        let id = UserId(7_123_456_789);
        registry.upsert(id).await.unwrap();
        assert_eq!(registry.all().await.unwrap(), vec![id]);
    }
}
