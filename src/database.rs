use rusqlite::Connection;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::{Duration, timeout};

const QUERY_TIMEOUT: Duration = Duration::from_secs(10);
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("database pool closed")]
    Closed,
}

/// Bounded access to the SQLite file. Each call opens its own connection on
/// the blocking pool; the semaphore caps how many run at once.
pub struct DatabasePool {
    path: String,
    permits: Arc<Semaphore>,
}

impl DatabasePool {
    pub fn new(path: impl Into<String>, max_connections: usize) -> Self {
        Self {
            path: path.into(),
            permits: Arc::new(Semaphore::new(max_connections.max(1))),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn execute_with_timeout<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DatabaseError::Closed)?;

        let path = self.path.clone();
        let task = tokio::task::spawn_blocking(move || -> rusqlite::Result<T> {
            let mut conn = open_connection(&path)?;
            f(&mut conn)
        });

        match timeout(QUERY_TIMEOUT, task).await {
            Ok(joined) => Ok(joined??),
            Err(_) => Err(DatabaseError::Timeout(QUERY_TIMEOUT)),
        }
    }
}

fn open_connection(path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
    Ok(conn)
}

/// Creates the tables if they do not exist yet.
pub async fn init_database(pool: &DatabasePool) -> Result<(), DatabaseError> {
    if let Some(parent) = std::path::Path::new(pool.path()).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Failed to create database directory {:?}: {}", parent, e);
            }
        }
    }

    pool.execute_with_timeout(|conn| {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS stats (
                id TEXT PRIMARY KEY,
                today INTEGER NOT NULL,
                month INTEGER NOT NULL,
                total INTEGER NOT NULL,
                date TEXT NOT NULL,
                month_no INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                started_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );",
        )
    })
    .await
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    /// A pool over a fresh database file with the schema applied. Keep the
    /// returned directory alive for as long as the pool is used.
    pub async fn temp_pool() -> (Arc<DatabasePool>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let pool = Arc::new(DatabasePool::new(path.to_string_lossy().to_string(), 3));
        init_database(&pool).await.unwrap();
        (pool, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::temp_pool;
    use super::*;

    #[tokio::test]
    async fn test_init_creates_tables() {
        let (pool, _dir) = temp_pool().await;
        let tables = pool
            .execute_with_timeout(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
                names.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await
            .unwrap();
        assert_eq!(tables, vec!["stats".to_string(), "users".to_string()]);
    }

    #[tokio::test]
    async fn test_init_is_repeatable() {
        let (pool, _dir) = temp_pool().await;
        init_database(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_sqlite_errors_are_propagated() {
        let (pool, _dir) = temp_pool().await;
        let result = pool
            .execute_with_timeout(|conn| conn.execute("SELECT * FROM missing_table", []))
            .await;
        assert!(matches!(result, Err(DatabaseError::Sqlite(_))));
    }

    #[tokio::test]
    async fn test_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bot.db");
        let pool = DatabasePool::new(path.to_string_lossy().to_string(), 1);
        init_database(&pool).await.unwrap();
        assert!(path.exists());
    }
}
