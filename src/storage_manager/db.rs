use std::fs;
use std::path::{Path, PathBuf};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::error::AppError;

pub const DATABASE_FILE: &str = "diotrix-gallery.db";

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Create a pool for the database at `path`, creating parent directories as
/// needed and initializing the schema on the first connection.
pub fn create_pool(path: &Path) -> Result<DbPool, AppError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            r#"
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA temp_store=MEMORY;
                PRAGMA cache_size=-8000;
                PRAGMA wal_autocheckpoint=1000;
                PRAGMA foreign_keys=ON;
                "#,
        )
    });

    let pool = Pool::builder()
        .max_size(10)
        .build(manager)
        .map_err(|e| AppError::Persistence(format!("Failed to create pool: {}", e)))?;

    let conn = pool.get()?;
    init_schema(&conn)?;

    Ok(pool)
}

/// Idempotent schema setup, safe to run on every start.
pub fn init_schema(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS generated_images (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          uri TEXT NOT NULL,
          prompt TEXT NOT NULL,
          metadata TEXT,
          created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_generated_images_created
          ON generated_images(created_at);

        CREATE TABLE IF NOT EXISTS kv_store (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL,
          updated_at INTEGER NOT NULL
        );
      "#,
    )?;
    Ok(())
}

/// Remove the database file and its WAL side files. The pool holding the
/// database open must be dropped before calling this.
pub fn delete_database_files(path: &Path) -> Result<(), AppError> {
    for suffix in ["", "-wal", "-shm"] {
        let target = if suffix.is_empty() {
            path.to_path_buf()
        } else {
            PathBuf::from(format!("{}{}", path.display(), suffix))
        };
        match fs::remove_file(&target) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Run a closure against a pooled connection on the blocking thread pool.
pub(crate) async fn with_conn<T, F>(pool: &DbPool, f: F) -> Result<T, AppError>
where
    F: FnOnce(&mut DbConnection) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await
    .map_err(|e| AppError::Persistence(format!("Storage task failed: {}", e)))?
}
