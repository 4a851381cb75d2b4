use libsql::{Builder, Connection};
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::Result;

/// Handle to the libsql database holding the vector collections.
///
/// A single connection is opened and shared: `:memory:` databases are
/// per-connection, so every caller must see the same one.
#[derive(Clone)]
pub struct Database {
    _db: Arc<libsql::Database>,
    conn: Connection,
    local_file: bool,
}

impl Database {
    pub async fn new(config: &StoreConfig) -> Result<Self> {
        let busy_timeout_ms = std::env::var("VECTOR_STORE_BUSY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5000);

        let db = if is_remote(&config.url) {
            Builder::new_remote(
                config.url.clone(),
                config.auth_token.clone().unwrap_or_default(),
            )
            .build()
            .await?
        } else if config.is_in_memory() {
            Builder::new_local(":memory:").build().await?
        } else {
            let path = config.url.strip_prefix("file:").unwrap_or(&config.url);
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Builder::new_local(path).build().await?
        };

        let local_file = !config.is_in_memory() && !is_remote(&config.url);
        let conn = db.connect()?;
        configure(&conn, busy_timeout_ms, local_file).await;

        Ok(Self {
            _db: Arc::new(db),
            conn,
            local_file,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Folds the WAL back into the database file.
    pub async fn checkpoint(&self) -> Result<()> {
        if self.local_file {
            self.conn
                .execute_batch("PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }
        Ok(())
    }
}

fn is_remote(url: &str) -> bool {
    url.starts_with("libsql://") || url.starts_with("https://")
}

async fn configure(conn: &Connection, busy_timeout_ms: u64, wal: bool) {
    let busy_timeout_sql = format!("PRAGMA busy_timeout = {busy_timeout_ms}");
    if let Err(error) = conn.execute_batch(&busy_timeout_sql).await {
        tracing::warn!(busy_timeout_ms, error = %error, "Failed to set SQLite busy_timeout");
    }

    if wal {
        if let Err(error) = conn.execute_batch("PRAGMA journal_mode = WAL").await {
            tracing::warn!(error = %error, "Failed to set SQLite journal_mode");
        }
    }
}
