//! SQLite-backed record store.
//!
//! rusqlite is blocking, so every call runs on `spawn_blocking` with the
//! connection behind a mutex.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mailrule_domain::{EmailRecord, RecordStore};
use mailrule_error::MailError;
use rusqlite::{params, Connection};
use tracing::{debug, info};

const CREATE_EMAILS: &str = r#"
CREATE TABLE IF NOT EXISTS emails (
    id TEXT PRIMARY KEY,
    subject TEXT,
    sender TEXT,
    snippet TEXT,
    date TEXT
)
"#;

pub struct SqliteStore {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and its parent
    /// directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, MailError> {
        let path = path.as_ref().to_path_buf();
        let shown = path.display().to_string();

        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, MailError> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MailError::storage(format!("mkdir {}: {e}", parent.display()))
                })?;
            }
            let conn = Connection::open(&path).map_err(sql_err)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")
                .map_err(sql_err)?;
            conn.execute_batch(CREATE_EMAILS).map_err(sql_err)?;
            Ok(conn)
        })
        .await
        .map_err(|e| MailError::internal(format!("spawn: {e}")))??;

        info!(path = %shown, "store opened");
        Ok(Self::from_conn(conn))
    }

    pub async fn open_in_memory() -> Result<Self, MailError> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection, MailError> {
            let conn = Connection::open_in_memory().map_err(sql_err)?;
            conn.execute_batch(CREATE_EMAILS).map_err(sql_err)?;
            Ok(conn)
        })
        .await
        .map_err(|e| MailError::internal(format!("spawn: {e}")))??;

        Ok(Self::from_conn(conn))
    }

    fn from_conn(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        }
    }

    async fn with_conn<F, R>(&self, f: F) -> Result<R, MailError>
    where
        F: FnOnce(&Connection) -> Result<R, MailError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| MailError::internal("store mutex poisoned"))?;
            let conn = guard
                .as_ref()
                .ok_or_else(|| MailError::storage("store is closed"))?;
            f(conn)
        })
        .await
        .map_err(|e| MailError::internal(format!("spawn: {e}")))?
    }
}

fn sql_err(e: rusqlite::Error) -> MailError {
    MailError::storage(format!("sqlite: {e}"))
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn upsert(&self, record: &EmailRecord) -> Result<(), MailError> {
        let record = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO emails (id, subject, sender, snippet, date)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.subject,
                    record.sender,
                    record.snippet,
                    record.date
                ],
            )
            .map_err(sql_err)?;
            debug!(record_id = %record.id, "record upserted");
            Ok(())
        })
        .await
    }

    async fn fetch_all(&self) -> Result<Vec<EmailRecord>, MailError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, subject, sender, snippet, date FROM emails ORDER BY rowid")
                .map_err(sql_err)?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(EmailRecord {
                        id: row.get(0)?,
                        subject: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        sender: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        snippet: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                        date: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    })
                })
                .map_err(sql_err)?;

            let records = rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)?;
            Ok(records)
        })
        .await
    }

    async fn close(&self) -> Result<(), MailError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let taken = conn
                .lock()
                .map_err(|_| MailError::internal("store mutex poisoned"))?
                .take();
            match taken {
                Some(c) => c.close().map_err(|(_, e)| sql_err(e)),
                None => Ok(()),
            }
        })
        .await
        .map_err(|e| MailError::internal(format!("spawn: {e}")))??;

        info!("store closed");
        Ok(())
    }
}
