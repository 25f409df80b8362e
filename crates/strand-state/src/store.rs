use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use strand_core::{Clock, StrandError};

pub(crate) fn db_err(e: rusqlite::Error) -> StrandError {
    StrandError::State(e.to_string())
}

/// Durable state behind every policy decision the engine makes.
pub struct StateStore {
    pub(crate) db: Arc<Mutex<Connection>>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl StateStore {
    /// Open or create the state database at the given path.
    pub fn open(path: &Path, clock: Arc<dyn Clock>) -> strand_core::Result<Self> {
        info!(?path, "opening state store");

        let conn = Connection::open(path).map_err(db_err)?;

        // WAL for concurrent readers alongside the writer.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS interaction_state (
                target TEXT NOT NULL,
                channel TEXT NOT NULL,
                state TEXT NOT NULL,
                reason TEXT,
                retry_after_at TEXT,
                observed_at TEXT NOT NULL,
                PRIMARY KEY (target, channel)
            );

            CREATE TABLE IF NOT EXISTS cursors (
                account TEXT NOT NULL,
                stream TEXT NOT NULL,
                cursor TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (account, stream)
            );

            CREATE TABLE IF NOT EXISTS call_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account TEXT NOT NULL,
                endpoint TEXT NOT NULL,
                method TEXT NOT NULL,
                status INTEGER NOT NULL,
                at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_call_log_at ON call_log(at);

            CREATE TABLE IF NOT EXISTS outcome_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account TEXT NOT NULL,
                workflow TEXT NOT NULL,
                item_key TEXT NOT NULL,
                outcome TEXT NOT NULL,
                detail TEXT,
                at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_outcome_item ON outcome_log(item_key);

            CREATE TABLE IF NOT EXISTS content_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                item_id TEXT,
                canonical_url TEXT,
                signature TEXT,
                media_url TEXT,
                caption TEXT,
                recorded_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_content_owner ON content_records(owner);
            ",
        )
        .map_err(db_err)?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            clock,
        })
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory(clock: Arc<dyn Clock>) -> strand_core::Result<Self> {
        Self::open(Path::new(":memory:"), clock)
    }

    pub(crate) fn now_rfc3339(&self) -> String {
        self.clock.now().to_rfc3339()
    }
}
