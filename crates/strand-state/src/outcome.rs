use tracing::warn;

use strand_core::{AccountId, CallRecorder, EndpointCallRecord, ItemKey, Outcome, TargetId};

use crate::store::{db_err, StateStore};

/// Content the engine answered. Rows feed the bounded duplicate check, so
/// one is written only once a delivery went through.
#[derive(Debug, Clone, Default)]
pub struct ContentRecord {
    pub owner: TargetId,
    pub item_id: Option<String>,
    pub canonical_url: Option<String>,
    pub signature: Option<String>,
    pub media_url: Option<String>,
    pub caption: Option<String>,
}

impl StateStore {
    /// Persist one extracted item.
    pub fn persist_content(&self, record: &ContentRecord) -> strand_core::Result<()> {
        let now = self.now_rfc3339();
        let db = self.db.lock();
        db.execute(
            "INSERT INTO content_records
                (owner, item_id, canonical_url, signature, media_url, caption, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                record.owner,
                record.item_id,
                record.canonical_url,
                record.signature,
                record.media_url,
                record.caption,
                now,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// True when the item already appears among the last `window` persisted
    /// content records, matched by item id, canonical URL, or signature.
    pub fn is_recent_duplicate(
        &self,
        item_id: Option<&str>,
        canonical_url: Option<&str>,
        signature: Option<&str>,
        window: u32,
    ) -> strand_core::Result<bool> {
        let db = self.db.lock();
        let count: i64 = db
            .query_row(
                "SELECT COUNT(*) FROM (
                    SELECT item_id, canonical_url, signature
                    FROM content_records ORDER BY id DESC LIMIT ?1
                 ) WHERE item_id = ?2 OR canonical_url = ?3 OR signature = ?4",
                rusqlite::params![window, item_id, canonical_url, signature],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    /// Append one per-item outcome to the trail.
    pub fn record_outcome(
        &self,
        account: &AccountId,
        workflow: &str,
        item_key: &ItemKey,
        outcome: &Outcome,
    ) -> strand_core::Result<()> {
        let (code, detail): (&str, Option<String>) = match outcome {
            Outcome::Done => ("done", None),
            Outcome::Skip(reason) => ("skip", Some(reason.as_str().to_string())),
            Outcome::Failed(why) => ("failed", Some(why.clone())),
        };
        let now = self.now_rfc3339();
        let db = self.db.lock();
        db.execute(
            "INSERT INTO outcome_log (account, workflow, item_key, outcome, detail, at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![account, workflow, item_key.as_string(), code, detail, now],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Outcome counts since a moment, newest workflows first in the log.
    pub fn outcome_counts_since(
        &self,
        since_rfc3339: &str,
    ) -> strand_core::Result<Vec<(String, i64)>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(
                "SELECT outcome, COUNT(*) FROM outcome_log
                 WHERE at >= ?1 GROUP BY outcome ORDER BY COUNT(*) DESC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(rusqlite::params![since_rfc3339], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Per-endpoint call counts since a moment.
    pub fn call_counts_since(
        &self,
        since_rfc3339: &str,
    ) -> strand_core::Result<Vec<(String, i64)>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(
                "SELECT endpoint, COUNT(*) FROM call_log
                 WHERE at >= ?1 GROUP BY endpoint ORDER BY COUNT(*) DESC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(rusqlite::params![since_rfc3339], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }
}

impl CallRecorder for StateStore {
    fn record_call(&self, record: EndpointCallRecord) {
        let db = self.db.lock();
        let result = db.execute(
            "INSERT INTO call_log (account, endpoint, method, status, at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                record.account_id,
                record.endpoint,
                record.method,
                record.status,
                record.at.to_rfc3339(),
            ],
        );
        if let Err(e) = result {
            warn!(error = %e, endpoint = %record.endpoint, "failed to record call");
        }
    }
}
