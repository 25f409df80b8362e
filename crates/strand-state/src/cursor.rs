use rusqlite::OptionalExtension;

use strand_core::AccountId;

use crate::store::{db_err, StateStore};

impl StateStore {
    /// Last persisted position in a paginated stream.
    pub fn cursor_get(
        &self,
        account: &AccountId,
        stream: &str,
    ) -> strand_core::Result<Option<String>> {
        let db = self.db.lock();
        db.query_row(
            "SELECT cursor FROM cursors WHERE account = ?1 AND stream = ?2",
            rusqlite::params![account, stream],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)
    }

    pub fn cursor_put(
        &self,
        account: &AccountId,
        stream: &str,
        cursor: &str,
    ) -> strand_core::Result<()> {
        let now = self.now_rfc3339();
        let db = self.db.lock();
        db.execute(
            "INSERT INTO cursors (account, stream, cursor, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(account, stream) DO UPDATE SET
                cursor = excluded.cursor,
                updated_at = excluded.updated_at",
            rusqlite::params![account, stream, cursor, now],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Forget the stream position, restarting it from the top.
    pub fn cursor_clear(&self, account: &AccountId, stream: &str) -> strand_core::Result<()> {
        let db = self.db.lock();
        db.execute(
            "DELETE FROM cursors WHERE account = ?1 AND stream = ?2",
            rusqlite::params![account, stream],
        )
        .map_err(db_err)?;
        Ok(())
    }
}
