use super::models::TrashRecord;
use super::sqlite::Database;
use rusqlite::{params, ErrorCode, OptionalExtension, Result, Row};
use tracing::{debug, error};

fn row_to_record(row: &Row) -> Result<TrashRecord> {
    Ok(TrashRecord {
        id: row.get(0)?,
        user: row.get(1)?,
        timestamp: row.get(2)?,
        location: row.get(3)?,
        deleted_by: row.get(4)?,
    })
}

impl Database {
    // ── Trash records ────────────────────────────────────────────

    /// The record matching all four fields, if any.
    pub fn trash_record(
        &self,
        id: &str,
        user: &str,
        timestamp: i64,
        deleted_by: &str,
    ) -> Result<Option<TrashRecord>> {
        self.connection()
            .query_row(
                "SELECT id, user, timestamp, location, deleted_by FROM files_trash \
                 WHERE id = ?1 AND user = ?2 AND timestamp = ?3 AND deleted_by = ?4",
                params![id, user, timestamp, deleted_by],
                row_to_record,
            )
            .optional()
    }

    /// Every account's record for one trashed node.
    pub fn trash_siblings(&self, id: &str, timestamp: i64) -> Result<Vec<TrashRecord>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, user, timestamp, location, deleted_by FROM files_trash \
             WHERE id = ?1 AND timestamp = ?2 \
             ORDER BY auto_id",
        )?;
        let records = stmt
            .query_map(params![id, timestamp], row_to_record)?
            .collect::<Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn trash_records_for_user(&self, user: &str) -> Result<Vec<TrashRecord>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, user, timestamp, location, deleted_by FROM files_trash \
             WHERE user = ?1 \
             ORDER BY timestamp DESC, id",
        )?;
        let records = stmt
            .query_map(params![user], row_to_record)?
            .collect::<Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Returns `false` (and logs) when `(id, user, timestamp)` is already taken.
    pub fn insert_trash_record(
        &self,
        id: &str,
        user: &str,
        timestamp: i64,
        location: &str,
        deleted_by: &str,
    ) -> Result<bool> {
        let result = self.connection().execute(
            "INSERT INTO files_trash (id, user, timestamp, location, deleted_by) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, user, timestamp, location, deleted_by],
        );
        match result {
            Ok(rows) => Ok(rows > 0),
            Err(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                error!(
                    "Unable to insert trashbin item '{}' for '{}' at {}: already present",
                    id, user, timestamp
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete `user`'s records for the trashed node. Returns the number removed.
    pub fn delete_trash_records(&self, id: &str, timestamp: i64, user: &str) -> Result<usize> {
        let removed = self.connection().execute(
            "DELETE FROM files_trash WHERE id = ?1 AND user = ?2 AND timestamp = ?3",
            params![id, user, timestamp],
        )?;
        if removed == 0 {
            debug!("No trashbin items for '{}' at {} owned by '{}'", id, timestamp, user);
        }
        Ok(removed)
    }
}
