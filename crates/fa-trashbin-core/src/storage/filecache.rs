use super::models::{path_hash, FileIndexEntry};
use super::sqlite::Database;
use super::TRASH_ROOT;
use rusqlite::{params, ErrorCode, OptionalExtension, Result, Row};
use tracing::{debug, error};

const FILE_COLUMNS: &str = "fc.fileid, fc.storage, fc.path, fc.path_hash, fc.parent, fc.name, \
     fc.mimetype, fc.mimepart, fc.size, fc.mtime, fc.storage_mtime, fc.encrypted, \
     fc.unencrypted_size, fc.etag, fc.permissions, fc.checksum, s.id";

/// Matches `?2` itself and everything below it.
const SUBTREE_FILTER: &str =
    "storage = ?1 AND (path = ?2 OR substr(path, 1, length(?2) + 1) = ?2 || '/')";

fn row_to_entry(row: &Row) -> Result<FileIndexEntry> {
    Ok(FileIndexEntry {
        file_id: row.get(0)?,
        storage: row.get(1)?,
        path: row.get(2)?,
        path_hash: row.get(3)?,
        parent: row.get(4)?,
        name: row.get(5)?,
        mimetype: row.get(6)?,
        mimepart: row.get(7)?,
        size: row.get(8)?,
        mtime: row.get(9)?,
        storage_mtime: row.get(10)?,
        encrypted: row.get(11)?,
        unencrypted_size: row.get(12)?,
        etag: row.get(13)?,
        permissions: row.get(14)?,
        checksum: row.get(15)?,
        storage_id: row.get(16)?,
    })
}

impl Database {
    // ── File index: lookups ──────────────────────────────────────

    pub fn file_by_id(&self, file_id: i64) -> Result<Option<FileIndexEntry>> {
        self.connection()
            .query_row(
                &format!(
                    "SELECT {} FROM filecache fc \
                     LEFT JOIN storages s ON s.numeric_id = fc.storage \
                     WHERE fc.fileid = ?1",
                    FILE_COLUMNS
                ),
                params![file_id],
                row_to_entry,
            )
            .optional()
    }

    pub fn file_by_path(&self, storage: i64, path: &str) -> Result<Option<FileIndexEntry>> {
        self.connection()
            .query_row(
                &format!(
                    "SELECT {} FROM filecache fc \
                     LEFT JOIN storages s ON s.numeric_id = fc.storage \
                     WHERE fc.storage = ?1 AND fc.path = ?2",
                    FILE_COLUMNS
                ),
                params![storage, path],
                row_to_entry,
            )
            .optional()
    }

    /// Every storage's row at `path` named `name`.
    pub fn files_by_path_and_name(&self, path: &str, name: &str) -> Result<Vec<FileIndexEntry>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM filecache fc \
             LEFT JOIN storages s ON s.numeric_id = fc.storage \
             WHERE fc.path = ?1 AND fc.name = ?2 \
             ORDER BY fc.fileid",
            FILE_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![path, name], row_to_entry)?
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// The row that shares its path hash with the given functional-account
    /// row: the trashed copy of the end user who deleted the node.
    ///
    /// More than two rows sharing the hash means the index no longer
    /// describes a single user-triggered delete and is reported as an
    /// integrity violation.
    pub fn sibling_of_functional_item(
        &self,
        functional_file_id: i64,
    ) -> std::result::Result<Option<FileIndexEntry>, crate::Error> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT DISTINCT {} FROM filecache fc \
             INNER JOIN filecache fc2 ON fc2.path_hash = fc.path_hash \
             LEFT JOIN storages s ON s.numeric_id = fc.storage \
             WHERE fc2.fileid = ?1 \
             ORDER BY fc.fileid",
            FILE_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![functional_file_id], row_to_entry)?
            .collect::<Result<Vec<_>>>()?;

        if entries.len() > 2 {
            return Err(crate::Error::Integrity(format!(
                "expected no more than 2 filecache items sharing the path of file {}, found {}",
                functional_file_id,
                entries.len()
            )));
        }
        if entries.len() < 2 {
            return Ok(None);
        }
        Ok(entries
            .into_iter()
            .find(|entry| entry.file_id != functional_file_id))
    }

    pub fn trash_root_entry(&self, storage: i64) -> Result<Option<FileIndexEntry>> {
        self.file_by_path(storage, TRASH_ROOT)
    }

    pub fn count_files_under(&self, storage: i64, path: &str) -> Result<i64> {
        self.connection().query_row(
            &format!("SELECT COUNT(*) FROM filecache WHERE {}", SUBTREE_FILTER),
            params![storage, path],
            |row| row.get(0),
        )
    }

    pub fn file_paths_under(&self, storage: i64, path: &str) -> Result<Vec<String>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT path FROM filecache WHERE {} ORDER BY path",
            SUBTREE_FILTER
        ))?;
        let paths = stmt
            .query_map(params![storage, path], |row| row.get(0))?
            .collect::<Result<Vec<_>>>()?;
        Ok(paths)
    }

    // ── File index: mutations ────────────────────────────────────

    /// Insert a new row. Returns `false` (and logs) when the row could not be
    /// written because one already occupies `(storage, path)`.
    pub fn insert_file(&self, entry: &FileIndexEntry) -> Result<bool> {
        let result = self.connection().execute(
            "INSERT INTO filecache \
             (storage, path, path_hash, parent, name, mimetype, mimepart, size, mtime, \
              storage_mtime, encrypted, unencrypted_size, etag, permissions, checksum) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                entry.storage,
                entry.path,
                entry.path_hash,
                entry.parent,
                entry.name,
                entry.mimetype,
                entry.mimepart,
                entry.size,
                entry.mtime,
                entry.storage_mtime,
                entry.encrypted,
                entry.unencrypted_size,
                entry.etag,
                entry.permissions,
                entry.checksum,
            ],
        );
        match result {
            Ok(rows) if rows > 0 => Ok(true),
            Ok(_) => {
                error!("Unable to insert filecache item '{}'", entry.path);
                Ok(false)
            }
            Err(rusqlite::Error::SqliteFailure(failure, message))
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                error!(
                    "Unable to insert filecache item '{}' in storage {}: {}",
                    entry.path,
                    entry.storage,
                    message.unwrap_or_default()
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Insert or refresh the row at `(storage, path)`, keeping its file id.
    pub fn upsert_file(&self, entry: &FileIndexEntry) -> Result<i64> {
        self.connection().execute(
            "INSERT INTO filecache \
             (storage, path, path_hash, parent, name, mimetype, mimepart, size, mtime, \
              storage_mtime, encrypted, unencrypted_size, etag, permissions, checksum) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15) \
             ON CONFLICT(storage, path) DO UPDATE SET \
                 path_hash = excluded.path_hash, \
                 parent = excluded.parent, \
                 name = excluded.name, \
                 mimetype = excluded.mimetype, \
                 mimepart = excluded.mimepart, \
                 size = excluded.size, \
                 mtime = excluded.mtime, \
                 storage_mtime = excluded.storage_mtime, \
                 unencrypted_size = excluded.unencrypted_size, \
                 etag = excluded.etag, \
                 permissions = excluded.permissions",
            params![
                entry.storage,
                entry.path,
                entry.path_hash,
                entry.parent,
                entry.name,
                entry.mimetype,
                entry.mimepart,
                entry.size,
                entry.mtime,
                entry.storage_mtime,
                entry.encrypted,
                entry.unencrypted_size,
                entry.etag,
                entry.permissions,
                entry.checksum,
            ],
        )?;
        self.connection().query_row(
            "SELECT fileid FROM filecache WHERE storage = ?1 AND path = ?2",
            params![entry.storage, entry.path],
            |row| row.get(0),
        )
    }

    /// Remove the row at `path` and every row below it.
    pub fn delete_files_under(&self, storage: i64, path: &str) -> Result<usize> {
        let removed = self.connection().execute(
            &format!("DELETE FROM filecache WHERE {}", SUBTREE_FILTER),
            params![storage, path],
        )?;
        debug!("Removed {} filecache rows under {}:{}", removed, storage, path);
        Ok(removed)
    }

    /// Re-home the subtree at `from_path` to `to_path`, possibly in another
    /// storage. File ids are kept; whatever was indexed at the target is
    /// replaced.
    pub fn rename_files(
        &self,
        from_storage: i64,
        from_path: &str,
        to_storage: i64,
        to_path: &str,
        to_parent: i64,
    ) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        tx.execute(
            &format!("DELETE FROM filecache WHERE {}", SUBTREE_FILTER),
            params![to_storage, to_path],
        )?;

        let rows: Vec<(i64, String)> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT fileid, path FROM filecache WHERE {}",
                SUBTREE_FILTER
            ))?;
            let rows = stmt
                .query_map(params![from_storage, from_path], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<Result<Vec<_>>>()?;
            rows
        };

        for (file_id, path) in &rows {
            let new_path = format!("{}{}", to_path, &path[from_path.len()..]);
            tx.execute(
                "UPDATE filecache SET storage = ?1, path = ?2, path_hash = ?3 WHERE fileid = ?4",
                params![to_storage, new_path, path_hash(&new_path), file_id],
            )?;
        }

        let name = to_path.rsplit('/').next().unwrap_or(to_path);
        tx.execute(
            "UPDATE filecache SET parent = ?1, name = ?2 WHERE storage = ?3 AND path = ?4",
            params![to_parent, name, to_storage, to_path],
        )?;
        tx.commit()?;

        debug!(
            "Moved {} filecache rows {}:{} -> {}:{}",
            rows.len(),
            from_storage,
            from_path,
            to_storage,
            to_path
        );
        Ok(rows.len())
    }
}
