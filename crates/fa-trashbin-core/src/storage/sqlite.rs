use rusqlite::{params, Connection, OptionalExtension, Result};
use tracing::debug;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        Self::prepare(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self> {
        let db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<()> {
        // the host writes these tables too
        let mode: String = self
            .conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        self.conn.pragma_update(None, "busy_timeout", 5000)?;
        self.conn.pragma_update(None, "foreign_keys", true)?;
        debug!("SQLite configured for shared access (journal mode {})", mode);
        Ok(())
    }

    /// Check schema version and create the tables if needed. The tables mirror
    /// the host's own rows, so nothing is ever dropped here.
    fn migrate_schema(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version < 1 {
            debug!("Schema version {} < 1, creating tables", version);
        }

        self.conn.execute_batch(include_str!("schema.sql"))?;
        debug!("SQLite schema initialized (version 1)");
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn truncate_all(&self) -> Result<()> {
        self.conn.execute_batch(
            "DELETE FROM share;
             DELETE FROM files_trash;
             DELETE FROM filecache;
             DELETE FROM storages;",
        )?;
        debug!("All tables truncated");
        Ok(())
    }

    // ── Storages ─────────────────────────────────────────────────

    /// Numeric id of the storage with the given `<backend>::<uid>` id,
    /// registering the storage if it is not known yet.
    pub fn ensure_storage(&self, storage_id: &str) -> Result<i64> {
        if let Some(numeric_id) = self.storage_numeric_id(storage_id)? {
            return Ok(numeric_id);
        }
        self.conn.execute(
            "INSERT INTO storages (id) VALUES (?1)",
            params![storage_id],
        )?;
        let numeric_id = self.conn.last_insert_rowid();
        debug!("Registered storage {} as {}", storage_id, numeric_id);
        Ok(numeric_id)
    }

    pub fn storage_numeric_id(&self, storage_id: &str) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT numeric_id FROM storages WHERE id = ?1",
                params![storage_id],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn storage_string_id(&self, numeric_id: i64) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT id FROM storages WHERE numeric_id = ?1",
                params![numeric_id],
                |row| row.get(0),
            )
            .optional()
    }
}
