use super::models::{Share, SHARE_TYPE_USER};
use super::sqlite::Database;
use crate::account::FUNCTIONAL_ACCOUNT_PREFIX;
use rusqlite::{params, Result};

impl Database {
    // ── Shares ───────────────────────────────────────────────────

    pub fn insert_share(&self, share: &Share) -> Result<i64> {
        self.connection().execute(
            "INSERT INTO share (share_type, share_with, uid_owner, uid_initiator, file_target) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                share.share_type,
                share.share_with,
                share.uid_owner,
                share.uid_initiator,
                share.file_target,
            ],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    /// The project owner a functional account shares its folder with.
    ///
    /// Only direct user shares initiated by the functional account itself
    /// count. More than one such share is an integrity violation: every
    /// functional account has exactly one owner.
    pub fn project_owner(&self, functional_uid: &str) -> std::result::Result<Option<String>, crate::Error> {
        let mut stmt = self.connection().prepare(
            "SELECT share_with FROM share \
             WHERE share_type = ?1 AND uid_owner = ?2 AND uid_initiator = ?2",
        )?;
        let owners = stmt
            .query_map(params![SHARE_TYPE_USER, functional_uid], |row| {
                row.get::<_, Option<String>>(0)
            })?
            .collect::<Result<Vec<_>>>()?;

        if owners.len() > 1 {
            return Err(crate::Error::Integrity(format!(
                "expecting one owner for '{}', found {}",
                functional_uid,
                owners.len()
            )));
        }
        Ok(owners.into_iter().next().flatten())
    }

    /// Functional accounts whose folder is shared directly with `uid`.
    pub fn functional_accounts_owned_by(&self, uid: &str) -> Result<Vec<String>> {
        let mut stmt = self.connection().prepare(
            "SELECT DISTINCT uid_owner FROM share \
             WHERE share_type = ?1 AND share_with = ?2 \
               AND substr(uid_owner, 1, length(?3)) = ?3 \
               AND uid_initiator = uid_owner \
             ORDER BY uid_owner",
        )?;
        let accounts = stmt
            .query_map(params![SHARE_TYPE_USER, uid, FUNCTIONAL_ACCOUNT_PREFIX], |row| {
                row.get(0)
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(accounts)
    }
}
