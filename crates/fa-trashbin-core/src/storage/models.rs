use crate::account::{self, AccountIdentity};
use crate::trash_name;
use chrono::{DateTime, TimeZone, Utc};
use sha2::{Digest, Sha256};

pub const DIRECTORY_MIMETYPE: &str = "httpd/unix-directory";

/// `share_type` of a share made directly to one user.
pub const SHARE_TYPE_USER: i64 = 0;

/// One row of the file index: a filesystem object inside one storage.
#[derive(Debug, Clone, PartialEq)]
pub struct FileIndexEntry {
    pub file_id: i64,
    pub storage: i64,
    pub path: String,
    pub path_hash: String,
    pub parent: i64,
    pub name: String,
    pub mimetype: String,
    pub mimepart: String,
    pub size: i64,
    pub mtime: i64,
    pub storage_mtime: i64,
    pub encrypted: bool,
    pub unencrypted_size: i64,
    pub etag: String,
    pub permissions: i64,
    pub checksum: String,
    /// `<backend>::<uid>` of the owning storage. Only queries that join
    /// `storages` fill this in.
    pub storage_id: Option<String>,
}

impl FileIndexEntry {
    pub fn account(&self) -> Option<AccountIdentity> {
        self.storage_id.as_deref().and_then(account::resolve)
    }

    pub fn is_dir(&self) -> bool {
        self.mimetype == DIRECTORY_MIMETYPE
    }
}

/// Rows for the same relative path share this value across storages.
pub fn path_hash(path: &str) -> String {
    hex::encode(Sha256::digest(path.as_bytes()))
}

/// One account's trash entry for a deleted node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrashRecord {
    /// Base name of the node before deletion, without the timestamp suffix.
    pub id: String,
    pub user: String,
    pub timestamp: i64,
    pub location: String,
    pub deleted_by: String,
}

impl TrashRecord {
    pub fn trashed_name(&self) -> String {
        trash_name::format(&self.id, self.timestamp)
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    pub share_type: i64,
    pub share_with: String,
    pub uid_owner: String,
    pub uid_initiator: String,
    pub file_target: String,
}
