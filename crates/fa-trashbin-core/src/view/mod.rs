//! The storage view the reconcilers work through.
//!
//! Paths are view-absolute: `<uid>/<internal path>`, where the internal path
//! is relative to the account's storage root (e.g.
//! `alice/files_trashbin/files/report.pdf.d1700000000`).

mod local;
mod users;

pub use local::LocalView;
pub use users::{ConfiguredUsers, Quota, UserDirectory};

use crate::Error;

/// A view path resolved to the storage that physically holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub uid: String,
    pub storage: i64,
    pub internal_path: String,
}

pub trait StorageView {
    fn exists(&self, path: &str) -> bool;
    fn is_dir(&self, path: &str) -> bool;
    /// Fails when something already exists at `path`.
    fn mkdir(&self, path: &str) -> Result<(), Error>;
    /// Copy one file. May refuse writes the target account is not allowed.
    fn copy(&self, source: &str, target: &str) -> Result<(), Error>;
    /// Move a node, replacing a file at `target`.
    fn rename(&self, source: &str, target: &str) -> Result<(), Error>;
    /// Remove a file or a whole directory tree.
    fn unlink(&self, path: &str) -> Result<(), Error>;
    fn file_size(&self, path: &str) -> Result<u64, Error>;
    fn mtime(&self, path: &str) -> Result<i64, Error>;
    /// Set the modification time, creating an empty file if nothing exists.
    fn touch(&self, path: &str, mtime: Option<i64>) -> Result<(), Error>;
    /// Names of the direct children of a directory.
    fn list_dir(&self, path: &str) -> Result<Vec<String>, Error>;
    fn resolve(&self, path: &str) -> Result<Resolved, Error>;
    /// Bring the file index for a path in line with what is on disk.
    fn refresh_index(&self, resolved: &Resolved) -> Result<(), Error>;
}

/// `<uid>/<relative>`.
pub fn account_path(uid: &str, relative: &str) -> String {
    if relative.is_empty() {
        uid.to_string()
    } else {
        format!("{}/{}", uid, relative.trim_start_matches('/'))
    }
}

pub fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), child)
    }
}

/// Split a view path into the account uid and the internal path.
pub fn split_account(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_start_matches('/');
    let (uid, rest) = match trimmed.split_once('/') {
        Some((uid, rest)) => (uid, rest.trim_end_matches('/')),
        None => (trimmed, ""),
    };
    if uid.is_empty() {
        None
    } else {
        Some((uid, rest))
    }
}
