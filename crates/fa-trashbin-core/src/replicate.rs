//! Byte-level transfer of trashed nodes between accounts.
//!
//! Both operations walk the tree depth-first from an explicit worklist. The
//! first step that cannot be completed aborts the whole operation; whatever
//! was already transferred stays where it is.

use crate::storage::trash_path;
use crate::view::{account_path, join, StorageView, UserDirectory};
use crate::Error;
use filetime::FileTime;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, warn};

pub struct NodeReplicator<'a> {
    view: &'a dyn StorageView,
    users: &'a dyn UserDirectory,
}

struct CopyStep {
    source: String,
    target: String,
    full_source: PathBuf,
    full_target: PathBuf,
}

impl CopyStep {
    fn child(&self, name: &str) -> CopyStep {
        CopyStep {
            source: join(&self.source, name),
            target: join(&self.target, name),
            full_source: self.full_source.join(name),
            full_target: self.full_target.join(name),
        }
    }
}

impl<'a> NodeReplicator<'a> {
    pub fn new(view: &'a dyn StorageView, users: &'a dyn UserDirectory) -> Self {
        Self { view, users }
    }

    /// Copy `node_name` from one account's trash tree into another's.
    /// Returns the number of bytes written.
    ///
    /// Files go through the view first. When the view refuses the write
    /// (typically the target's quota) the bytes are copied between the two
    /// home directories directly and the target's index is refreshed by hand.
    pub fn copy(&self, from_uid: &str, to_uid: &str, node_name: &str) -> Result<u64, Error> {
        let relative = trash_path(node_name);
        let source = account_path(from_uid, &relative);
        if !self.view.exists(&source) {
            return Err(Error::NotFound(format!(
                "node '{}' does not exist for '{}'",
                source, from_uid
            )));
        }

        let mut work = vec![CopyStep {
            source,
            target: account_path(to_uid, &relative),
            full_source: self.users.home(from_uid).join(&relative),
            full_target: self.users.home(to_uid).join(&relative),
        }];
        let mut stamps: Vec<(String, i64)> = Vec::new();
        let mut bytes = 0u64;

        while let Some(step) = work.pop() {
            if self.view.is_dir(&step.source) {
                if !self.view.is_dir(&step.target) {
                    self.view.mkdir(&step.target).map_err(|e| {
                        error!("Unable to mkdir '{}': {}", step.target, e);
                        e
                    })?;
                }
                stamps.push((step.target.clone(), self.view.mtime(&step.source)?));
                for name in self.view.list_dir(&step.source)?.iter().rev() {
                    work.push(step.child(name));
                }
            } else {
                bytes += self.copy_file(&step)?;
            }
        }
        self.stamp_directories(&stamps)?;

        debug!(
            "Copied '{}' from {} to {} ({} bytes)",
            node_name, from_uid, to_uid, bytes
        );
        Ok(bytes)
    }

    fn copy_file(&self, step: &CopyStep) -> Result<u64, Error> {
        match self.view.copy(&step.source, &step.target) {
            Ok(()) => self.view.file_size(&step.target),
            Err(err) => {
                warn!(
                    "View copy of '{}' refused ({}), copying raw bytes",
                    step.source, err
                );
                let bytes = fs::copy(&step.full_source, &step.full_target).map_err(|e| {
                    error!(
                        "Unable to copy '{}' to '{}': {}",
                        step.full_source.display(),
                        step.full_target.display(),
                        e
                    );
                    Error::Storage(format!("raw copy of '{}': {}", step.source, e))
                })?;
                let metadata = fs::metadata(&step.full_source)?;
                filetime::set_file_mtime(
                    &step.full_target,
                    FileTime::from_last_modification_time(&metadata),
                )?;
                let resolved = self.view.resolve(&step.target)?;
                self.view.refresh_index(&resolved)?;
                Ok(bytes)
            }
        }
    }

    /// Give copied directories their source's modification time. Runs once
    /// every child is in place, deepest directory first, since writing a
    /// child bumps its parent's mtime.
    fn stamp_directories(&self, stamps: &[(String, i64)]) -> Result<(), Error> {
        for (dir, mtime) in stamps.iter().rev() {
            self.view.touch(dir, Some(*mtime))?;
        }
        Ok(())
    }

    /// Move the node at `source` onto `target`, replacing what is there.
    /// Directories are merged: missing ones are created, files overwrite
    /// their counterparts, and a file standing where a directory belongs
    /// (or the reverse) is removed first. Emptied source directories are
    /// removed afterwards. Returns the number of bytes moved.
    pub fn move_tree(&self, source: &str, target: &str) -> Result<u64, Error> {
        if !self.view.exists(source) {
            return Err(Error::NotFound(source.to_string()));
        }

        let mut work = vec![(source.to_string(), target.to_string())];
        let mut emptied: Vec<String> = Vec::new();
        let mut stamps: Vec<(String, i64)> = Vec::new();
        let mut bytes = 0u64;

        while let Some((from, to)) = work.pop() {
            if self.view.is_dir(&from) {
                if self.view.exists(&to) && !self.view.is_dir(&to) {
                    self.view.unlink(&to)?;
                }
                if !self.view.exists(&to) {
                    self.view.mkdir(&to).map_err(|e| {
                        error!("Unable to mkdir '{}': {}", to, e);
                        e
                    })?;
                }
                stamps.push((to.clone(), self.view.mtime(&from)?));
                for name in self.view.list_dir(&from)?.iter().rev() {
                    work.push((join(&from, name), join(&to, name)));
                }
                emptied.push(from);
            } else {
                if self.view.is_dir(&to) {
                    self.view.unlink(&to)?;
                }
                let size = self.view.file_size(&from)?;
                self.view.rename(&from, &to).map_err(|e| {
                    error!("Unable to move '{}' to '{}': {}", from, to, e);
                    e
                })?;
                bytes += size;
            }
        }

        // deepest first, so parents are empty by the time they are removed
        for dir in emptied.iter().rev() {
            if self.view.exists(dir) {
                self.view.unlink(dir)?;
            }
        }

        self.stamp_directories(&stamps)?;

        debug!("Moved '{}' to '{}' ({} bytes)", source, target, bytes);
        Ok(bytes)
    }
}
