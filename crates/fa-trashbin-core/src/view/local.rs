use super::{split_account, Resolved, StorageView, UserDirectory};
use crate::account;
use crate::storage::models::{path_hash, FileIndexEntry, DIRECTORY_MIMETYPE};
use crate::storage::{Database, FILES_ROOT};
use crate::Error;
use filetime::FileTime;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

const PERMISSIONS_DIR: i64 = 31;
const PERMISSIONS_FILE: i64 = 27;

/// A [`StorageView`] over account home directories on the local disk.
///
/// Every write goes through the file index as well, the way the host's
/// filesystem hooks keep it current.
pub struct LocalView<'a> {
    db: &'a Database,
    users: &'a dyn UserDirectory,
    backend: String,
}

fn storage_err(operation: &str, path: &str, err: impl Display) -> Error {
    Error::Storage(format!("{} '{}': {}", operation, path, err))
}

fn internal_path(home: &Path, physical: &Path) -> String {
    physical
        .strip_prefix(home)
        .map(|relative| {
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

fn tree_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

fn etag(internal: &str, mtime: i64, size: u64) -> String {
    let digest = Sha256::digest(format!("{}:{}:{}", internal, mtime, size).as_bytes());
    hex::encode(&digest[..8])
}

impl<'a> LocalView<'a> {
    pub fn new(db: &'a Database, users: &'a dyn UserDirectory, backend: &str) -> Self {
        Self {
            db,
            users,
            backend: backend.to_string(),
        }
    }

    pub fn physical_path(&self, path: &str) -> Result<PathBuf, Error> {
        let (uid, internal) = split_account(path)
            .ok_or_else(|| Error::NotFound(format!("no account in path '{}'", path)))?;
        let home = self.users.home(uid);
        Ok(if internal.is_empty() {
            home
        } else {
            home.join(internal)
        })
    }

    fn used_bytes(&self, uid: &str) -> u64 {
        tree_size(&self.users.home(uid).join(FILES_ROOT))
    }

    fn index(&self, path: &str) -> Result<(), Error> {
        let resolved = self.resolve(path)?;
        self.refresh_index(&resolved)
    }

    fn index_node(
        &self,
        storage: i64,
        internal: &str,
        physical: &Path,
        parent: i64,
    ) -> Result<i64, Error> {
        let metadata = fs::metadata(physical)?;
        let mtime = FileTime::from_last_modification_time(&metadata).unix_seconds();
        let is_dir = metadata.is_dir();
        let (mimetype, mimepart, size) = if is_dir {
            (DIRECTORY_MIMETYPE.to_string(), "httpd".to_string(), tree_size(physical))
        } else {
            let mime = mime_guess::from_path(physical).first_or_octet_stream();
            (
                mime.essence_str().to_string(),
                mime.type_().as_str().to_string(),
                metadata.len(),
            )
        };
        let entry = FileIndexEntry {
            file_id: 0,
            storage,
            path: internal.to_string(),
            path_hash: path_hash(internal),
            parent,
            name: internal.rsplit('/').next().unwrap_or(internal).to_string(),
            mimetype,
            mimepart,
            size: size as i64,
            mtime,
            storage_mtime: mtime,
            encrypted: false,
            unencrypted_size: 0,
            etag: etag(internal, mtime, size),
            permissions: if is_dir { PERMISSIONS_DIR } else { PERMISSIONS_FILE },
            checksum: String::new(),
            storage_id: None,
        };
        trace!("Indexing {}:{}", storage, internal);
        Ok(self.db.upsert_file(&entry)?)
    }

    /// Index the directories above `internal` that have no row yet, from
    /// the storage root down, and return the file id of its direct parent.
    fn ensure_ancestors(&self, storage: i64, internal: &str, home: &Path) -> Result<i64, Error> {
        if internal.is_empty() {
            return Ok(-1);
        }
        let mut parent = self.ancestor_id(storage, "", home, -1)?;
        let segments: Vec<&str> = internal.split('/').collect();
        let mut prefix = String::new();
        for segment in &segments[..segments.len() - 1] {
            prefix = super::join(&prefix, segment);
            parent = self.ancestor_id(storage, &prefix, &home.join(&prefix), parent)?;
        }
        Ok(parent)
    }

    fn ancestor_id(
        &self,
        storage: i64,
        internal: &str,
        physical: &Path,
        parent: i64,
    ) -> Result<i64, Error> {
        match self.db.file_by_path(storage, internal)? {
            Some(existing) => Ok(existing.file_id),
            None => self.index_node(storage, internal, physical, parent),
        }
    }
}

impl StorageView for LocalView<'_> {
    fn exists(&self, path: &str) -> bool {
        self.physical_path(path)
            .map(|physical| physical.exists())
            .unwrap_or(false)
    }

    fn is_dir(&self, path: &str) -> bool {
        self.physical_path(path)
            .map(|physical| physical.is_dir())
            .unwrap_or(false)
    }

    fn mkdir(&self, path: &str) -> Result<(), Error> {
        let physical = self.physical_path(path)?;
        if physical.exists() {
            return Err(storage_err("mkdir", path, "already exists"));
        }
        if let Some(parent) = physical.parent() {
            let resolved = self.resolve(path)?;
            if !resolved.internal_path.contains('/') {
                fs::create_dir_all(parent).map_err(|e| storage_err("mkdir", path, e))?;
            }
        }
        fs::create_dir(&physical).map_err(|e| storage_err("mkdir", path, e))?;
        debug!("Created directory {}", path);
        self.index(path)
    }

    fn copy(&self, source: &str, target: &str) -> Result<(), Error> {
        let source_physical = self.physical_path(source)?;
        let target_physical = self.physical_path(target)?;
        let metadata = fs::metadata(&source_physical).map_err(|e| storage_err("copy", source, e))?;
        if metadata.is_dir() {
            return Err(storage_err("copy", source, "is a directory"));
        }

        let target_uid = self.resolve(target)?.uid;
        let quota = self.users.quota(&target_uid);
        if !quota.allows(self.used_bytes(&target_uid), metadata.len()) {
            return Err(storage_err(
                "copy",
                target,
                format!("quota of '{}' does not allow {} more bytes", target_uid, metadata.len()),
            ));
        }

        fs::copy(&source_physical, &target_physical).map_err(|e| storage_err("copy", target, e))?;
        filetime::set_file_mtime(
            &target_physical,
            FileTime::from_last_modification_time(&metadata),
        )?;
        debug!("Copied {} -> {}", source, target);
        self.index(target)
    }

    fn rename(&self, source: &str, target: &str) -> Result<(), Error> {
        let source_physical = self.physical_path(source)?;
        let target_physical = self.physical_path(target)?;
        if !source_physical.exists() {
            return Err(Error::NotFound(source.to_string()));
        }
        if target_physical.is_dir() {
            return Err(storage_err("rename", target, "target is a directory"));
        }
        if target_physical.is_file() {
            fs::remove_file(&target_physical).map_err(|e| storage_err("rename", target, e))?;
        }
        if let Err(err) = fs::rename(&source_physical, &target_physical) {
            // different filesystems: fall back to copy + remove for plain files
            if !source_physical.is_file() {
                return Err(storage_err("rename", source, err));
            }
            fs::copy(&source_physical, &target_physical)
                .map_err(|e| storage_err("rename", target, e))?;
            fs::remove_file(&source_physical).map_err(|e| storage_err("rename", source, e))?;
        }

        let from = self.resolve(source)?;
        let to = self.resolve(target)?;
        let home = self.users.home(&to.uid);
        let parent = self.ensure_ancestors(to.storage, &to.internal_path, &home)?;
        self.db.rename_files(
            from.storage,
            &from.internal_path,
            to.storage,
            &to.internal_path,
            parent,
        )?;
        debug!("Moved {} -> {}", source, target);
        self.refresh_index(&to)
    }

    fn unlink(&self, path: &str) -> Result<(), Error> {
        let physical = self.physical_path(path)?;
        if physical.is_dir() {
            fs::remove_dir_all(&physical).map_err(|e| storage_err("unlink", path, e))?;
        } else if physical.exists() {
            fs::remove_file(&physical).map_err(|e| storage_err("unlink", path, e))?;
        } else {
            return Err(Error::NotFound(path.to_string()));
        }
        let resolved = self.resolve(path)?;
        self.db
            .delete_files_under(resolved.storage, &resolved.internal_path)?;
        debug!("Unlinked {}", path);
        Ok(())
    }

    fn file_size(&self, path: &str) -> Result<u64, Error> {
        let physical = self.physical_path(path)?;
        let metadata = fs::metadata(&physical).map_err(|e| storage_err("stat", path, e))?;
        Ok(if metadata.is_dir() {
            tree_size(&physical)
        } else {
            metadata.len()
        })
    }

    fn mtime(&self, path: &str) -> Result<i64, Error> {
        let metadata =
            fs::metadata(self.physical_path(path)?).map_err(|e| storage_err("stat", path, e))?;
        Ok(FileTime::from_last_modification_time(&metadata).unix_seconds())
    }

    fn touch(&self, path: &str, mtime: Option<i64>) -> Result<(), Error> {
        let physical = self.physical_path(path)?;
        if !physical.exists() {
            fs::File::create(&physical).map_err(|e| storage_err("touch", path, e))?;
        }
        if let Some(mtime) = mtime {
            filetime::set_file_mtime(&physical, FileTime::from_unix_time(mtime, 0))
                .map_err(|e| storage_err("touch", path, e))?;
        }
        self.index(path)
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>, Error> {
        let physical = self.physical_path(path)?;
        let mut names = fs::read_dir(&physical)
            .map_err(|e| storage_err("list", path, e))?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<Result<Vec<_>, _>>()?;
        names.sort();
        Ok(names)
    }

    fn resolve(&self, path: &str) -> Result<Resolved, Error> {
        let (uid, internal) = split_account(path)
            .ok_or_else(|| Error::NotFound(format!("no account in path '{}'", path)))?;
        let storage = self
            .db
            .ensure_storage(&account::storage_id(&self.backend, uid))?;
        Ok(Resolved {
            uid: uid.to_string(),
            storage,
            internal_path: internal.to_string(),
        })
    }

    fn refresh_index(&self, resolved: &Resolved) -> Result<(), Error> {
        let home = self.users.home(&resolved.uid);
        let internal = resolved.internal_path.as_str();
        let physical = if internal.is_empty() {
            home.clone()
        } else {
            home.join(internal)
        };

        if !physical.exists() {
            self.db.delete_files_under(resolved.storage, internal)?;
            return Ok(());
        }

        let parent = self.ensure_ancestors(resolved.storage, internal, &home)?;
        let file_id = self.index_node(resolved.storage, internal, &physical, parent)?;
        if !physical.is_dir() {
            return Ok(());
        }

        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(internal.to_string());
        let mut dir_ids: HashMap<PathBuf, i64> = HashMap::new();
        dir_ids.insert(physical.clone(), file_id);

        for entry in WalkDir::new(&physical).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| storage_err("scan", internal, e))?;
            let child_internal = internal_path(&home, entry.path());
            let parent_id = entry
                .path()
                .parent()
                .and_then(|p| dir_ids.get(p))
                .copied()
                .unwrap_or(file_id);
            let child_id =
                self.index_node(resolved.storage, &child_internal, entry.path(), parent_id)?;
            if entry.file_type().is_dir() {
                dir_ids.insert(entry.path().to_path_buf(), child_id);
            }
            seen.insert(child_internal);
        }

        for stale in self
            .db
            .file_paths_under(resolved.storage, internal)?
            .into_iter()
            .filter(|path| !seen.contains(path))
        {
            self.db.delete_files_under(resolved.storage, &stale)?;
        }
        Ok(())
    }
}
