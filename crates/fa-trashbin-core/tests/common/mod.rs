#![allow(dead_code)]

//! A small stand-in for the host: account homes in a temp dir, an in-memory
//! index, and the host's own trash moves so the reconcilers can run on the
//! state they would see in production.

use fa_trashbin_core::account;
use fa_trashbin_core::config::{AppConfig, UserConfig};
use fa_trashbin_core::storage::models::{FileIndexEntry, Share, SHARE_TYPE_USER};
use fa_trashbin_core::storage::{trash_path, Database, TRASH_BASE, TRASH_ROOT};
use fa_trashbin_core::trash_name;
use fa_trashbin_core::view::{account_path, ConfiguredUsers, LocalView, StorageView, UserDirectory};
use fa_trashbin_core::{Outcome, Reconciler, TrashEvent};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const BACKEND: &str = "home";
pub const F_UID: &str = "f_project1";
pub const OWNER: &str = "owner1";
pub const ALICE: &str = "alice";
pub const TS: i64 = 1700000000;

pub struct Host {
    pub dir: TempDir,
    pub db: Database,
    pub users: ConfiguredUsers,
}

impl Host {
    pub fn new() -> Self {
        Self::with_quotas(&[])
    }

    /// `quotas` pairs a uid with its quota setting.
    pub fn with_quotas(quotas: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig {
            data_dir: dir.path().to_string_lossy().into_owned(),
            ..AppConfig::default()
        };
        for (uid, quota) in quotas {
            config.users.insert(
                uid.to_string(),
                UserConfig {
                    home: None,
                    quota: Some(quota.to_string()),
                },
            );
        }
        Self {
            dir,
            db: Database::open_in_memory().unwrap(),
            users: ConfiguredUsers::new(config),
        }
    }

    /// The usual topology: `f_project1` shares its folder with `owner1`,
    /// who shares it on with `alice`.
    pub fn project() -> Self {
        let host = Self::new();
        host.share_project(F_UID, OWNER, &[ALICE]);
        host
    }

    pub fn view(&self) -> LocalView<'_> {
        LocalView::new(&self.db, &self.users, BACKEND)
    }

    pub fn reconciler<'a>(&'a self, view: &'a LocalView<'a>) -> Reconciler<'a> {
        Reconciler::new(&self.db, view, &self.users)
    }

    pub fn dispatch(&self, actor: &str, event: TrashEvent) -> Outcome {
        let view = self.view();
        self.reconciler(&view).dispatch(actor, &event).unwrap()
    }

    pub fn home(&self, uid: &str) -> PathBuf {
        self.dir.path().join(uid)
    }

    pub fn storage(&self, uid: &str) -> i64 {
        self.db
            .ensure_storage(&account::storage_id(BACKEND, uid))
            .unwrap()
    }

    pub fn share_project(&self, f_uid: &str, owner: &str, users: &[&str]) {
        self.db
            .insert_share(&Share {
                share_type: SHARE_TYPE_USER,
                share_with: owner.to_string(),
                uid_owner: f_uid.to_string(),
                uid_initiator: f_uid.to_string(),
                file_target: format!("/{}", f_uid),
            })
            .unwrap();
        for user in users {
            self.db
                .insert_share(&Share {
                    share_type: SHARE_TYPE_USER,
                    share_with: user.to_string(),
                    uid_owner: f_uid.to_string(),
                    uid_initiator: owner.to_string(),
                    file_target: format!("/{}", f_uid),
                })
                .unwrap();
        }
    }

    /// Write a file below `uid`'s home and index it. Returns its file id.
    pub fn write_file(&self, uid: &str, relative: &str, contents: &str) -> i64 {
        let physical = self.home(uid).join(relative);
        fs::create_dir_all(physical.parent().unwrap()).unwrap();
        fs::write(&physical, contents).unwrap();
        let view = self.view();
        let resolved = view.resolve(&account_path(uid, relative)).unwrap();
        view.refresh_index(&resolved).unwrap();
        self.entry(uid, relative).unwrap().file_id
    }

    pub fn entry(&self, uid: &str, relative: &str) -> Option<FileIndexEntry> {
        self.db.file_by_path(self.storage(uid), relative).unwrap()
    }

    pub fn read(&self, uid: &str, relative: &str) -> String {
        fs::read_to_string(self.home(uid).join(relative)).unwrap()
    }

    pub fn exists(&self, uid: &str, relative: &str) -> bool {
        self.home(uid).join(relative).exists()
    }

    fn ensure_trash(&self, uid: &str) {
        let view = self.view();
        for dir in [TRASH_BASE, TRASH_ROOT] {
            let path = account_path(uid, dir);
            if !view.is_dir(&path) {
                view.mkdir(&path).unwrap();
            }
        }
    }

    /// What the host does when `actor` deletes `f_uid/files/<node>` through
    /// the share: `actor` gets a copy in their trash (unless their quota is
    /// zero or they are the functional account) and the functional account's node moves into its own trash,
    /// keeping its file id. Returns that file id.
    pub fn user_deletes(&self, actor: &str, f_uid: &str, node: &str, ts: i64) -> i64 {
        let (location, base) = match node.rsplit_once('/') {
            Some((location, base)) => (location, base),
            None => (".", node),
        };
        let trashed = trash_name::format(base, ts);
        let view = self.view();

        if actor != f_uid && !self.users.quota(actor).is_zero() {
            self.ensure_trash(actor);
            copy_tree(
                &self.home(f_uid).join("files").join(node),
                &self.home(actor).join(trash_path(&trashed)),
            );
            let resolved = view
                .resolve(&account_path(actor, &trash_path(&trashed)))
                .unwrap();
            view.refresh_index(&resolved).unwrap();
            self.db
                .insert_trash_record(base, actor, ts, location, actor)
                .unwrap();
        }

        self.ensure_trash(f_uid);
        view.rename(
            &account_path(f_uid, &format!("files/{}", node)),
            &account_path(f_uid, &trash_path(&trashed)),
        )
        .unwrap();
        self.db
            .insert_trash_record(base, f_uid, ts, location, actor)
            .unwrap();
        self.entry(f_uid, &trash_path(&trashed)).unwrap().file_id
    }

    /// What the host does when `actor` restores `trashed` from their own
    /// trash: the node moves to `target` and `actor`'s record is consumed.
    pub fn native_restore(&self, actor: &str, trashed: &str, target: &str) {
        let view = self.view();
        view.rename(&account_path(actor, &trash_path(trashed)), target)
            .unwrap();
        let (base, ts) = trash_name::TrashedName::parse(trashed).root().unwrap();
        self.db.delete_trash_records(base, ts, actor).unwrap();
    }

    /// What the host does when `actor` empties one item from their trash.
    pub fn native_purge(&self, actor: &str, trashed: &str) {
        let view = self.view();
        view.unlink(&account_path(actor, &trash_path(trashed))).unwrap();
        let (base, ts) = trash_name::TrashedName::parse(trashed).root().unwrap();
        self.db.delete_trash_records(base, ts, actor).unwrap();
    }
}

pub fn copy_tree(source: &Path, target: &Path) {
    if source.is_dir() {
        fs::create_dir_all(target).unwrap();
        for entry in fs::read_dir(source).unwrap() {
            let entry = entry.unwrap();
            copy_tree(&entry.path(), &target.join(entry.file_name()));
        }
    } else {
        fs::copy(source, target).unwrap();
    }
}
