//! Keeps the trash state of a functional account, its project owner and the
//! end user who deleted a node consistent.
//!
//! The host has already finished its own delete/restore by the time any of
//! these handlers run. They only add or remove the rows and nodes the host
//! does not know about. Storage failures along the way are logged and
//! collected in the [`Report`]; rows written before the failure are not
//! rolled back.

mod delete;
mod purge;
mod restore;

use crate::account::Role;
use crate::events::TrashEvent;
use crate::replicate::NodeReplicator;
use crate::storage::{Database, TRASH_BASE, TRASH_ROOT};
use crate::view::{account_path, StorageView, UserDirectory};
use crate::Error;
use tracing::{debug, error};

/// Why an event needed no reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The file id is not in the index (any more).
    UnknownFile,
    /// The node's storage id does not name an account.
    UnresolvableStorage,
    /// The node does not live in a functional account's storage.
    NotFunctionalAccount,
    /// No end-user copy shares the functional account's trashed path.
    NoSiblingRow,
    /// The name belongs to a node below a trashed root.
    SubNode,
    /// Fewer than two accounts hold a record for the trashed node.
    NotPropagated,
    /// The project owner deleted the node; nothing to mirror.
    OwnerIsDeleter,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub trash_records_written: usize,
    pub trash_records_removed: usize,
    pub index_rows_written: usize,
    pub index_rows_removed: usize,
    pub bytes_transferred: u64,
    /// Storage operations that failed and were left as they are.
    pub failures: Vec<String>,
}

impl Report {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        *self == Report::default()
    }

    fn record_failure(&mut self, context: &str, err: &Error) {
        error!("{}: {}", context, err);
        self.failures.push(format!("{}: {}", context, err));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Skipped(SkipReason),
    Applied(Report),
}

impl Outcome {
    pub fn report(&self) -> Option<&Report> {
        match self {
            Outcome::Applied(report) => Some(report),
            Outcome::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Outcome::Skipped(reason) => Some(*reason),
            Outcome::Applied(_) => None,
        }
    }
}

/// One value per role of a propagated trash event.
#[derive(Debug)]
struct ByRole<T> {
    functional: Option<T>,
    owner: Option<T>,
    user: Option<T>,
}

impl<T> Default for ByRole<T> {
    fn default() -> Self {
        Self {
            functional: None,
            owner: None,
            user: None,
        }
    }
}

impl<T> ByRole<T> {
    fn slot(&mut self, role: Role) -> &mut Option<T> {
        match role {
            Role::FunctionalAccount => &mut self.functional,
            Role::Owner => &mut self.owner,
            Role::User => &mut self.user,
        }
    }

    fn iter(&self) -> impl Iterator<Item = (Role, &T)> {
        [
            (Role::FunctionalAccount, self.functional.as_ref()),
            (Role::Owner, self.owner.as_ref()),
            (Role::User, self.user.as_ref()),
        ]
        .into_iter()
        .filter_map(|(role, value)| value.map(|v| (role, v)))
    }
}

pub struct Reconciler<'a> {
    db: &'a Database,
    view: &'a dyn StorageView,
    users: &'a dyn UserDirectory,
}

impl<'a> Reconciler<'a> {
    pub fn new(db: &'a Database, view: &'a dyn StorageView, users: &'a dyn UserDirectory) -> Self {
        Self { db, view, users }
    }

    /// Route a host notification to its handler. `actor` is the account of
    /// the request that triggered it.
    pub fn dispatch(&self, actor: &str, event: &TrashEvent) -> Result<Outcome, Error> {
        debug!("Handling {} for '{}'", event.kind(), actor);
        let outcome = match event {
            TrashEvent::NodeDeleted { file_id } => self.on_node_deleted(actor, *file_id),
            TrashEvent::NodeRestored { name, path } => self.on_node_restored(actor, name, path),
            TrashEvent::PermanentDelete { path } => self.on_permanent_delete(actor, path),
        }?;
        if let Outcome::Skipped(reason) = &outcome {
            debug!("{} needs no reconciliation: {:?}", event.kind(), reason);
        }
        Ok(outcome)
    }

    fn replicator(&self) -> NodeReplicator<'a> {
        NodeReplicator::new(self.view, self.users)
    }

    /// Create `files_trashbin` and `files_trashbin/files` for `uid` when
    /// missing, and make sure the trash root is indexed.
    fn set_up_trash(&self, uid: &str, report: &mut Report) {
        for dir in [TRASH_BASE, TRASH_ROOT] {
            let path = account_path(uid, dir);
            if self.view.is_dir(&path) {
                continue;
            }
            if let Err(err) = self.view.mkdir(&path) {
                report.record_failure(&format!("Unable to set up trashbin of '{}'", uid), &err);
                return;
            }
        }

        let root = account_path(uid, TRASH_ROOT);
        let indexed = self
            .view
            .resolve(&root)
            .and_then(|resolved| {
                if self.db.trash_root_entry(resolved.storage)?.is_none() {
                    self.view.refresh_index(&resolved)?;
                }
                Ok(())
            });
        if let Err(err) = indexed {
            report.record_failure(&format!("Unable to index trashbin of '{}'", uid), &err);
        }
    }
}
