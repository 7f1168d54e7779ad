use super::{Outcome, Reconciler, Report, SkipReason};
use crate::storage::models::{FileIndexEntry, TrashRecord};
use crate::storage::{trash_path, TRASH_ROOT};
use crate::trash_name::TrashedName;
use crate::view::account_path;
use crate::Error;
use tracing::{debug, info};

impl Reconciler<'_> {
    /// Mirror a delete in a functional account's folder into the project
    /// owner's trash. `file_id` is the deleted node's index id, which the
    /// host keeps when it moves the node into the functional account's trash.
    pub fn on_node_deleted(&self, actor: &str, file_id: i64) -> Result<Outcome, Error> {
        let Some(f_entry) = self.db.file_by_id(file_id)? else {
            return Ok(Outcome::Skipped(SkipReason::UnknownFile));
        };
        let Some(f_account) = f_entry.account() else {
            return Ok(Outcome::Skipped(SkipReason::UnresolvableStorage));
        };
        if !f_account.is_functional() {
            return Ok(Outcome::Skipped(SkipReason::NotFunctionalAccount));
        }
        let f_uid = f_account.uid.as_str();
        let mut report = Report::default();

        let sibling = match self.db.sibling_of_functional_item(f_entry.file_id)? {
            Some(sibling) => sibling,
            None => {
                if actor == f_uid || !self.users.quota(actor).is_zero() {
                    return Ok(Outcome::Skipped(SkipReason::NoSiblingRow));
                }
                if !self.provide_deleter_copy(actor, f_uid, &f_entry, &mut report)? {
                    return Ok(Outcome::Skipped(SkipReason::NoSiblingRow));
                }
                match self.db.sibling_of_functional_item(f_entry.file_id)? {
                    Some(sibling) => sibling,
                    // the copy failed and is already in the report
                    None => return Ok(Outcome::Applied(report)),
                }
            }
        };

        let Some((base, timestamp)) = TrashedName::parse(&sibling.name).root() else {
            return Ok(Outcome::Skipped(SkipReason::SubNode));
        };

        let user_record = self
            .db
            .trash_record(base, actor, timestamp, actor)?
            .ok_or_else(|| {
                Error::Integrity(format!(
                    "no trashbin item '{}' at {} for '{}'",
                    base, timestamp, actor
                ))
            })?;

        let owner = self.db.project_owner(f_uid)?.ok_or_else(|| {
            Error::Integrity(format!("no project owner found for '{}'", f_uid))
        })?;
        if owner == actor {
            debug!("'{}' owns '{}', nothing to mirror", actor, f_uid);
            return Ok(if report.is_empty() {
                Outcome::Skipped(SkipReason::OwnerIsDeleter)
            } else {
                Outcome::Applied(report)
            });
        }

        self.mirror_to_owner(&owner, &sibling, &user_record, &mut report)?;
        info!(
            "Mirrored deletion of '{}' by '{}' into the trashbin of '{}'",
            sibling.name, actor, owner
        );
        Ok(Outcome::Applied(report))
    }

    /// The host writes no trash entry for a user without quota. Give the
    /// deleting user their record and a full copy of the node, taken from
    /// the functional account's trash. Returns `false` when the functional
    /// account's row is not a trashed root.
    fn provide_deleter_copy(
        &self,
        actor: &str,
        f_uid: &str,
        f_entry: &FileIndexEntry,
        report: &mut Report,
    ) -> Result<bool, Error> {
        if f_entry.path != trash_path(&f_entry.name) {
            return Ok(false);
        }
        let Some((base, timestamp)) = TrashedName::parse(&f_entry.name).root() else {
            return Ok(false);
        };
        let f_record = self
            .db
            .trash_record(base, f_uid, timestamp, actor)?
            .ok_or_else(|| {
                Error::Integrity(format!(
                    "no trashbin item '{}' at {} for '{}' deleted by '{}'",
                    base, timestamp, f_uid, actor
                ))
            })?;

        info!(
            "'{}' has no quota, copying '{}' into their trashbin",
            actor, f_entry.name
        );
        self.set_up_trash(actor, report);
        if self.db.insert_trash_record(
            base,
            actor,
            timestamp,
            &f_record.location,
            &f_record.deleted_by,
        )? {
            report.trash_records_written += 1;
        }
        match self.replicator().copy(f_uid, actor, &f_entry.name) {
            Ok(bytes) => report.bytes_transferred += bytes,
            Err(err) => report.record_failure(
                &format!("Unable to copy '{}' to '{}'", f_entry.name, actor),
                &err,
            ),
        }
        Ok(true)
    }

    fn mirror_to_owner(
        &self,
        owner: &str,
        sibling: &FileIndexEntry,
        user_record: &TrashRecord,
        report: &mut Report,
    ) -> Result<(), Error> {
        if self.db.insert_trash_record(
            &user_record.id,
            owner,
            user_record.timestamp,
            &user_record.location,
            &user_record.deleted_by,
        )? {
            report.trash_records_written += 1;
        } else {
            report.failures.push(format!(
                "trashbin item '{}' at {} already present for '{}'",
                user_record.id, user_record.timestamp, owner
            ));
        }

        let failures = report.failures.len();
        self.set_up_trash(owner, report);
        if report.failures.len() > failures {
            return Ok(());
        }

        let owner_storage = self.view.resolve(&account_path(owner, TRASH_ROOT))?.storage;
        let root = self.db.trash_root_entry(owner_storage)?.ok_or_else(|| {
            Error::Integrity(format!("trashbin root of '{}' is not indexed", owner))
        })?;

        let entry = FileIndexEntry {
            file_id: 0,
            storage: owner_storage,
            parent: root.file_id,
            size: 0,
            unencrypted_size: 0,
            storage_id: None,
            ..sibling.clone()
        };
        if self.db.insert_file(&entry)? {
            report.index_rows_written += 1;
        } else {
            report.failures.push(format!(
                "filecache item '{}' already present for '{}'",
                entry.path, owner
            ));
        }

        let placeholder = account_path(owner, &sibling.path);
        let materialized = if sibling.is_dir() {
            self.view
                .mkdir(&placeholder)
                .and_then(|_| self.view.touch(&placeholder, Some(sibling.mtime)))
        } else {
            self.view.touch(&placeholder, Some(sibling.mtime))
        };
        match materialized {
            // materializing re-indexes the node from disk; put the user's metadata back
            Ok(()) => {
                self.db.upsert_file(&entry)?;
            }
            Err(err) => {
                report.record_failure(&format!("Unable to create placeholder '{}'", placeholder), &err);
            }
        }
        Ok(())
    }
}
