use super::{ByRole, Outcome, Reconciler, Report, SkipReason};
use crate::account::{self, Role};
use crate::storage::models::{FileIndexEntry, TrashRecord};
use crate::storage::{trash_path, FILES_ROOT};
use crate::trash_name::TrashedName;
use crate::view::{account_path, join};
use crate::Error;
use tracing::{debug, info, warn};

/// Where a functional account's node lived before it was deleted.
fn original_location(f_uid: &str, location: &str, base: &str) -> String {
    let location = location.trim_matches('/');
    let folder = if location.is_empty() || location == "." {
        FILES_ROOT.to_string()
    } else {
        join(FILES_ROOT, location)
    };
    account_path(f_uid, &join(&folder, base))
}

fn node_path(entry: &FileIndexEntry) -> Option<String> {
    entry
        .account()
        .map(|identity| account_path(&identity.uid, &entry.path))
}

impl Reconciler<'_> {
    /// Clean up every account's trash state for a propagated node once one
    /// of them has restored it. `name` is the trashed name; `path` is where
    /// the host put the node back and is only logged.
    pub fn on_node_restored(&self, actor: &str, name: &str, path: &str) -> Result<Outcome, Error> {
        let Some((base, timestamp)) = TrashedName::parse(name).root() else {
            return Ok(Outcome::Skipped(SkipReason::SubNode));
        };

        let siblings = self.db.trash_siblings(base, timestamp)?;
        if siblings.len() < 2 {
            return Ok(Outcome::Skipped(SkipReason::NotPropagated));
        }

        let mut records: ByRole<TrashRecord> = ByRole::default();
        for record in siblings {
            let role = account::classify(&record.user, &record.deleted_by);
            let slot = records.slot(role);
            if slot.is_some() {
                return Err(Error::Integrity(format!(
                    "more than one {:?} trashbin item for '{}' at {}",
                    role, base, timestamp
                )));
            }
            *slot = Some(record);
        }
        let Some(f_record) = records.functional.clone() else {
            return Ok(Outcome::Skipped(SkipReason::NotPropagated));
        };

        let mut rows: ByRole<FileIndexEntry> = ByRole::default();
        for entry in self.db.files_by_path_and_name(&trash_path(name), name)? {
            let identity = entry.account().ok_or_else(|| {
                Error::Integrity(format!(
                    "filecache item {} has an unresolvable storage",
                    entry.file_id
                ))
            })?;
            let role = records
                .iter()
                .find(|(_, record)| record.user == identity.uid)
                .map(|(role, _)| role);
            if let Some(role) = role {
                rows.slot(role).get_or_insert(entry);
            }
        }

        debug!(
            "'{}' restored '{}' to '{}' (deleted by '{}')",
            actor, name, path, f_record.deleted_by
        );

        let mut report = Report::default();
        let owner = self.db.project_owner(&f_record.user)?;
        if owner.as_deref() == Some(actor) && actor != f_record.deleted_by {
            self.restore_real_content(actor, name, &f_record, &rows, &mut report);
        }

        for (role, entry) in rows.iter() {
            self.remove_trashed_copy(role, entry, &mut report)?;
        }
        for (_, record) in records.iter() {
            report.trash_records_removed +=
                self.db.delete_trash_records(base, timestamp, &record.user)?;
        }

        info!(
            "Cleared trashbin items of '{}' at {} for {} accounts",
            base,
            timestamp,
            records.iter().count()
        );
        Ok(Outcome::Applied(report))
    }

    /// The owner's restore put a zero-byte stand-in at the functional
    /// account's original location. Replace it with the real content and
    /// drop the owner's own placeholder.
    fn restore_real_content(
        &self,
        owner: &str,
        name: &str,
        f_record: &TrashRecord,
        rows: &ByRole<FileIndexEntry>,
        report: &mut Report,
    ) {
        let target = original_location(&f_record.user, &f_record.location, &f_record.id);
        let source = [rows.user.as_ref(), rows.functional.as_ref()]
            .into_iter()
            .flatten()
            .filter_map(node_path)
            .find(|source| self.view.exists(source));
        let Some(source) = source else {
            warn!("No trashed copy of '{}' left to restore from", name);
            report
                .failures
                .push(format!("no trashed copy of '{}' holds the real content", name));
            return;
        };

        match self.replicator().move_tree(&source, &target) {
            Ok(bytes) => {
                report.bytes_transferred += bytes;
                info!("Restored real content of '{}' to '{}'", name, target);
            }
            Err(err) => {
                report.record_failure(&format!("Unable to move '{}' to '{}'", source, target), &err);
            }
        }

        let placeholder = account_path(owner, &trash_path(name));
        if self.view.exists(&placeholder) {
            if let Err(err) = self.view.unlink(&placeholder) {
                report.record_failure(&format!("Unable to remove placeholder '{}'", placeholder), &err);
            }
        }
    }

    fn remove_trashed_copy(
        &self,
        role: Role,
        entry: &FileIndexEntry,
        report: &mut Report,
    ) -> Result<(), Error> {
        let rows = self.db.count_files_under(entry.storage, &entry.path)? as usize;
        match node_path(entry).filter(|node| self.view.exists(node)) {
            Some(node) => match self.view.unlink(&node) {
                Ok(()) => report.index_rows_removed += rows,
                Err(err) => {
                    report.record_failure(&format!("Unable to remove {:?} copy '{}'", role, node), &err)
                }
            },
            None => {
                report.index_rows_removed += self.db.delete_files_under(entry.storage, &entry.path)?;
            }
        }
        Ok(())
    }
}
