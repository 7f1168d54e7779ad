use super::{Outcome, Reconciler, Report, SkipReason};
use crate::storage::models::FileIndexEntry;
use crate::trash_name::TrashedName;
use crate::view::account_path;
use crate::Error;
use tracing::{debug, info};

/// Collapse doubled separators and drop the leading one, giving the path as
/// the file index stores it.
fn normalize(path: &str) -> String {
    let mut clean = path.to_string();
    while clean.contains("//") {
        clean = clean.replace("//", "/");
    }
    clean.trim_start_matches('/').to_string()
}

impl Reconciler<'_> {
    /// Permanently remove every account's copy of a trashed node once one of
    /// them has deleted it from their trash. `path` is the storage-internal
    /// path of the purged node.
    pub fn on_permanent_delete(&self, actor: &str, path: &str) -> Result<Outcome, Error> {
        let clean = normalize(path);
        let name = clean.rsplit('/').next().unwrap_or(&clean).to_string();

        let mut functional: Option<(String, FileIndexEntry)> = None;
        let mut others: Vec<(String, FileIndexEntry)> = Vec::new();
        for entry in self.db.files_by_path_and_name(&clean, &name)? {
            let identity = entry.account().ok_or_else(|| {
                Error::Integrity(format!(
                    "filecache item {} has an unresolvable storage",
                    entry.file_id
                ))
            })?;
            if !identity.is_functional() {
                others.push((identity.uid, entry));
            } else if functional.is_some() {
                return Err(Error::Integrity(format!(
                    "more than one functional account holds '{}'",
                    clean
                )));
            } else {
                functional = Some((identity.uid, entry));
            }
        }
        let Some((f_uid, f_entry)) = functional else {
            return Ok(Outcome::Skipped(SkipReason::NotFunctionalAccount));
        };

        debug!("'{}' purged '{}' from a trashbin shared with '{}'", actor, clean, f_uid);
        let mut report = Report::default();
        self.purge_copy(&f_uid, &f_entry, &mut report)?;
        for (uid, entry) in &others {
            self.purge_copy(uid, entry, &mut report)?;
        }

        if let Some((base, timestamp)) = TrashedName::parse(&name).root() {
            for record in self.db.trash_siblings(base, timestamp)? {
                report.trash_records_removed +=
                    self.db.delete_trash_records(base, timestamp, &record.user)?;
            }
        }

        info!(
            "Purged '{}' from {} trashbins",
            name,
            others.len() + 1
        );
        Ok(Outcome::Applied(report))
    }

    fn purge_copy(&self, uid: &str, entry: &FileIndexEntry, report: &mut Report) -> Result<(), Error> {
        let node = account_path(uid, &entry.path);
        let rows = self.db.count_files_under(entry.storage, &entry.path)? as usize;
        if !self.view.exists(&node) {
            report.index_rows_removed += self.db.delete_files_under(entry.storage, &entry.path)?;
            return Ok(());
        }
        match self.view.unlink(&node) {
            Ok(()) => report.index_rows_removed += rows,
            Err(err) => report.record_failure(&format!("Unable to purge '{}'", node), &err),
        }
        Ok(())
    }
}
