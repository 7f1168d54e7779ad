mod common;

use common::*;
use fa_trashbin_core::storage::trash_path;
use fa_trashbin_core::trash_name;
use fa_trashbin_core::view::{account_path, StorageView};
use fa_trashbin_core::{Error, Outcome, SkipReason, TrashEvent};
use std::fs;

const REPORT: &str = "report.pdf";
const TRASHED_REPORT: &str = "report.pdf.d1700000000";

fn deleted(file_id: i64) -> TrashEvent {
    TrashEvent::NodeDeleted { file_id }
}

fn restored(name: &str, path: &str) -> TrashEvent {
    TrashEvent::NodeRestored {
        name: name.to_string(),
        path: path.to_string(),
    }
}

/// alice deletes `report.pdf` from the project folder and the deletion is
/// mirrored into owner1's trash.
fn alice_deletes_report(host: &Host) -> Outcome {
    host.write_file(F_UID, "files/report.pdf", "quarterly numbers");
    let file_id = host.user_deletes(ALICE, F_UID, REPORT, TS);
    host.dispatch(ALICE, deleted(file_id))
}

fn no_rows_left(host: &Host, trashed: &str) -> bool {
    host.db
        .files_by_path_and_name(&trash_path(trashed), trashed)
        .unwrap()
        .is_empty()
}

// ── Deletion ─────────────────────────────────────────────────────

#[test]
fn test_user_delete_is_mirrored_to_owner() {
    let host = Host::project();
    let outcome = alice_deletes_report(&host);

    assert_eq!(outcome.skip_reason(), None);
    let report = outcome.report().expect("deletion should be applied");
    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);
    assert_eq!(report.trash_records_written, 1);
    assert_eq!(report.index_rows_written, 1);

    let alice_record = host.db.trash_record(REPORT, ALICE, TS, ALICE).unwrap();
    assert!(alice_record.is_some());

    let owner_record = host
        .db
        .trash_record(REPORT, OWNER, TS, ALICE)
        .unwrap()
        .expect("owner record");
    assert_eq!(owner_record.location, ".");
    assert_eq!(owner_record.deleted_by, ALICE);

    let owner_entry = host
        .entry(OWNER, &trash_path(TRASHED_REPORT))
        .expect("owner filecache row");
    assert_eq!(owner_entry.size, 0);
    assert_eq!(owner_entry.name, TRASHED_REPORT);
    let owner_root = host.entry(OWNER, "files_trashbin/files").unwrap();
    assert_eq!(owner_entry.parent, owner_root.file_id);

    let placeholder = host.home(OWNER).join(trash_path(TRASHED_REPORT));
    assert!(placeholder.is_file());
    assert_eq!(fs::metadata(&placeholder).unwrap().len(), 0);

    let view = host.view();
    assert_eq!(
        view.mtime(&account_path(OWNER, &trash_path(TRASHED_REPORT))).unwrap(),
        view.mtime(&account_path(ALICE, &trash_path(TRASHED_REPORT))).unwrap()
    );
}

#[test]
fn test_owner_row_keeps_user_metadata() {
    let host = Host::project();
    host.write_file(F_UID, "files/report.pdf", "quarterly numbers");
    let file_id = host.user_deletes(ALICE, F_UID, REPORT, TS);
    host.db
        .connection()
        .execute(
            "UPDATE filecache SET mimetype = 'application/pdf', mimepart = 'application', \
             etag = 'etag-alice', permissions = 1 WHERE storage = ?1 AND path = ?2",
            rusqlite::params![host.storage(ALICE), trash_path(TRASHED_REPORT)],
        )
        .unwrap();

    let outcome = host.dispatch(ALICE, deleted(file_id));
    assert!(outcome.report().unwrap().is_clean());

    let owner_entry = host.entry(OWNER, &trash_path(TRASHED_REPORT)).unwrap();
    assert_eq!(owner_entry.mimetype, "application/pdf");
    assert_eq!(owner_entry.mimepart, "application");
    assert_eq!(owner_entry.etag, "etag-alice");
    assert_eq!(owner_entry.permissions, 1);
    assert_eq!(owner_entry.size, 0);
    // the placeholder on disk is still empty
    assert_eq!(host.read(OWNER, &trash_path(TRASHED_REPORT)), "");
}

#[test]
fn test_directory_delete_gets_empty_directory_placeholder() {
    let host = Host::project();
    host.write_file(F_UID, "files/plans/a.txt", "alpha");
    host.write_file(F_UID, "files/plans/sub/b.txt", "beta");
    let file_id = host.user_deletes(ALICE, F_UID, "plans", TS);

    let outcome = host.dispatch(ALICE, deleted(file_id));
    assert!(outcome.report().unwrap().is_clean());

    let trashed = trash_name::format("plans", TS);
    let placeholder = host.home(OWNER).join(trash_path(&trashed));
    assert!(placeholder.is_dir());
    assert_eq!(fs::read_dir(&placeholder).unwrap().count(), 0);
    assert!(host.entry(OWNER, &trash_path(&trashed)).unwrap().is_dir());
    assert!(host.db.trash_record("plans", OWNER, TS, ALICE).unwrap().is_some());
}

#[test]
fn test_owner_deleting_own_node_is_not_mirrored() {
    let host = Host::project();
    host.write_file(F_UID, "files/report.pdf", "quarterly numbers");
    let file_id = host.user_deletes(OWNER, F_UID, REPORT, TS);

    let outcome = host.dispatch(OWNER, deleted(file_id));
    assert_eq!(outcome.skip_reason(), Some(SkipReason::OwnerIsDeleter));

    let owner_records = host.db.trash_records_for_user(OWNER).unwrap();
    assert_eq!(owner_records.len(), 1);
    assert_eq!(owner_records[0].deleted_by, OWNER);
    // the host's own copy is untouched
    assert_eq!(host.read(OWNER, &trash_path(TRASHED_REPORT)), "quarterly numbers");
}

#[test]
fn test_delete_in_regular_account_is_ignored() {
    let host = Host::project();
    host.write_file(ALICE, "files/notes.txt", "mine");
    let view = host.view();
    view.mkdir(&account_path(ALICE, "files_trashbin")).unwrap();
    view.mkdir(&account_path(ALICE, "files_trashbin/files")).unwrap();
    view.rename(
        &account_path(ALICE, "files/notes.txt"),
        &account_path(ALICE, "files_trashbin/files/notes.txt.d1700000000"),
    )
    .unwrap();
    let file_id = host
        .entry(ALICE, "files_trashbin/files/notes.txt.d1700000000")
        .unwrap()
        .file_id;

    let outcome = host.dispatch(ALICE, deleted(file_id));
    assert_eq!(outcome.skip_reason(), Some(SkipReason::NotFunctionalAccount));
}

#[test]
fn test_unknown_file_is_ignored() {
    let host = Host::project();
    let outcome = host.dispatch(ALICE, deleted(4242));
    assert_eq!(outcome.skip_reason(), Some(SkipReason::UnknownFile));
}

#[test]
fn test_functional_account_delete_without_user_copy_is_ignored() {
    let host = Host::project();
    host.write_file(F_UID, "files/report.pdf", "quarterly numbers");
    // the functional account deletes its own node: no end-user copy exists
    let file_id = host.user_deletes(F_UID, F_UID, REPORT, TS);

    let outcome = host.dispatch(F_UID, deleted(file_id));
    assert_eq!(outcome.skip_reason(), Some(SkipReason::NoSiblingRow));
}

#[test]
fn test_zero_quota_user_gets_full_copy() {
    let host = Host::with_quotas(&[(ALICE, "0 B")]);
    host.share_project(F_UID, OWNER, &[ALICE]);
    let outcome = alice_deletes_report(&host);

    let report = outcome.report().expect("deletion should be applied");
    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);
    assert_eq!(report.trash_records_written, 2);
    assert_eq!(report.bytes_transferred, "quarterly numbers".len() as u64);

    let alice_record = host
        .db
        .trash_record(REPORT, ALICE, TS, ALICE)
        .unwrap()
        .expect("alice record");
    assert_eq!(alice_record.location, ".");
    assert_eq!(host.read(ALICE, &trash_path(TRASHED_REPORT)), "quarterly numbers");
    assert!(host.entry(ALICE, &trash_path(TRASHED_REPORT)).is_some());

    assert!(host.db.trash_record(REPORT, OWNER, TS, ALICE).unwrap().is_some());
    assert!(host.exists(OWNER, &trash_path(TRASHED_REPORT)));
}

#[test]
fn test_missing_user_record_is_integrity_violation() {
    let host = Host::project();
    host.write_file(F_UID, "files/report.pdf", "quarterly numbers");
    let file_id = host.user_deletes(ALICE, F_UID, REPORT, TS);
    host.db.delete_trash_records(REPORT, TS, ALICE).unwrap();

    let view = host.view();
    let result = host.reconciler(&view).dispatch(ALICE, &deleted(file_id));
    assert!(matches!(result, Err(Error::Integrity(_))));
}

#[test]
fn test_second_owner_share_is_integrity_violation() {
    let host = Host::project();
    host.share_project(F_UID, "owner2", &[]);
    host.write_file(F_UID, "files/report.pdf", "quarterly numbers");
    let file_id = host.user_deletes(ALICE, F_UID, REPORT, TS);

    let view = host.view();
    let result = host.reconciler(&view).dispatch(ALICE, &deleted(file_id));
    assert!(matches!(result, Err(Error::Integrity(_))));
    assert!(host.db.trash_record(REPORT, OWNER, TS, ALICE).unwrap().is_none());
}

#[test]
fn test_placeholder_failure_is_reported() {
    let host = Host::project();
    // a file where the owner's trash directory should go
    fs::create_dir_all(host.home(OWNER)).unwrap();
    fs::write(host.home(OWNER).join("files_trashbin"), "in the way").unwrap();

    let outcome = alice_deletes_report(&host);
    let report = outcome.report().expect("deletion should be applied");
    assert!(!report.is_clean());
    // rows written before the failure stay
    assert!(host.db.trash_record(REPORT, OWNER, TS, ALICE).unwrap().is_some());
    assert!(host.entry(OWNER, &trash_path(TRASHED_REPORT)).is_none());
}

// ── Restoration ──────────────────────────────────────────────────

#[test]
fn test_owner_restore_brings_back_real_content() {
    let host = Host::project();
    alice_deletes_report(&host);

    let target = account_path(F_UID, "files/report.pdf");
    host.native_restore(OWNER, TRASHED_REPORT, &target);
    assert_eq!(host.read(F_UID, "files/report.pdf"), "");

    let outcome = host.dispatch(OWNER, restored(TRASHED_REPORT, &target));
    let report = outcome.report().expect("restore should be applied");
    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);
    assert_eq!(report.trash_records_removed, 2);

    assert_eq!(host.read(F_UID, "files/report.pdf"), "quarterly numbers");
    assert!(host.entry(F_UID, "files/report.pdf").unwrap().size > 0);
    assert!(host.db.trash_siblings(REPORT, TS).unwrap().is_empty());
    assert!(no_rows_left(&host, TRASHED_REPORT));
    assert!(!host.exists(F_UID, &trash_path(TRASHED_REPORT)));
    assert!(!host.exists(ALICE, &trash_path(TRASHED_REPORT)));
}

#[test]
fn test_owner_restore_of_directory_brings_back_subtree() {
    let host = Host::project();
    host.write_file(F_UID, "files/Reports/plans/a.txt", "alpha");
    host.write_file(F_UID, "files/Reports/plans/sub/b.txt", "beta");
    let file_id = host.user_deletes(ALICE, F_UID, "Reports/plans", TS);
    host.dispatch(ALICE, deleted(file_id));

    let trashed = trash_name::format("plans", TS);
    let target = account_path(F_UID, "files/Reports/plans");
    host.native_restore(OWNER, &trashed, &target);

    let outcome = host.dispatch(OWNER, restored(&trashed, &target));
    assert!(outcome.report().unwrap().is_clean());

    assert_eq!(host.read(F_UID, "files/Reports/plans/a.txt"), "alpha");
    assert_eq!(host.read(F_UID, "files/Reports/plans/sub/b.txt"), "beta");
    assert!(host.entry(F_UID, "files/Reports/plans/sub/b.txt").is_some());
    assert!(host.db.trash_siblings("plans", TS).unwrap().is_empty());
    assert!(no_rows_left(&host, &trashed));
}

#[test]
fn test_user_restore_clears_owner_placeholder() {
    let host = Host::project();
    alice_deletes_report(&host);

    let target = account_path(F_UID, "files/report.pdf");
    host.native_restore(ALICE, TRASHED_REPORT, &target);

    let outcome = host.dispatch(ALICE, restored(TRASHED_REPORT, &target));
    let report = outcome.report().expect("restore should be applied");
    assert!(report.is_clean());
    assert_eq!(report.bytes_transferred, 0);

    assert_eq!(host.read(F_UID, "files/report.pdf"), "quarterly numbers");
    assert!(!host.exists(OWNER, &trash_path(TRASHED_REPORT)));
    assert!(!host.exists(F_UID, &trash_path(TRASHED_REPORT)));
    assert!(host.db.trash_siblings(REPORT, TS).unwrap().is_empty());
    assert!(no_rows_left(&host, TRASHED_REPORT));
}

#[test]
fn test_owner_restore_falls_back_to_functional_copy() {
    let host = Host::project();
    alice_deletes_report(&host);
    // alice's copy is gone from disk but still indexed
    fs::remove_file(host.home(ALICE).join(trash_path(TRASHED_REPORT))).unwrap();

    let target = account_path(F_UID, "files/report.pdf");
    host.native_restore(OWNER, TRASHED_REPORT, &target);

    let outcome = host.dispatch(OWNER, restored(TRASHED_REPORT, &target));
    let report = outcome.report().expect("restore should be applied");
    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);
    assert_eq!(report.bytes_transferred, "quarterly numbers".len() as u64);

    assert_eq!(host.read(F_UID, "files/report.pdf"), "quarterly numbers");
    assert!(!host.exists(F_UID, &trash_path(TRASHED_REPORT)));
    assert!(host.db.trash_siblings(REPORT, TS).unwrap().is_empty());
    assert!(no_rows_left(&host, TRASHED_REPORT));
}

#[test]
fn test_owner_restore_without_any_copy_still_clears_records() {
    let host = Host::project();
    alice_deletes_report(&host);
    fs::remove_file(host.home(ALICE).join(trash_path(TRASHED_REPORT))).unwrap();
    fs::remove_file(host.home(F_UID).join(trash_path(TRASHED_REPORT))).unwrap();

    let target = account_path(F_UID, "files/report.pdf");
    host.native_restore(OWNER, TRASHED_REPORT, &target);

    let outcome = host.dispatch(OWNER, restored(TRASHED_REPORT, &target));
    let report = outcome.report().expect("restore should be applied");
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].contains("no trashed copy"));
    assert_eq!(report.trash_records_removed, 2);

    // the stand-in is all that is left
    assert_eq!(host.read(F_UID, "files/report.pdf"), "");
    assert!(host.db.trash_siblings(REPORT, TS).unwrap().is_empty());
    assert!(no_rows_left(&host, TRASHED_REPORT));
}

#[test]
fn test_failed_move_is_reported_and_copies_are_cleared() {
    let host = Host::project();
    alice_deletes_report(&host);

    let target = account_path(F_UID, "files/report.pdf");
    host.native_restore(OWNER, TRASHED_REPORT, &target);
    // nowhere to move the content back to
    fs::remove_dir_all(host.home(F_UID).join("files")).unwrap();

    let outcome = host.dispatch(OWNER, restored(TRASHED_REPORT, &target));
    let report = outcome.report().expect("restore should be applied");
    assert!(
        report.failures.iter().any(|f| f.starts_with("Unable to move")),
        "unexpected failures: {:?}",
        report.failures
    );
    assert_eq!(report.bytes_transferred, 0);
    assert_eq!(report.trash_records_removed, 2);

    assert!(!host.exists(ALICE, &trash_path(TRASHED_REPORT)));
    assert!(!host.exists(F_UID, &trash_path(TRASHED_REPORT)));
    assert!(host.db.trash_siblings(REPORT, TS).unwrap().is_empty());
    assert!(no_rows_left(&host, TRASHED_REPORT));
}

#[test]
fn test_restore_of_sub_node_is_ignored() {
    let host = Host::project();
    let outcome = host.dispatch(OWNER, restored("plans.d1700000000/a.txt", "owner1/files/a.txt"));
    assert_eq!(outcome.skip_reason(), Some(SkipReason::SubNode));
}

#[test]
fn test_unpropagated_restore_is_ignored() {
    let host = Host::project();
    host.db
        .insert_trash_record(REPORT, ALICE, TS, ".", ALICE)
        .unwrap();
    let outcome = host.dispatch(ALICE, restored(TRASHED_REPORT, "alice/files/report.pdf"));
    assert_eq!(outcome.skip_reason(), Some(SkipReason::NotPropagated));
    assert_eq!(host.db.trash_siblings(REPORT, TS).unwrap().len(), 1);
}

#[test]
fn test_duplicate_role_is_integrity_violation() {
    let host = Host::project();
    host.db
        .insert_trash_record(REPORT, F_UID, TS, ".", ALICE)
        .unwrap();
    host.db
        .insert_trash_record(REPORT, "f_project2", TS, ".", ALICE)
        .unwrap();

    let view = host.view();
    let result = host
        .reconciler(&view)
        .dispatch(OWNER, &restored(TRASHED_REPORT, "owner1/files/report.pdf"));
    assert!(matches!(result, Err(Error::Integrity(_))));
}

// ── Permanent deletion ───────────────────────────────────────────

#[test]
fn test_purge_removes_every_copy() {
    let host = Host::project();
    alice_deletes_report(&host);
    host.native_purge(OWNER, TRASHED_REPORT);

    let outcome = host.dispatch(
        OWNER,
        TrashEvent::PermanentDelete {
            path: "/files_trashbin/files//report.pdf.d1700000000".to_string(),
        },
    );
    let report = outcome.report().expect("purge should be applied");
    assert!(report.is_clean());
    assert_eq!(report.trash_records_removed, 2);

    assert!(!host.exists(F_UID, &trash_path(TRASHED_REPORT)));
    assert!(!host.exists(ALICE, &trash_path(TRASHED_REPORT)));
    assert!(host.db.trash_siblings(REPORT, TS).unwrap().is_empty());
    assert!(no_rows_left(&host, TRASHED_REPORT));
}

#[test]
fn test_purge_outside_functional_account_is_ignored() {
    let host = Host::project();
    host.write_file(ALICE, "files_trashbin/files/notes.txt.d1700000000", "mine");

    let outcome = host.dispatch(
        ALICE,
        TrashEvent::PermanentDelete {
            path: "files_trashbin/files/notes.txt.d1700000000".to_string(),
        },
    );
    assert_eq!(outcome.skip_reason(), Some(SkipReason::NotFunctionalAccount));
    assert!(host.exists(ALICE, "files_trashbin/files/notes.txt.d1700000000"));
}
