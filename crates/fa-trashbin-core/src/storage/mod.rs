mod filecache;
pub mod models;
mod share;
mod sqlite;
mod trash;

pub use sqlite::Database;

/// Top of every account's trash tree, relative to the account's storage root.
pub const TRASH_ROOT: &str = "files_trashbin/files";

/// Parent of [`TRASH_ROOT`]; created first when an account's trash is set up.
pub const TRASH_BASE: &str = "files_trashbin";

/// Where an account's regular (non-trash) files live.
pub const FILES_ROOT: &str = "files";

pub fn trash_path(node_name: &str) -> String {
    format!("{}/{}", TRASH_ROOT, node_name)
}
