/// Notifications the host emits after its own trash handling has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrashEvent {
    /// A node was moved to the trash. `file_id` is the node's file index id,
    /// which the host keeps when it moves the row into the trash tree.
    NodeDeleted { file_id: i64 },
    /// A node was restored. `name` is its name inside the trash tree
    /// (`<base>.d<timestamp>` for a root entry), `path` where it was restored to.
    NodeRestored { name: String, path: String },
    /// A node was removed from a trash tree for good.
    PermanentDelete { path: String },
}

impl TrashEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TrashEvent::NodeDeleted { .. } => "node_deleted",
            TrashEvent::NodeRestored { .. } => "node_restored",
            TrashEvent::PermanentDelete { .. } => "permanent_delete",
        }
    }
}
