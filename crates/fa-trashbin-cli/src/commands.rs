use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "fa-trashbin")]
#[command(about = "Keeps functional-account trashbins in step with their owners", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the database and its tables
    InitDb,
    /// Reconcile after a user moved a node to the trash
    Deleted {
        /// Account that deleted the node
        #[arg(long)]
        user: String,
        /// File index id of the deleted node
        #[arg(long)]
        file_id: i64,
    },
    /// Reconcile after a user restored a node from their trash
    Restored {
        /// Account that restored the node
        #[arg(long)]
        user: String,
        /// Name inside the trash, e.g. report.pdf.d1700000000
        #[arg(long)]
        name: String,
        /// Where the node was restored to
        #[arg(long, default_value = "")]
        path: String,
    },
    /// Reconcile after a user permanently deleted a node from their trash
    Purge {
        /// Account that purged the node
        #[arg(long)]
        user: String,
        /// Storage path of the purged node
        #[arg(long)]
        path: String,
    },
    /// List the functional accounts owned by a user and their trash items
    Owned {
        #[arg(long)]
        user: String,
    },
    /// Print configuration values
    PrintConfig,
    /// Truncate all database tables
    TruncateDb,
}
