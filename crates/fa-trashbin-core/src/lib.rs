pub mod account;
pub mod config;
pub mod error;
pub mod events;
pub mod reconcile;
pub mod replicate;
pub mod storage;
pub mod trash_name;
pub mod view;

pub use config::AppConfig;
pub use error::Error;
pub use events::TrashEvent;
pub use reconcile::{Outcome, Reconciler, Report, SkipReason};
pub use replicate::NodeReplicator;
