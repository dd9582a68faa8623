mod engine;
mod ledger;
mod log;
mod outcome;
mod scope;
mod step;
mod storage;
mod sync;
mod version;

pub use engine::Engine;
pub use ledger::{Ledger, LedgerEntry};
pub use log::Logger;
pub use outcome::RunOutcome;
pub use scope::{ResourceScope, Session, SessionConnector};
pub use step::{report_step_failure, StepContext, UpgradeStep, STEP_FAILURE_CODE};
pub use storage::Storage;
pub use sync::{RepositoryHandle, RepositorySync, SyncKind, DEFAULT_COMMIT_PREFIX};
pub use version::{VersionStore, VERSION_MARKER_PATH};
