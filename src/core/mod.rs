pub mod engine;
pub mod executor;
pub mod planner;
pub mod progress;
pub mod scanner;

pub use engine::{SyncEngine, SyncOptions, SyncReport};
pub use executor::{FailedOperation, SyncExecutor, SyncOutcome};
pub use planner::{plan, FileRelation, SyncPlan};
pub use progress::{SyncPhase, SyncProgress};
pub use scanner::{scan_local, scan_remote, FileMap, FileRecord, LocalTree, RemoteTree};
