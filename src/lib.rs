pub mod config;
pub mod core;
pub mod download;
pub mod error;
pub mod logging;
pub mod package;
pub mod transport;

pub use config::{BuildConfig, RemoteKind, RemoteSettings};
pub use core::{SyncEngine, SyncOptions, SyncOutcome, SyncPlan, SyncReport};
pub use error::{PackageError, SyncError, TransportError};
pub use transport::{create_transport, Transport};
