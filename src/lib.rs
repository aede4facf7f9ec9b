//! cloudmirror - local mirror of remote cloud resource collections
//!
//! Collections of remote resources are cached per parent and reloaded
//! lazily once their cache goes stale. Reloads are reconciled against the
//! cache (added, refreshed, deleted), at most one reload runs per collection
//! at a time, and observers get one debounced change notification per batch.
//! Create and update go through drafts, with an optimistic local placeholder
//! that is rolled back when the remote call fails.
//!
//! - [`resource`] - modules, resources, drafts and reconciliation
//! - [`remote`] - the remote client boundary with HTTP and in-memory clients
//! - [`notification`] - change notifications and error reporting
//! - [`config`] - persisted configuration and cache options

pub mod config;
pub mod debounce;
pub mod error;
pub mod notification;
pub mod remote;
pub mod resource;

pub use config::{CacheOptions, Config};
pub use error::{Error, RemoteError, Result};
pub use notification::{
    BroadcastSink, ErrorLog, ErrorReporter, EventKind, EventSource, Notification,
    NotificationLog, NotificationSink, NullSink, TracingReporter,
};
pub use remote::{Capabilities, HttpRemoteClient, InMemoryRemote, RemoteClient};
pub use resource::{
    AnyModule, Draft, GenericKind, Module, Resource, ResourceKind, ResourceOrDraft, RootScope,
    Scope, Status, SyncContext,
};

/// Version injected at compile time via CLOUDMIRROR_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("CLOUDMIRROR_VERSION") {
    Some(v) => v,
    None => "dev",
};
