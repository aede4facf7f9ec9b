//! Resource cache engine
//!
//! Remote collections are mirrored locally as a tree of [`Module`]s (one per
//! collection) owning [`Resource`]s (one per remote object). Resources may
//! expose further modules for their own child collections:
//!
//! ```text
//! account ─ keyspaces (Module) ─ keyspace (Resource) ─ tables (Module) ─ table
//! ```
//!
//! # Architecture
//!
//! - [`module`] - lazy reload, reconciliation, lookups, drafts, invalidation
//! - [`entity`] - the cached resource and its status transitions
//! - [`reconcile`] - pure added/refreshed/deleted diff
//! - [`kind`] - per resource-type strategy (naming, status, drafts, children)
//! - [`generic`] - a kind for plain JSON collections
//! - [`id`] - hierarchical identities and the resource-group placeholder
//!
//! # Example
//!
//! ```ignore
//! use cloudmirror::remote::InMemoryRemote;
//! use cloudmirror::resource::{GenericKind, Module, RootScope, Scope, SyncContext};
//! use std::sync::{Arc, Weak};
//!
//! let root = Arc::new(RootScope::new("/subscriptions/s1"));
//! let parent: Weak<dyn Scope> = Arc::downgrade(&root) as Weak<dyn Scope>;
//! let remote = InMemoryRemote::new(items, |v| v["name"].as_str().unwrap_or_default().to_string());
//! let kind = Arc::new(GenericKind::new("Site"));
//! let sites = Module::new("sites", parent, kind, Arc::new(remote), SyncContext::default());
//! for site in sites.list().await {
//!     println!("{} {}", site.name(), site.status());
//! }
//! ```

pub mod draft;
pub mod entity;
pub mod generic;
pub mod id;
pub mod kind;
pub mod module;
pub mod reconcile;
pub mod scope;
pub mod status;

pub use draft::{Draft, ResourceOrDraft};
pub use entity::{DraftState, Resource};
pub use generic::GenericKind;
pub use id::{ResourceId, RESOURCE_GROUP_PLACEHOLDER};
pub use kind::{GroupPolicy, ResourceKind};
pub use module::{AnyModule, Module, SyncContext, SyncState};
pub use reconcile::{reconcile, Reconciliation};
pub use scope::{RootScope, Scope};
pub use status::Status;
