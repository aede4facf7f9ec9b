//! Resource kinds
//!
//! Everything that differs between resource types (how a remote object is
//! named, how its status is derived, which drafts exist, which nested
//! collections hang below it) lives in a [`ResourceKind`] strategy. Modules
//! and resources are generic and never subclassed.

use super::draft::Draft;
use super::entity::Resource;
use super::module::{AnyModule, SyncContext};
use super::scope::Scope;
use super::status::Status;
use crate::error::RemoteError;
use std::sync::{Arc, Weak};

/// How a missing resource group is resolved for a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupPolicy {
    /// Fall back to the placeholder token (global scope)
    #[default]
    Global,
    /// A resource group must be given or inherited from the parent
    Required,
    /// The resource is a group itself: its name is its group
    SelfNamed,
}

/// Resource-type strategy for remote objects of type `R`
pub trait ResourceKind<R>: Send + Sync + 'static {
    /// Human readable type name, e.g. "Deployment slot"
    fn type_name(&self) -> &str;

    /// Name of a remote object (its identity within the module)
    fn name_of(&self, remote: &R) -> String;

    /// Resource group reported by a remote object, if it carries one
    fn resource_group_of(&self, _remote: &R) -> Option<String> {
        None
    }

    /// Status derived from a remote snapshot
    fn status_of(&self, remote: &R) -> Status;

    fn group_policy(&self) -> GroupPolicy {
        GroupPolicy::Global
    }

    /// HTTP status the backend uses for "not found"
    fn not_found_status(&self) -> u16 {
        404
    }

    fn is_not_found(&self, error: &RemoteError) -> bool {
        error.status_code() == Some(self.not_found_status())
    }

    /// Whether `refresh()` also empties the cache
    fn clear_on_refresh(&self) -> bool {
        false
    }

    /// Recompute derived state after a new snapshot was set
    fn on_remote_changed(&self, _resource: &Resource<R>) {}

    /// Nested collections of a resource, built once when the resource is constructed.
    /// `parent` cannot be upgraded until construction finishes.
    fn sub_modules(
        &self,
        _parent: Weak<dyn Scope>,
        _context: &SyncContext,
    ) -> Vec<Arc<dyn AnyModule>> {
        Vec::new()
    }

    /// Draft for creating `name`; `None` when the kind cannot be created
    fn new_draft_for_create(
        &self,
        _name: &str,
        _resource_group: &str,
    ) -> Option<Box<dyn Draft<R>>> {
        None
    }

    /// Draft for updating `resource`; `None` when the kind cannot be updated
    fn new_draft_for_update(&self, _resource: &Resource<R>) -> Option<Box<dyn Draft<R>>> {
        None
    }
}
