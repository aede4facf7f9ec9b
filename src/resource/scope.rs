//! Parent scopes
//!
//! A module only holds a weak back-reference to its parent; the parent's
//! lifecycle belongs to whoever owns it (a cached resource, or the caller for
//! a [`RootScope`]).

/// What a module needs to know about its parent
pub trait Scope: Send + Sync {
    /// Identity of the scope, possibly containing the resource-group placeholder
    fn id(&self) -> String;

    /// Resource group children inherit when none is given
    fn resource_group(&self) -> Option<String>;

    /// True while the scope is a local draft that was never created remotely
    fn is_draft_for_creating(&self) -> bool;

    /// Whether the scope is known to exist remotely
    fn exists(&self) -> bool;

    /// Whether the scope is a service root (its children are service collections)
    fn is_service(&self) -> bool {
        false
    }
}

/// Top of a resource tree: a subscription, an account or a service root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootScope {
    id: String,
    resource_group: Option<String>,
    service: bool,
}

impl RootScope {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_group: None,
            service: false,
        }
    }

    /// Root whose modules are top-level service collections
    pub fn service(id: impl Into<String>) -> Self {
        Self {
            service: true,
            ..Self::new(id)
        }
    }

    pub fn with_resource_group(mut self, resource_group: impl Into<String>) -> Self {
        self.resource_group = Some(resource_group.into());
        self
    }
}

impl Scope for RootScope {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn resource_group(&self) -> Option<String> {
        self.resource_group.clone()
    }

    fn is_draft_for_creating(&self) -> bool {
        false
    }

    fn exists(&self) -> bool {
        true
    }

    fn is_service(&self) -> bool {
        self.service
    }
}
