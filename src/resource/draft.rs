//! Drafts: uncommitted create/update requests

use super::entity::Resource;
use crate::error::RemoteError;
use async_trait::async_trait;
use std::sync::Arc;

/// A create or update request for one resource
///
/// Modules hand drafts out through `new_draft_for_create`, `get_or_draft` and
/// `update_or_create`, and commit them with `create`/`update`.
#[async_trait]
pub trait Draft<R>: Send + Sync {
    fn name(&self) -> &str;

    fn resource_group(&self) -> Option<&str> {
        None
    }

    /// Create the resource remotely, returning its first snapshot
    async fn create_remote(&self) -> Result<R, RemoteError>;

    /// Apply the draft to an existing remote resource. Create-only drafts
    /// answer `RemoteError::Unsupported("update")`.
    async fn update_remote(&self, current: &R) -> Result<R, RemoteError>;

    /// Whether the draft carries any change
    fn is_modified(&self) -> bool;

    /// Discard pending changes
    fn reset(&mut self);
}

/// Result of a lookup that falls back to a create draft
pub enum ResourceOrDraft<R> {
    Resource(Arc<Resource<R>>),
    Draft(Box<dyn Draft<R>>),
}

impl<R> ResourceOrDraft<R> {
    pub fn is_draft(&self) -> bool {
        matches!(self, Self::Draft(_))
    }

    pub fn resource(self) -> Option<Arc<Resource<R>>> {
        match self {
            Self::Resource(resource) => Some(resource),
            Self::Draft(_) => None,
        }
    }

    pub fn draft(self) -> Option<Box<dyn Draft<R>>> {
        match self {
            Self::Resource(_) => None,
            Self::Draft(draft) => Some(draft),
        }
    }
}

impl<R> std::fmt::Debug for ResourceOrDraft<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resource(resource) => f.debug_tuple("Resource").field(&resource.id()).finish(),
            Self::Draft(draft) => f.debug_tuple("Draft").field(&draft.name()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rename {
        name: String,
        modified: bool,
    }

    #[async_trait]
    impl Draft<String> for Rename {
        fn name(&self) -> &str {
            &self.name
        }

        async fn create_remote(&self) -> Result<String, RemoteError> {
            Ok(self.name.clone())
        }

        async fn update_remote(&self, current: &String) -> Result<String, RemoteError> {
            if current == &self.name {
                return Err(RemoteError::Unsupported("update"));
            }
            Ok(self.name.clone())
        }

        fn is_modified(&self) -> bool {
            self.modified
        }

        fn reset(&mut self) {
            self.modified = false;
        }
    }

    #[test]
    fn test_draft_calls() {
        let mut draft = Rename {
            name: "web".to_string(),
            modified: true,
        };
        assert_eq!(draft.resource_group(), None);
        assert_eq!(tokio_test::block_on(draft.create_remote()), Ok("web".to_string()));
        assert_eq!(
            tokio_test::block_on(draft.update_remote(&"old".to_string())),
            Ok("web".to_string())
        );
        assert_eq!(
            tokio_test::block_on(draft.update_remote(&"web".to_string())),
            Err(RemoteError::Unsupported("update"))
        );

        draft.reset();
        assert!(!draft.is_modified());
    }

    #[test]
    fn test_draft_variant() {
        let either: ResourceOrDraft<String> = ResourceOrDraft::Draft(Box::new(Rename {
            name: "api".to_string(),
            modified: false,
        }));
        assert!(either.is_draft());
        assert_eq!(format!("{:?}", either), "Draft(\"api\")");
        assert!(either.resource().is_none());
    }
}
