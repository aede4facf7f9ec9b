//! Cached resources
//!
//! A [`Resource`] mirrors one remote object: a fixed identity, the last
//! remote snapshot (absent when the object is not known to exist remotely)
//! and a lifecycle [`Status`]. Identity never changes; only the snapshot,
//! the status and the draft marker do.

use super::id;
use super::kind::ResourceKind;
use super::module::{AnyModule, Module};
use super::scope::Scope;
use super::status::Status;
use crate::error::{Error, RemoteError, Result};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Whether a resource is an uncommitted draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DraftState {
    #[default]
    None,
    ForCreating,
    ForUpdating,
}

struct State<R> {
    remote: Option<R>,
    status: Status,
    draft: DraftState,
}

pub struct Resource<R> {
    name: String,
    resource_group: String,
    id: String,
    module: Weak<Module<R>>,
    kind: Arc<dyn ResourceKind<R>>,
    state: RwLock<State<R>>,
    sub_modules: Vec<Arc<dyn AnyModule>>,
}

impl<R> std::fmt::Debug for Resource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("status", &state.status)
            .field("exists", &state.remote.is_some())
            .field("draft", &state.draft)
            .finish()
    }
}

impl<R> Resource<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn read(&self) -> RwLockReadGuard<'_, State<R>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State<R>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: Clone + Send + Sync + 'static> Resource<R> {
    pub(crate) fn new(
        module: &Arc<Module<R>>,
        id: String,
        name: &str,
        resource_group: &str,
        draft: DraftState,
    ) -> Arc<Self> {
        let kind = module.kind();
        let context = module.context().clone();
        Arc::new_cyclic(|me: &Weak<Self>| {
            let scope: Weak<dyn Scope> = me.clone();
            let sub_modules = kind.sub_modules(scope, &context);
            Self {
                name: name.to_string(),
                resource_group: resource_group.to_string(),
                id,
                module: Arc::downgrade(module),
                kind,
                state: RwLock::new(State {
                    remote: None,
                    status: if draft == DraftState::ForCreating {
                        Status::Creating
                    } else {
                        Status::Unknown
                    },
                    draft,
                }),
                sub_modules,
            }
        })
    }

    /// Resource group, `None` for unscoped resources
    pub fn resource_group(&self) -> Option<&str> {
        if id::is_unscoped(Some(&self.resource_group)) {
            None
        } else {
            Some(&self.resource_group)
        }
    }

    /// Clone of the last remote snapshot
    pub fn remote(&self) -> Option<R> {
        self.read().remote.clone()
    }

    /// Run `f` against the snapshot without cloning it
    pub fn with_remote<T>(&self, f: impl FnOnce(Option<&R>) -> T) -> T {
        f(self.read().remote.as_ref())
    }

    pub fn status(&self) -> Status {
        self.read().status.clone()
    }

    pub fn exists(&self) -> bool {
        self.read().remote.is_some()
    }

    pub fn is_draft_for_creating(&self) -> bool {
        self.read().draft == DraftState::ForCreating
    }

    pub fn is_draft_for_updating(&self) -> bool {
        self.read().draft == DraftState::ForUpdating
    }

    /// Owning module, if it is still alive
    pub fn module(&self) -> Option<Arc<Module<R>>> {
        self.module.upgrade()
    }

    pub fn sub_modules(&self) -> &[Arc<dyn AnyModule>] {
        &self.sub_modules
    }

    /// Typed access to a nested collection by name
    pub fn sub_module<C>(&self, name: &str) -> Option<Arc<Module<C>>>
    where
        C: Clone + Send + Sync + 'static,
    {
        self.sub_modules
            .iter()
            .find(|m| m.name() == name)
            .and_then(|m| Arc::clone(m).as_any_arc().downcast::<Module<C>>().ok())
    }

    /// Replace the snapshot and derive the status from it
    pub fn set_remote(&self, remote: Option<R>) {
        {
            let mut state = self.write();
            state.status = match (&remote, state.draft) {
                (Some(r), _) => self.kind.status_of(r),
                (None, DraftState::ForCreating) => Status::Creating,
                (None, _) => Status::Deleted,
            };
            state.remote = remote;
        }
        self.kind.on_remote_changed(self);
    }

    pub(crate) fn set_status(&self, status: Status) {
        self.write().status = status;
    }

    pub(crate) fn set_draft_state(&self, draft: DraftState) {
        self.write().draft = draft;
    }

    pub(crate) fn mark_deleted(&self) {
        {
            let mut state = self.write();
            state.remote = None;
            state.status = Status::Deleted;
            state.draft = DraftState::None;
        }
        self.kind.on_remote_changed(self);
    }

    /// Run a remote mutation under a transitional status.
    ///
    /// On success the returned snapshot replaces the cached one and the status
    /// is derived from it; on failure the previous status is restored.
    pub async fn do_modify<F, Fut>(&self, action: F, transitional: Status) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<R, RemoteError>>,
    {
        let previous = self.status();
        tracing::debug!("[{}]:do_modify({}) from {}", self.name, transitional, previous);
        self.set_status(transitional);
        match action().await {
            Ok(remote) => {
                self.set_remote(Some(remote));
                Ok(())
            }
            Err(e) => {
                tracing::debug!("[{}]:do_modify failed: {}", self.name, e);
                self.set_status(previous);
                Err(e.into())
            }
        }
    }

    /// Delete remotely, then drop from the owning module's cache.
    ///
    /// A resource never observed remotely is only removed locally. If the
    /// remote call fails nothing changes and the error is returned.
    pub async fn delete(&self) -> Result<()> {
        let module = self
            .module()
            .ok_or_else(|| Error::ParentGone(format!("module of {}", self.id)))?;
        tracing::debug!("[{}]:delete()", self.name);

        if self.exists() {
            let previous = self.status();
            self.set_status(Status::Deleting);
            if let Err(e) = module.delete_remote(self).await {
                self.set_status(previous);
                return Err(e);
            }
        }

        module.remove_local(&self.id, false);
        self.mark_deleted();
        Ok(())
    }

    /// Reload this resource's snapshot with a targeted remote lookup
    pub async fn refresh_remote(&self) -> Result<()> {
        let module = self
            .module()
            .ok_or_else(|| Error::ParentGone(format!("module of {}", self.id)))?;
        let remote = module.load_remote(&self.name, &self.resource_group).await?;
        tracing::debug!("[{}]:refresh_remote()->exists={}", self.name, remote.is_some());
        self.set_remote(remote);
        Ok(())
    }

    /// Invalidate every nested collection
    pub fn invalidate_cache(&self) {
        for module in &self.sub_modules {
            module.invalidate_cache();
        }
    }
}

impl<R: Clone + Send + Sync + 'static> Scope for Resource<R> {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn resource_group(&self) -> Option<String> {
        Resource::resource_group(self).map(str::to_string)
    }

    fn is_draft_for_creating(&self) -> bool {
        Resource::is_draft_for_creating(self)
    }

    fn exists(&self) -> bool {
        Resource::exists(self)
    }
}
