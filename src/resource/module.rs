//! Modules: lazily synchronized collections of remote resources
//!
//! A [`Module`] owns the cache of one named collection under a parent scope.
//! Reads are served from the cache until it goes stale; the next `list()`
//! then reloads the whole collection, reconciles it against the cache and
//! schedules one debounced children-changed notification for the batch.
//!
//! Cache entries are `Option<Arc<Resource>>`: `None` records a name that was
//! looked up and confirmed absent, so repeated lookups stay local.

use super::draft::{Draft, ResourceOrDraft};
use super::entity::{DraftState, Resource};
use super::id::{self, ResourceId, RESOURCE_GROUP_PLACEHOLDER};
use super::kind::{GroupPolicy, ResourceKind};
use super::reconcile::{reconcile, Reconciliation};
use super::scope::Scope;
use super::status::Status;
use crate::config::CacheOptions;
use crate::debounce::TailingDebouncer;
use crate::error::{Error, Result};
use crate::notification::{
    ErrorReporter, EventKind, EventSource, Notification, NotificationSink, NullSink,
    TracingReporter,
};
use crate::remote::{Capabilities, RemoteClient};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

const NOT_SYNCED: i64 = -1;
const SYNC_IN_PROGRESS: i64 = 0;

type Cache<R> = HashMap<String, Option<Arc<Resource<R>>>>;

/// Collaborators shared by every module of a resource tree
#[derive(Clone)]
pub struct SyncContext {
    pub events: Arc<dyn NotificationSink>,
    pub errors: Arc<dyn ErrorReporter>,
    pub options: CacheOptions,
}

impl Default for SyncContext {
    fn default() -> Self {
        Self {
            events: Arc::new(NullSink),
            errors: Arc::new(TracingReporter),
            options: CacheOptions::default(),
        }
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SyncContext {
    pub fn new(
        events: Arc<dyn NotificationSink>,
        errors: Arc<dyn ErrorReporter>,
        options: CacheOptions,
    ) -> Self {
        Self {
            events,
            errors,
            options,
        }
    }

    pub fn with_options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    fn emit(&self, kind: EventKind, source: EventSource) {
        self.events.emit(Notification::new(kind, source));
    }
}

/// Where a module stands in its reload cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    NotSynced,
    InProgress,
    Synced(DateTime<Utc>),
}

/// Type-erased view of a module, used for nested collections
pub trait AnyModule: Send + Sync {
    fn name(&self) -> &str;

    fn type_name(&self) -> String;

    /// Mark stale and announce it; the next read reloads
    fn refresh(&self);

    /// Drop every cached entry
    fn clear(&self);

    fn invalidate_cache(&self);

    /// Number of cached resources, sentinels excluded
    fn cached_len(&self) -> usize;

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Cache and synchronization manager for one collection of remote `R`s
pub struct Module<R> {
    name: String,
    parent: Weak<dyn Scope>,
    kind: Arc<dyn ResourceKind<R>>,
    client: Arc<dyn RemoteClient<R>>,
    capabilities: Capabilities,
    context: SyncContext,
    resources: RwLock<Cache<R>>,
    /// -1 not synced, 0 reload in progress, otherwise epoch millis of the last reload
    sync_time: AtomicI64,
    /// Bumped whenever a reload attempt finishes, successful or not
    reload_generation: AtomicU64,
    reload_gate: tokio::sync::Mutex<()>,
    debouncer: TailingDebouncer,
}

impl<R> std::fmt::Debug for Module<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("sync_time", &self.sync_time.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<R: Clone + Send + Sync + 'static> Module<R> {
    /// Build a module under `parent`. Client capabilities are read once here.
    pub fn new(
        name: impl Into<String>,
        parent: Weak<dyn Scope>,
        kind: Arc<dyn ResourceKind<R>>,
        client: Arc<dyn RemoteClient<R>>,
        context: SyncContext,
    ) -> Arc<Self> {
        let name = name.into();
        let capabilities = client.capabilities();
        tracing::debug!("[{}]:new() capabilities={:?}", name, capabilities);

        Arc::new_cyclic(|me: &Weak<Self>| {
            let me = me.clone();
            let debouncer = TailingDebouncer::new(
                context.options.debounce_delay,
                context.options.debounce_max_wait,
                move || {
                    if let Some(module) = me.upgrade() {
                        module.fire_children_changed();
                    }
                },
            );
            Self {
                name,
                parent,
                kind,
                client,
                capabilities,
                context,
                resources: RwLock::new(HashMap::new()),
                sync_time: AtomicI64::new(NOT_SYNCED),
                reload_generation: AtomicU64::new(0),
                reload_gate: tokio::sync::Mutex::new(()),
                debouncer,
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> String {
        self.kind.type_name().to_string()
    }

    pub fn parent(&self) -> Option<Arc<dyn Scope>> {
        self.parent.upgrade()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub(crate) fn kind(&self) -> Arc<dyn ResourceKind<R>> {
        Arc::clone(&self.kind)
    }

    pub(crate) fn context(&self) -> &SyncContext {
        &self.context
    }

    pub fn sync_state(&self) -> SyncState {
        match self.sync_time.load(Ordering::SeqCst) {
            SYNC_IN_PROGRESS => SyncState::InProgress,
            t if t < 0 => SyncState::NotSynced,
            t => DateTime::from_timestamp_millis(t).map_or(SyncState::NotSynced, SyncState::Synced),
        }
    }

    /// Whether the next `list()` reloads from the remote
    pub fn is_stale(&self) -> bool {
        let t = self.sync_time.load(Ordering::SeqCst);
        let lifetime = i64::try_from(self.context.options.cache_lifetime.as_millis())
            .unwrap_or(i64::MAX);
        t <= 0 || Utc::now().timestamp_millis().saturating_sub(t) > lifetime
    }

    // ------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------

    /// All resources of the collection, sorted by name.
    ///
    /// Reloads first when the cache is stale. A failed reload is reported to
    /// the error reporter and the previous cache is returned.
    pub async fn list(self: &Arc<Self>) -> Vec<Arc<Resource<R>>> {
        tracing::debug!("[{}]:list()", self.name);
        if !self.parent_can_have_children() {
            tracing::debug!("[{}]:list()->parent is a draft or does not exist", self.name);
            return Vec::new();
        }
        if !self.capabilities.list {
            tracing::debug!("[{}]:list()->client cannot list, serving cache", self.name);
            return self.list_cached();
        }
        if self.is_stale() {
            self.reload().await;
        }
        self.list_cached()
    }

    /// Current cache contents sorted by name, no remote call
    pub fn list_cached(&self) -> Vec<Arc<Resource<R>>> {
        let mut resources: Vec<_> = self.read().values().flatten().cloned().collect();
        resources.sort_by(|a, b| a.name().cmp(b.name()));
        resources
    }

    pub async fn list_by_resource_group(
        self: &Arc<Self>,
        resource_group: &str,
    ) -> Vec<Arc<Resource<R>>> {
        tracing::debug!("[{}]:list_by_resource_group({})", self.name, resource_group);
        self.list()
            .await
            .into_iter()
            .filter(|r| {
                r.resource_group()
                    .is_some_and(|rg| rg.eq_ignore_ascii_case(resource_group))
            })
            .collect()
    }

    /// Reload under the gate. Callers arriving while a reload runs wait for
    /// it and reuse its outcome instead of issuing another listing.
    async fn reload(self: &Arc<Self>) {
        let generation = self.reload_generation.load(Ordering::SeqCst);
        let _gate = self.reload_gate.lock().await;
        if self.reload_generation.load(Ordering::SeqCst) != generation || !self.is_stale() {
            tracing::debug!("[{}]:reload()->served by a concurrent reload", self.name);
            return;
        }

        self.sync_time.store(SYNC_IN_PROGRESS, Ordering::SeqCst);
        tracing::debug!("[{}]:reload()->client.list()", self.name);

        let outcome = match self.client.list().await {
            Ok(remotes) => Ok(remotes),
            Err(e) if self.kind.is_not_found(&e) => {
                tracing::debug!(
                    "[{}]:reload()->collection not found, treating as empty",
                    self.name
                );
                Ok(Vec::new())
            }
            Err(e) => Err(Error::from(e)),
        };

        match outcome {
            Ok(remotes) => {
                let diff = self.apply(remotes);
                tracing::debug!(
                    "[{}]:reload()->added={:?} deleted={:?} refreshed={}",
                    self.name,
                    diff.added,
                    diff.deleted,
                    diff.refreshed.len()
                );
                let _ = self.sync_time.compare_exchange(
                    SYNC_IN_PROGRESS,
                    Utc::now().timestamp_millis(),
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
                self.debouncer.debounce();
            }
            Err(e) => {
                tracing::warn!("[{}]:reload() failed, keeping cache: {}", self.name, e);
                let _ = self.sync_time.compare_exchange(
                    SYNC_IN_PROGRESS,
                    NOT_SYNCED,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
                self.context.errors.report(&e);
            }
        }
        self.reload_generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Reconcile a full listing into the cache.
    ///
    /// Membership changes land in one write-locked section. Snapshots of
    /// refreshed resources are replaced right after, outside the lock.
    fn apply(self: &Arc<Self>, remotes: Vec<R>) -> Reconciliation {
        let mut incoming: HashMap<String, (String, String, R)> = HashMap::new();
        for remote in remotes {
            let name = self.kind.name_of(&remote);
            let group = self.group_of_remote(&name, &remote);
            let key = id::cache_key(&self.to_resource_id(&name, &group));
            incoming.insert(key, (name, group, remote));
        }
        let remote_keys: HashSet<String> = incoming.keys().cloned().collect();

        let (diff, refreshed) = {
            let cache = self.read();
            let mut local = HashSet::new();
            let mut creating = HashSet::new();
            for (key, resource) in cache.iter() {
                if let Some(resource) = resource {
                    local.insert(key.clone());
                    if resource.is_draft_for_creating() {
                        creating.insert(key.clone());
                    }
                }
            }
            let diff = reconcile(&local, &creating, &remote_keys);
            let refreshed: Vec<(String, Arc<Resource<R>>)> = diff
                .refreshed
                .iter()
                .filter_map(|key| cache.get(key).cloned().flatten().map(|r| (key.clone(), r)))
                .collect();
            (diff, refreshed)
        };

        let mut added = Vec::with_capacity(diff.added.len());
        for key in &diff.added {
            if let Some((name, group, remote)) = incoming.remove(key) {
                let id = self.to_resource_id(&name, &group);
                let resource = Resource::new(self, id, &name, &group, DraftState::None);
                resource.set_remote(Some(remote));
                added.push((key.clone(), resource));
            }
        }

        let mut deleted = Vec::new();
        let mut late = Vec::new();
        {
            let mut cache = self.write();
            for key in &diff.deleted {
                let pending = matches!(cache.get(key), Some(Some(r)) if r.is_draft_for_creating());
                if !pending {
                    if let Some(Some(resource)) = cache.remove(key) {
                        deleted.push(resource);
                    }
                }
            }
            for (key, resource) in added {
                match cache.get(&key) {
                    // inserted by a concurrent get() since the diff was taken
                    Some(Some(existing)) => late.push((key, Arc::clone(existing))),
                    _ => {
                        cache.insert(key, Some(resource));
                    }
                }
            }
        }

        for (key, resource) in refreshed.into_iter().chain(late) {
            if let Some((_, _, remote)) = incoming.remove(&key) {
                resource.set_remote(Some(remote));
            }
        }
        for resource in deleted {
            resource.mark_deleted();
        }

        diff
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Look up one resource, from the cache or with a single targeted remote call.
    ///
    /// Not-found answers are cached as absent; other remote faults are returned.
    pub async fn get(
        self: &Arc<Self>,
        name: &str,
        resource_group: Option<&str>,
    ) -> Result<Option<Arc<Resource<R>>>> {
        let group = self.normalize_resource_group(name, resource_group)?;
        let id = self.to_resource_id(name, &group);
        let key = id::cache_key(&id);

        let cached = self.read().get(&key).cloned();
        if let Some(entry) = cached {
            tracing::trace!("[{}]:get({})->cache hit", self.name, id);
            return Ok(entry);
        }
        if !self.parent_can_have_children() {
            tracing::debug!("[{}]:get({})->parent is a draft or does not exist", self.name, id);
            return Ok(None);
        }

        tracing::debug!("[{}]:get({}, {})->load_remote()", self.name, name, group);
        match self.load_remote(name, &group).await? {
            Some(remote) => {
                let resource = Resource::new(self, id, name, &group, DraftState::None);
                resource.set_remote(Some(remote));
                Ok(Some(self.add_local(key, resource, false)))
            }
            None => {
                tracing::debug!("[{}]:get({})->confirmed absent", self.name, id);
                self.write().entry(key).or_insert(None);
                Ok(None)
            }
        }
    }

    /// Look up a resource by its full identity
    pub async fn get_by_id(
        self: &Arc<Self>,
        resource_id: &str,
    ) -> Result<Option<Arc<Resource<R>>>> {
        let parsed = ResourceId::parse(resource_id).ok_or_else(|| {
            Error::InvalidArgument(format!("malformed resource id \"{}\"", resource_id))
        })?;
        if !parsed.module.eq_ignore_ascii_case(&self.name) {
            return Err(Error::InvalidArgument(format!(
                "\"{}\" does not belong to {}",
                resource_id, self.name
            )));
        }
        self.get(&parsed.name, parsed.resource_group.as_deref()).await
    }

    pub async fn exists(
        self: &Arc<Self>,
        name: &str,
        resource_group: Option<&str>,
    ) -> Result<bool> {
        Ok(self
            .get(name, resource_group)
            .await?
            .is_some_and(|resource| resource.exists()))
    }

    /// Cached resource, or a bare placeholder inserted without any remote call
    pub fn get_or_init(
        self: &Arc<Self>,
        name: &str,
        resource_group: Option<&str>,
    ) -> Result<Arc<Resource<R>>> {
        let group = self.normalize_resource_group(name, resource_group)?;
        let id = self.to_resource_id(name, &group);
        let key = id::cache_key(&id);
        if let Some(Some(resource)) = self.read().get(&key) {
            return Ok(Arc::clone(resource));
        }
        tracing::debug!("[{}]:get_or_init({})->add_local()", self.name, id);
        let resource = Resource::new(self, id, name, &group, DraftState::None);
        Ok(self.add_local(key, resource, false))
    }

    /// Fetch a single remote object: by id, by group and name, by name, or
    /// as a last resort by listing and filtering.
    pub(crate) async fn load_remote(&self, name: &str, resource_group: &str) -> Result<Option<R>> {
        let caps = self.capabilities;
        let result = if caps.get_by_id {
            self.client.get_by_id(&self.to_resource_id(name, resource_group)).await
        } else if caps.get_by_resource_group && !id::is_unscoped(Some(resource_group)) {
            self.client.get_by_resource_group(resource_group, name).await
        } else if caps.get_by_name {
            self.client.get_by_name(name).await
        } else if caps.list {
            tracing::debug!("[{}]:load_remote({})->list and filter", self.name, name);
            self.client.list().await.map(|items| {
                items.into_iter().find(|item| {
                    self.kind.name_of(item).eq_ignore_ascii_case(name)
                        && (id::is_unscoped(Some(resource_group))
                            || self
                                .kind
                                .resource_group_of(item)
                                .map_or(true, |rg| rg.eq_ignore_ascii_case(resource_group)))
                })
            })
        } else {
            return Err(self.unsupported("get"));
        };

        match result {
            Ok(remote) => Ok(remote),
            Err(e) if self.kind.is_not_found(&e) => {
                tracing::debug!("[{}]:load_remote({})->not found: {}", self.name, name, e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    // ------------------------------------------------------------------
    // Drafts and mutations
    // ------------------------------------------------------------------

    pub fn new_draft_for_create(
        &self,
        name: &str,
        resource_group: Option<&str>,
    ) -> Result<Box<dyn Draft<R>>> {
        let group = self.normalize_resource_group(name, resource_group)?;
        self.kind
            .new_draft_for_create(name, &group)
            .ok_or_else(|| self.unsupported("create"))
    }

    pub fn new_draft_for_update(&self, resource: &Resource<R>) -> Result<Box<dyn Draft<R>>> {
        self.kind
            .new_draft_for_update(resource)
            .ok_or_else(|| self.unsupported("update"))
    }

    /// The resource if it is known, otherwise a create draft for it
    pub async fn get_or_draft(
        self: &Arc<Self>,
        name: &str,
        resource_group: Option<&str>,
    ) -> Result<ResourceOrDraft<R>> {
        tracing::debug!("[{}]:get_or_draft({})", self.name, name);
        match self.get(name, resource_group).await? {
            Some(resource) => Ok(ResourceOrDraft::Resource(resource)),
            None => Ok(ResourceOrDraft::Draft(self.new_draft_for_create(name, resource_group)?)),
        }
    }

    /// An update draft when the resource exists remotely, a create draft otherwise
    pub async fn update_or_create(
        self: &Arc<Self>,
        name: &str,
        resource_group: Option<&str>,
    ) -> Result<Box<dyn Draft<R>>> {
        tracing::debug!("[{}]:update_or_create({})", self.name, name);
        match self.get(name, resource_group).await? {
            Some(resource) if resource.exists() => self.new_draft_for_update(&resource),
            _ => self.new_draft_for_create(name, resource_group),
        }
    }

    /// Create the draft's resource remotely.
    ///
    /// A placeholder with status `Creating` is visible in the cache while the
    /// remote call runs and is removed again if it fails. The existence check
    /// and the placeholder insert happen under one write lock, so concurrent
    /// creates of the same name see each other.
    pub async fn create(self: &Arc<Self>, draft: &dyn Draft<R>) -> Result<Arc<Resource<R>>> {
        let name = draft.name();
        tracing::debug!("[{}]:create(draft:{})", self.name, name);

        // settles the cache entry (resource or sentinel) for this name
        self.get(name, draft.resource_group()).await?;

        let group = self.normalize_resource_group(name, draft.resource_group())?;
        let id = self.to_resource_id(name, &group);
        let key = id::cache_key(&id);
        let fresh = Resource::new(self, id, name, &group, DraftState::ForCreating);

        let resource = {
            let mut cache = self.write();
            match cache.get(&key) {
                Some(Some(existing)) if existing.exists() || existing.is_draft_for_creating() => {
                    return Err(Error::AlreadyExists {
                        name: name.to_string(),
                    });
                }
                Some(Some(placeholder)) => {
                    let placeholder = Arc::clone(placeholder);
                    placeholder.set_draft_state(DraftState::ForCreating);
                    placeholder.set_status(Status::Creating);
                    placeholder
                }
                // nothing cached, or a confirmed-absent sentinel
                _ => {
                    cache.insert(key.clone(), Some(Arc::clone(&fresh)));
                    fresh
                }
            }
        };
        tracing::debug!("[{}]:create->placeholder {}", self.name, resource.id());
        self.debouncer.debounce();

        match resource
            .do_modify(|| draft.create_remote(), Status::Creating)
            .await
        {
            Ok(()) => {
                resource.set_draft_state(DraftState::None);
                Ok(resource)
            }
            Err(e) => {
                tracing::debug!("[{}]:create({}) failed, removing placeholder", self.name, name);
                self.remove_if_same(&key, &resource);
                resource.mark_deleted();
                Err(e)
            }
        }
    }

    /// Apply an update draft to an existing resource
    pub async fn update(self: &Arc<Self>, draft: &dyn Draft<R>) -> Result<Arc<Resource<R>>> {
        let name = draft.name();
        tracing::debug!("[{}]:update(draft:{})", self.name, name);

        let resource = self.get(name, draft.resource_group()).await?;
        let target = resource.and_then(|r| r.remote().map(|current| (r, current)));
        let Some((resource, current)) = target else {
            return Err(Error::DoesNotExist {
                name: name.to_string(),
            });
        };

        resource.set_draft_state(DraftState::ForUpdating);
        let result = resource
            .do_modify(|| draft.update_remote(&current), Status::Updating)
            .await;
        resource.set_draft_state(DraftState::None);
        result.map(|()| resource)
    }

    pub async fn delete(self: &Arc<Self>, name: &str, resource_group: Option<&str>) -> Result<()> {
        tracing::debug!("[{}]:delete({})", self.name, name);
        match self.get(name, resource_group).await? {
            Some(resource) => resource.delete().await,
            None => Err(Error::DoesNotExist {
                name: name.to_string(),
            }),
        }
    }

    pub(crate) async fn delete_remote(&self, resource: &Resource<R>) -> Result<()> {
        if !self.capabilities.delete_by_id {
            return Err(self.unsupported("delete"));
        }
        tracing::debug!("[{}]:delete_remote({})", self.name, resource.id());
        self.client.delete_by_id(resource.id()).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------

    /// Mark stale (emptying the cache for kinds that ask for it) and announce it
    pub fn refresh(&self) {
        tracing::debug!("[{}]:refresh()", self.name);
        if self.kind.clear_on_refresh() {
            self.clear();
        } else {
            self.invalidate_cache();
        }
        self.context.emit(
            EventKind::ModuleRefreshed,
            EventSource::module(&self.name, self.parent_id()),
        );
    }

    /// Drop every entry, e.g. when the parent's scope changed
    pub fn clear(&self) {
        tracing::debug!("[{}]:clear()", self.name);
        self.sync_time.store(NOT_SYNCED, Ordering::SeqCst);
        self.write().clear();
    }

    /// Mark stale, forget absence sentinels and invalidate nested modules
    pub fn invalidate_cache(&self) {
        tracing::debug!("[{}]:invalidate_cache()", self.name);
        self.sync_time.store(NOT_SYNCED, Ordering::SeqCst);
        let cached: Vec<Arc<Resource<R>>> = {
            let mut cache = self.write();
            cache.retain(|_, entry| entry.is_some());
            cache.values().flatten().cloned().collect()
        };
        for resource in cached {
            resource.invalidate_cache();
        }
    }

    // ------------------------------------------------------------------
    // Local cache
    // ------------------------------------------------------------------

    /// Insert unless a resource is already cached under `key`; returns the cached one
    fn add_local(&self, key: String, resource: Arc<Resource<R>>, silent: bool) -> Arc<Resource<R>> {
        let cached = {
            let mut cache = self.write();
            match cache.get(&key) {
                Some(Some(existing)) => return Arc::clone(existing),
                _ => {
                    cache.insert(key, Some(Arc::clone(&resource)));
                    resource
                }
            }
        };
        if !silent {
            self.debouncer.debounce();
        }
        cached
    }

    pub(crate) fn remove_local(&self, id: &str, silent: bool) {
        tracing::debug!("[{}]:remove_local({})", self.name, id);
        let removed = self.write().remove(&id::cache_key(id)).is_some();
        if removed && !silent {
            self.debouncer.debounce();
        }
    }

    /// Remove the entry under `key` only while it is still `resource`
    fn remove_if_same(&self, key: &str, resource: &Arc<Resource<R>>) {
        let removed = {
            let mut cache = self.write();
            match cache.get(key) {
                Some(Some(cached)) if Arc::ptr_eq(cached, resource) => cache.remove(key).is_some(),
                _ => false,
            }
        };
        if removed {
            self.debouncer.debounce();
        } else {
            tracing::debug!(
                "[{}]:remove_if_same({})->entry was replaced, keeping it",
                self.name,
                key
            );
        }
    }

    fn fire_children_changed(&self) {
        tracing::debug!("[{}]:fire_children_changed()", self.name);
        if let Some(parent) = self.parent.upgrade() {
            if parent.is_service() {
                self.context.emit(
                    EventKind::ServiceChildrenChanged,
                    EventSource::resource(parent.id()),
                );
            }
            self.context.emit(
                EventKind::ResourceChildrenChanged,
                EventSource::resource(parent.id()),
            );
        }
        self.context.emit(
            EventKind::ModuleChildrenChanged,
            EventSource::module(&self.name, self.parent_id()),
        );
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Identity of `name` in this module; the group falls back to the parent's
    pub fn to_resource_id(&self, name: &str, resource_group: &str) -> String {
        let parent_group = self.parent.upgrade().and_then(|p| p.resource_group());
        let group = id::first_scoped(&[Some(resource_group), parent_group.as_deref()])
            .unwrap_or(RESOURCE_GROUP_PLACEHOLDER);
        id::format_id(&self.parent_id(), &self.name, name, group)
    }

    /// Resolve the resource group of a lookup according to the kind's policy
    pub fn normalize_resource_group(
        &self,
        name: &str,
        resource_group: Option<&str>,
    ) -> Result<String> {
        let policy = self.kind.group_policy();
        if policy == GroupPolicy::SelfNamed {
            return Ok(name.to_string());
        }

        let parent_group = self.parent.upgrade().and_then(|p| p.resource_group());
        let resolved = id::first_scoped(&[resource_group, parent_group.as_deref()]);

        match (resolved, policy) {
            (Some(rg), _) => Ok(rg.to_string()),
            (None, GroupPolicy::Required) => Err(Error::InvalidArgument(format!(
                "a resource group is required for {} \"{}\"",
                self.kind.type_name(),
                name
            ))),
            (None, _) => Ok(RESOURCE_GROUP_PLACEHOLDER.to_string()),
        }
    }

    fn group_of_remote(&self, name: &str, remote: &R) -> String {
        let reported = self.kind.resource_group_of(remote);
        self.normalize_resource_group(name, reported.as_deref())
            .unwrap_or_else(|_| RESOURCE_GROUP_PLACEHOLDER.to_string())
    }

    fn parent_id(&self) -> String {
        self.parent.upgrade().map(|p| p.id()).unwrap_or_default()
    }

    fn parent_can_have_children(&self) -> bool {
        self.parent
            .upgrade()
            .is_some_and(|p| p.exists() && !p.is_draft_for_creating())
    }

    fn unsupported(&self, operation: &'static str) -> Error {
        Error::Unsupported {
            operation,
            type_name: self.kind.type_name().to_string(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Cache<R>> {
        self.resources.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Cache<R>> {
        self.resources.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: Clone + Send + Sync + 'static> AnyModule for Module<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> String {
        Module::type_name(self)
    }

    fn refresh(&self) {
        Module::refresh(self)
    }

    fn clear(&self) {
        Module::clear(self)
    }

    fn invalidate_cache(&self) {
        Module::invalidate_cache(self)
    }

    fn cached_len(&self) -> usize {
        self.read().values().flatten().count()
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
