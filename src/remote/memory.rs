//! In-memory remote
//!
//! Holds remote entities in process. Backs the CLI's fixture mode and lets
//! tests count calls, inject faults and slow responses down.

use super::{Capabilities, RemoteClient};
use crate::error::RemoteError;
use crate::resource::id::ResourceId;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type NameFn<R> = Box<dyn Fn(&R) -> String + Send + Sync>;
type GroupFn<R> = Box<dyn Fn(&R) -> Option<String> + Send + Sync>;

/// Number of calls received per operation
#[derive(Debug, Default)]
struct Calls {
    list: AtomicUsize,
    get: AtomicUsize,
    delete: AtomicUsize,
}

#[derive(Debug, Default)]
struct Faults {
    list: Option<RemoteError>,
    get: Option<RemoteError>,
    delete: Option<RemoteError>,
}

pub struct InMemoryRemote<R> {
    items: Mutex<Vec<R>>,
    capabilities: Capabilities,
    name_of: NameFn<R>,
    group_of: GroupFn<R>,
    calls: Calls,
    faults: Mutex<Faults>,
    latency: Option<Duration>,
}

impl<R> std::fmt::Debug for InMemoryRemote<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRemote")
            .field("capabilities", &self.capabilities)
            .field("calls", &self.calls)
            .finish()
    }
}

impl<R: Clone + Send + Sync + 'static> InMemoryRemote<R> {
    /// Remote supporting list, get-by-name and delete-by-id
    pub fn new<F>(items: Vec<R>, name_of: F) -> Self
    where
        F: Fn(&R) -> String + Send + Sync + 'static,
    {
        Self {
            items: Mutex::new(items),
            capabilities: Capabilities::NONE
                .with_list()
                .with_get_by_name()
                .with_delete_by_id(),
            name_of: Box::new(name_of),
            group_of: Box::new(|_| None),
            calls: Calls::default(),
            faults: Mutex::new(Faults::default()),
            latency: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_group<F>(mut self, group_of: F) -> Self
    where
        F: Fn(&R) -> Option<String> + Send + Sync + 'static,
    {
        self.group_of = Box::new(group_of);
        self
    }

    /// Delay every call, to widen race windows
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, item: R) {
        let name = (self.name_of)(&item);
        let mut items = self.lock_items();
        items.retain(|existing| !(self.name_of)(existing).eq_ignore_ascii_case(&name));
        items.push(item);
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut items = self.lock_items();
        let before = items.len();
        items.retain(|existing| !(self.name_of)(existing).eq_ignore_ascii_case(name));
        items.len() != before
    }

    pub fn replace_all(&self, items: Vec<R>) {
        *self.lock_items() = items;
    }

    pub fn items(&self) -> Vec<R> {
        self.lock_items().clone()
    }

    /// Make every list call fail with `error` (or succeed again with `None`)
    pub fn fail_list(&self, error: Option<RemoteError>) {
        self.lock_faults().list = error;
    }

    pub fn fail_get(&self, error: Option<RemoteError>) {
        self.lock_faults().get = error;
    }

    pub fn fail_delete(&self, error: Option<RemoteError>) {
        self.lock_faults().delete = error;
    }

    pub fn list_calls(&self) -> usize {
        self.calls.list.load(Ordering::SeqCst)
    }

    /// Calls to any of the single-entity getters
    pub fn get_calls(&self) -> usize {
        self.calls.get.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.calls.delete.load(Ordering::SeqCst)
    }

    fn find(&self, name: &str, resource_group: Option<&str>) -> Option<R> {
        self.lock_items()
            .iter()
            .find(|item| {
                (self.name_of)(item).eq_ignore_ascii_case(name)
                    && match (resource_group, (self.group_of)(item)) {
                        (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(&actual),
                        _ => true,
                    }
            })
            .cloned()
    }

    async fn before_call(&self, counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn lock_items(&self) -> MutexGuard<'_, Vec<R>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<R: Clone + Send + Sync + 'static> RemoteClient<R> for InMemoryRemote<R> {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn list(&self) -> Result<Vec<R>, RemoteError> {
        self.before_call(&self.calls.list).await;
        if let Some(error) = self.lock_faults().list.clone() {
            return Err(error);
        }
        Ok(self.items())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<R>, RemoteError> {
        self.before_call(&self.calls.get).await;
        if let Some(error) = self.lock_faults().get.clone() {
            return Err(error);
        }
        let Some(parsed) = ResourceId::parse(id) else {
            return Err(RemoteError::status(400, format!("malformed id {}", id)));
        };
        self.find(&parsed.name, parsed.resource_group.as_deref())
            .map(Some)
            .ok_or_else(|| RemoteError::status(404, format!("{} not found", id)))
    }

    async fn get_by_resource_group(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<Option<R>, RemoteError> {
        self.before_call(&self.calls.get).await;
        if let Some(error) = self.lock_faults().get.clone() {
            return Err(error);
        }
        self.find(name, Some(resource_group))
            .map(Some)
            .ok_or_else(|| RemoteError::status(404, format!("{} not found", name)))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<R>, RemoteError> {
        self.before_call(&self.calls.get).await;
        if let Some(error) = self.lock_faults().get.clone() {
            return Err(error);
        }
        Ok(self.find(name, None))
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), RemoteError> {
        self.before_call(&self.calls.delete).await;
        if let Some(error) = self.lock_faults().delete.clone() {
            return Err(error);
        }
        let name = ResourceId::parse(id).map(|parsed| parsed.name);
        match name {
            Some(name) if self.remove(&name) => Ok(()),
            _ => Err(RemoteError::status(404, format!("{} not found", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(names: &[&str]) -> InMemoryRemote<String> {
        InMemoryRemote::new(names.iter().map(|n| n.to_string()).collect(), |s: &String| {
            s.clone()
        })
    }

    #[tokio::test]
    async fn test_list_counts_calls() {
        let remote = remote(&["a", "b"]);
        assert_eq!(remote.list().await.unwrap().len(), 2);
        assert_eq!(remote.list_calls(), 1);
        assert_eq!(remote.get_calls(), 0);
    }

    #[tokio::test]
    async fn test_get_by_id_reports_not_found_status() {
        let remote = remote(&["a"]);
        let err = remote.get_by_id("/root/items/zzz").await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(
            remote.get_by_id("/root/items/A").await.unwrap(),
            Some("a".to_string())
        );
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let remote = remote(&["a"]);
        remote.fail_list(Some(RemoteError::status(500, "boom")));
        assert!(remote.list().await.is_err());
        remote.fail_list(None);
        assert!(remote.list().await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_removes_item() {
        let remote = remote(&["a", "b"]);
        remote.delete_by_id("/root/items/a").await.unwrap();
        assert_eq!(remote.items(), vec!["b".to_string()]);
        assert!(remote.delete_by_id("/root/items/a").await.is_err());
    }
}
