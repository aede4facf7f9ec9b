//! HTTP utilities for REST resource collections
//!
//! Lists `GET {endpoint}/{collection}` (following `nextLink` pages), gets by
//! name under the collection, and gets or deletes by full resource id
//! relative to the endpoint.

use super::{Capabilities, RemoteClient};
use crate::error::RemoteError;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use url::Url;

/// Default JSON path of the item array in a list response
const DEFAULT_ITEMS_PATH: &str = "value";
/// Default JSON field holding the next page URL
const DEFAULT_NEXT_LINK_FIELD: &str = "nextLink";
/// Hard stop for runaway pagination
const MAX_PAGES: usize = 1000;

/// HTTP client for one resource collection
#[derive(Clone)]
pub struct HttpRemoteClient<R> {
    client: Client,
    endpoint: Url,
    collection: String,
    items_path: String,
    next_link_field: String,
    token: Option<String>,
    _remote: PhantomData<fn() -> R>,
}

impl<R> std::fmt::Debug for HttpRemoteClient<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRemoteClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("collection", &self.collection)
            .field("items_path", &self.items_path)
            .finish()
    }
}

impl<R> HttpRemoteClient<R> {
    /// Create a client for `collection` under `endpoint`
    pub fn new(endpoint: &str, collection: &str) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .user_agent(concat!("cloudmirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = Url::parse(endpoint.trim_end_matches('/'))
            .map_err(|e| RemoteError::Transport(format!("Invalid endpoint {}: {}", endpoint, e)))?;

        Ok(Self {
            client,
            endpoint,
            collection: collection.trim_matches('/').to_string(),
            items_path: DEFAULT_ITEMS_PATH.to_string(),
            next_link_field: DEFAULT_NEXT_LINK_FIELD.to_string(),
            token: None,
            _remote: PhantomData,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Dot-separated path of the item array, empty when the body is the array
    pub fn with_items_path(mut self, items_path: impl Into<String>) -> Self {
        self.items_path = items_path.into();
        self
    }

    pub fn with_next_link_field(mut self, field: impl Into<String>) -> Self {
        self.next_link_field = field.into();
        self
    }

    /// Identity of the scope the collection lives under, relative to the
    /// endpoint: `/subscriptions/s1` for `subscriptions/s1/sites`. Resource ids
    /// built under this scope resolve to URLs beside the listing URL.
    pub fn scope_id(&self) -> String {
        match self.collection.rsplit_once('/') {
            Some((parent, _)) => format!("/{}", parent),
            None => String::new(),
        }
    }

    /// Last segment of the collection path
    pub fn collection_name(&self) -> &str {
        self.collection
            .rsplit_once('/')
            .map_or(self.collection.as_str(), |(_, name)| name)
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.endpoint.as_str().trim_end_matches('/'), self.collection)
    }

    fn item_url(&self, name: &str) -> String {
        format!("{}/{}", self.collection_url(), urlencoding::encode(name))
    }

    fn id_url(&self, id: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.as_str().trim_end_matches('/'),
            id.trim_start_matches('/')
        )
    }

    async fn send(&self, method: Method, url: &str) -> Result<Value, RemoteError> {
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Transport(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let error = RemoteError::status(status.as_u16(), &body);
            // Security: only the sanitized/truncated body ends up in the log
            tracing::debug!("API error: {}", error);
            return Err(error);
        }

        // Handle empty response
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body)
            .map_err(|e| RemoteError::Decode(format!("Failed to parse response JSON: {}", e)))
    }
}

impl<R: DeserializeOwned> HttpRemoteClient<R> {
    fn decode(value: Value) -> Result<R, RemoteError> {
        serde_json::from_value(value).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn get_one(&self, url: &str) -> Result<Option<R>, RemoteError> {
        match self.send(Method::GET, url).await? {
            Value::Null => Ok(None),
            value => Self::decode(value).map(Some),
        }
    }
}

#[async_trait]
impl<R> RemoteClient<R> for HttpRemoteClient<R>
where
    R: DeserializeOwned + Send + Sync + 'static,
{
    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .with_list()
            .with_get_by_id()
            .with_get_by_name()
            .with_delete_by_id()
    }

    async fn list(&self) -> Result<Vec<R>, RemoteError> {
        let mut all_items = Vec::new();
        let mut next = Some(self.collection_url());
        let mut pages = 0;

        while let Some(url) = next.take() {
            let response = self.send(Method::GET, &url).await?;
            for item in extract_items(&response, &self.items_path) {
                all_items.push(Self::decode(item)?);
            }

            pages += 1;
            if pages >= MAX_PAGES {
                tracing::warn!("stopping pagination of {} after {} pages", self.collection, pages);
                break;
            }
            next = response
                .get(&self.next_link_field)
                .and_then(Value::as_str)
                .filter(|link| !link.is_empty())
                .map(str::to_string);
        }

        Ok(all_items)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<R>, RemoteError> {
        self.get_one(&self.id_url(id)).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<R>, RemoteError> {
        self.get_one(&self.item_url(name)).await
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), RemoteError> {
        self.send(Method::DELETE, &self.id_url(id)).await.map(|_| ())
    }
}

/// Extract the item array from a response using a dot-separated path
pub fn extract_items(response: &Value, path: &str) -> Vec<Value> {
    if path.is_empty() {
        return response.as_array().cloned().unwrap_or_default();
    }

    let mut current = response;
    for part in path.split('.') {
        current = match current.get(part) {
            Some(v) => v,
            None => return vec![],
        };
    }

    current.as_array().cloned().unwrap_or_default()
}
