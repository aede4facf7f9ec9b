//! Remote client boundary
//!
//! A [`RemoteClient`] speaks whatever protocol a resource type needs. It
//! declares up front which operations it supports through [`Capabilities`];
//! modules read that record once at construction and never call an operation
//! the client did not declare.
//!
//! - [`http`] - REST client over reqwest
//! - [`memory`] - in-process remote, used for fixtures and tests

pub mod http;
pub mod memory;

use crate::error::RemoteError;
use async_trait::async_trait;

pub use http::HttpRemoteClient;
pub use memory::InMemoryRemote;

/// Operations a remote client supports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub list: bool,
    pub get_by_id: bool,
    pub get_by_resource_group: bool,
    pub get_by_name: bool,
    pub delete_by_id: bool,
}

impl Capabilities {
    /// No capabilities at all
    pub const NONE: Self = Self {
        list: false,
        get_by_id: false,
        get_by_resource_group: false,
        get_by_name: false,
        delete_by_id: false,
    };

    /// Every capability
    pub const ALL: Self = Self {
        list: true,
        get_by_id: true,
        get_by_resource_group: true,
        get_by_name: true,
        delete_by_id: true,
    };

    pub fn with_list(mut self) -> Self {
        self.list = true;
        self
    }

    pub fn with_get_by_id(mut self) -> Self {
        self.get_by_id = true;
        self
    }

    pub fn with_get_by_resource_group(mut self) -> Self {
        self.get_by_resource_group = true;
        self
    }

    pub fn with_get_by_name(mut self) -> Self {
        self.get_by_name = true;
        self
    }

    pub fn with_delete_by_id(mut self) -> Self {
        self.delete_by_id = true;
        self
    }
}

/// Resource-type specific access to remote entities of type `R`
///
/// Every operation has a default body returning [`RemoteError::Unsupported`];
/// implementors override what they declare in [`RemoteClient::capabilities`].
/// `Ok(None)` from a getter means "absent" for clients that can tell without
/// an error; clients may equally return a not-found status error.
#[async_trait]
pub trait RemoteClient<R>: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    async fn list(&self) -> Result<Vec<R>, RemoteError> {
        Err(RemoteError::Unsupported("list"))
    }

    async fn get_by_id(&self, _id: &str) -> Result<Option<R>, RemoteError> {
        Err(RemoteError::Unsupported("get_by_id"))
    }

    async fn get_by_resource_group(
        &self,
        _resource_group: &str,
        _name: &str,
    ) -> Result<Option<R>, RemoteError> {
        Err(RemoteError::Unsupported("get_by_resource_group"))
    }

    async fn get_by_name(&self, _name: &str) -> Result<Option<R>, RemoteError> {
        Err(RemoteError::Unsupported("get_by_name"))
    }

    async fn delete_by_id(&self, _id: &str) -> Result<(), RemoteError> {
        Err(RemoteError::Unsupported("delete_by_id"))
    }
}
