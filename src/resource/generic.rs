//! JSON-driven resource kind
//!
//! [`GenericKind`] handles arbitrary REST collections whose items are plain
//! JSON objects. Names, groups and states are read through dot-separated
//! field paths, so a new collection only needs configuration.

use super::entity::Resource;
use super::id::ResourceId;
use super::kind::{GroupPolicy, ResourceKind};
use super::status::Status;
use serde_json::Value;

/// Paths tried, in order, to find the backend state of an item
const DEFAULT_STATUS_PATHS: &[&str] = &["properties.provisioningState", "status", "state"];

#[derive(Debug, Clone)]
pub struct GenericKind {
    type_name: String,
    name_path: String,
    group_path: Option<String>,
    status_paths: Vec<String>,
    group_policy: GroupPolicy,
    not_found_status: u16,
    clear_on_refresh: bool,
}

impl Default for GenericKind {
    fn default() -> Self {
        Self::new("Resource")
    }
}

impl GenericKind {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name_path: "name".to_string(),
            group_path: Some("resourceGroup".to_string()),
            status_paths: DEFAULT_STATUS_PATHS.iter().map(|p| p.to_string()).collect(),
            group_policy: GroupPolicy::Global,
            not_found_status: 404,
            clear_on_refresh: false,
        }
    }

    pub fn with_name_path(mut self, path: impl Into<String>) -> Self {
        self.name_path = path.into();
        self
    }

    /// Path of the resource group field, `None` to derive it from the `id` field
    pub fn with_group_path(mut self, path: Option<String>) -> Self {
        self.group_path = path;
        self
    }

    pub fn with_status_paths(mut self, paths: Vec<String>) -> Self {
        self.status_paths = paths;
        self
    }

    pub fn with_group_policy(mut self, policy: GroupPolicy) -> Self {
        self.group_policy = policy;
        self
    }

    /// Some backends answer 403 instead of 404 for missing items
    pub fn with_not_found_status(mut self, status: u16) -> Self {
        self.not_found_status = status;
        self
    }

    pub fn with_clear_on_refresh(mut self, clear: bool) -> Self {
        self.clear_on_refresh = clear;
        self
    }
}

/// Look up a dot-separated path; numeric segments index arrays
pub fn field<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(item, |current, part| match part.parse::<usize>() {
        Ok(idx) => current.get(idx),
        Err(_) => current.get(part),
    })
}

/// String rendering of a scalar field, `None` when missing or null
pub fn field_str(item: &Value, path: &str) -> Option<String> {
    match field(item, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

impl ResourceKind<Value> for GenericKind {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn name_of(&self, remote: &Value) -> String {
        field_str(remote, &self.name_path).unwrap_or_default()
    }

    fn resource_group_of(&self, remote: &Value) -> Option<String> {
        match self.group_path {
            Some(ref path) => field_str(remote, path),
            None => field_str(remote, "id")
                .and_then(|id| ResourceId::parse(&id))
                .and_then(|id| id.resource_group),
        }
    }

    fn status_of(&self, remote: &Value) -> Status {
        self.status_paths
            .iter()
            .find_map(|path| field_str(remote, path))
            .map(|state| Status::from_remote(&state))
            // an item without any state field is simply there
            .unwrap_or(Status::Running)
    }

    fn group_policy(&self) -> GroupPolicy {
        self.group_policy
    }

    fn not_found_status(&self) -> u16 {
        self.not_found_status
    }

    fn clear_on_refresh(&self) -> bool {
        self.clear_on_refresh
    }

    fn on_remote_changed(&self, resource: &Resource<Value>) {
        tracing::trace!("[{}] snapshot now {}", resource.id(), resource.status());
    }
}
