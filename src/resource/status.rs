//! Lifecycle status of a cached resource

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    // transitional
    Creating,
    Updating,
    Deleting,
    Starting,
    Stopping,
    Restarting,
    // settled
    Running,
    Stopped,
    Inactive,
    Failed,
    Deleted,
    Unknown,
    /// Backend-specific state with no mapping above
    Other(String),
}

impl Status {
    /// Map a backend state string (provisioning or power state) to a status
    pub fn from_remote(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "creating" | "provisioning" | "accepted" | "pending" => Self::Creating,
            "updating" => Self::Updating,
            "deleting" => Self::Deleting,
            "starting" => Self::Starting,
            "stopping" => Self::Stopping,
            "restarting" => Self::Restarting,
            "running" | "active" | "succeeded" | "ready" | "online" => Self::Running,
            "stopped" | "deallocated" | "terminated" => Self::Stopped,
            "inactive" | "disabled" => Self::Inactive,
            "failed" | "error" => Self::Failed,
            "deleted" => Self::Deleted,
            "" | "unknown" => Self::Unknown,
            _ => Self::Other(value.to_string()),
        }
    }

    /// Whether an operation is in flight
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            Self::Creating
                | Self::Updating
                | Self::Deleting
                | Self::Starting
                | Self::Stopping
                | Self::Restarting
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "Creating",
            Self::Updating => "Updating",
            Self::Deleting => "Deleting",
            Self::Starting => "Starting",
            Self::Stopping => "Stopping",
            Self::Restarting => "Restarting",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Inactive => "Inactive",
            Self::Failed => "Failed",
            Self::Deleted => "Deleted",
            Self::Unknown => "Unknown",
            Self::Other(value) => value,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
