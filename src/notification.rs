//! Notification System
//!
//! Change notifications emitted by modules (fire-and-forget), the sinks that
//! receive them, and the error reporters that surface unrecovered faults.

use crate::error::Error;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Kind of change being announced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A module's cache was invalidated
    ModuleRefreshed,
    /// A module's set of children changed
    ModuleChildrenChanged,
    /// A resource's nested collections changed
    ResourceChildrenChanged,
    /// A service's top-level collections changed
    ServiceChildrenChanged,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModuleRefreshed => "module.refreshed",
            Self::ModuleChildrenChanged => "module.childrenChanged",
            Self::ResourceChildrenChanged => "resource.childrenChanged",
            Self::ServiceChildrenChanged => "service.childrenChanged",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What emitted a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    Module { name: String, parent_id: String },
    Resource { id: String },
}

impl EventSource {
    pub fn module(name: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self::Module {
            name: name.into(),
            parent_id: parent_id.into(),
        }
    }

    pub fn resource(id: impl Into<String>) -> Self {
        Self::Resource { id: id.into() }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module { name, parent_id } => write!(f, "{}/{}", parent_id, name),
            Self::Resource { id } => f.write_str(id),
        }
    }
}

/// A single notification
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub kind: EventKind,
    pub source: EventSource,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: EventKind, source: EventSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            source,
            created_at: Utc::now(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.created_at.format("%H:%M:%S%.3f"),
            self.kind,
            self.source
        )
    }
}

/// Receives notifications. Delivery is fire-and-forget.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, notification: Notification);
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn emit(&self, _notification: Notification) {}
}

/// Bounded notification history (recent first)
#[derive(Debug)]
pub struct NotificationLog {
    notifications: Mutex<VecDeque<Notification>>,
    max_history: usize,
}

impl Default for NotificationLog {
    fn default() -> Self {
        Self::new(50)
    }
}

impl NotificationLog {
    pub fn new(max_history: usize) -> Self {
        Self {
            notifications: Mutex::new(VecDeque::new()),
            max_history: max_history.max(1),
        }
    }

    /// Snapshot of the history, most recent first
    pub fn recent(&self) -> Vec<Notification> {
        self.lock().iter().cloned().collect()
    }

    /// Remove and return everything, oldest first
    pub fn drain(&self) -> Vec<Notification> {
        self.lock().drain(..).rev().collect()
    }

    /// Count of recorded notifications of a given kind
    pub fn count(&self, kind: EventKind) -> usize {
        self.lock().iter().filter(|n| n.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Notification>> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotificationSink for NotificationLog {
    fn emit(&self, notification: Notification) {
        tracing::trace!("notification: {}", notification);
        let mut notifications = self.lock();
        notifications.push_front(notification);
        notifications.truncate(self.max_history);
    }
}

/// Sink that fans notifications out to live subscribers
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn emit(&self, notification: Notification) {
        // No subscribers is not an error for a fire-and-forget sink
        let _ = self.sender.send(notification);
    }
}

/// Receives unrecovered errors for user-facing display
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &Error);
}

/// Reporter that writes errors to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &Error) {
        tracing::error!("{} ({})", error.user_message(), error);
    }
}

/// Reporter that keeps user-facing messages for later display
#[derive(Debug, Default)]
pub struct ErrorLog {
    messages: Mutex<Vec<String>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorReporter for ErrorLog {
    fn report(&self, error: &Error) {
        tracing::warn!("reported error: {}", error);
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.user_message());
    }
}
