//! Bounded in-memory notification list
//!
//! Newest first, capped at [`MAX_NOTIFICATIONS`]. The list lives only for the
//! session; nothing here is persisted.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::debug;

pub const MAX_NOTIFICATIONS: usize = 50;

/// Session-unique id, strictly increasing in insertion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(u64);

impl NotificationId {
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notif_{}", self.0)
    }
}

impl Serialize for NotificationId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NotificationId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.strip_prefix("notif_")
            .and_then(|n| n.parse().ok())
            .map(Self)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid notification id: {raw}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
}

/// Caller-supplied part of a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
}

impl NewNotification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            action_url: None,
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, title, message)
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title, message)
    }

    #[must_use]
    pub fn with_action(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }
}

struct Inner {
    list: VecDeque<Notification>,
    next_id: u64,
}

pub struct NotificationCenter {
    inner: Mutex<Inner>,
    appended: broadcast::Sender<Notification>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCenter {
    pub fn new() -> Self {
        let (appended, _) = broadcast::channel(MAX_NOTIFICATIONS);
        Self {
            inner: Mutex::new(Inner {
                list: VecDeque::with_capacity(MAX_NOTIFICATIONS),
                next_id: 1,
            }),
            appended,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Notifications appended from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.appended.subscribe()
    }

    /// Insert at the head as unread, evicting the oldest beyond the cap
    pub fn append(&self, entry: NewNotification) -> Notification {
        let notification = {
            let mut inner = self.lock();
            let id = NotificationId(inner.next_id);
            inner.next_id += 1;

            let notification = Notification {
                id,
                kind: entry.kind,
                title: entry.title,
                message: entry.message,
                timestamp: chrono::Utc::now().timestamp_millis(),
                read: false,
                action_url: entry.action_url,
            };
            inner.list.push_front(notification.clone());
            if inner.list.len() > MAX_NOTIFICATIONS {
                inner.list.truncate(MAX_NOTIFICATIONS);
            }
            notification
        };

        debug!(id = %notification.id, kind = ?notification.kind, "Notification appended");
        let _ = self.appended.send(notification.clone());
        notification
    }

    /// Returns false when the id is unknown
    pub fn mark_read(&self, id: NotificationId) -> bool {
        let mut inner = self.lock();
        let Some(notification) = inner.list.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        notification.read = true;
        true
    }

    pub fn mark_all_read(&self) {
        for notification in &mut self.lock().list {
            notification.read = true;
        }
    }

    /// Returns false when the id is unknown
    pub fn remove(&self, id: NotificationId) -> bool {
        let mut inner = self.lock();
        let before = inner.list.len();
        inner.list.retain(|n| n.id != id);
        inner.list.len() != before
    }

    pub fn clear_all(&self) {
        self.lock().list.clear();
    }

    /// Snapshot, newest first
    pub fn list(&self) -> Vec<Notification> {
        self.lock().list.iter().cloned().collect()
    }

    pub fn unread_count(&self) -> usize {
        self.lock().list.iter().filter(|n| !n.read).count()
    }

    pub fn len(&self) -> usize {
        self.lock().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().list.is_empty()
    }
}
