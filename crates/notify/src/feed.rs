//! The merged notification feed.
//!
//! One ordered, de-duplicated view over everything the user should see,
//! regardless of which channel delivered it. Persisted items come from the
//! server-side notification table (via realtime inserts or a refresh);
//! toasts are local-only, auto-expire, and never count as unread.
//!
//! Read-state changes are optimistic: the local flag flips first, the
//! store persists second, and a persistence failure reverts the flag and
//! re-fetches the authoritative feed so local and remote state never
//! silently diverge.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use gatehouse_core::Error;

/// Which channel delivered a feed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Push,
    Realtime,
    Local,
}

/// Toast styling hint. Only locally generated items carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// One feed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: String,
    pub user_id: String,
    pub message: String,
    /// Optional deep link into the app.
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub origin: Origin,
    /// Present on toasts only.
    pub severity: Option<Severity>,
}

impl NotificationEvent {
    fn is_toast(&self) -> bool {
        self.origin == Origin::Local
    }
}

/// Server-side persistence of notification rows.
///
/// The hosted relational store implements this; tests use an in-memory
/// fake. Inserts happen server-side only, so the trait covers reads and
/// read-state updates.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// The authoritative feed for a user, any order.
    async fn fetch_for_user(&self, user_id: &str) -> Result<Vec<NotificationEvent>, Error>;
    /// Persist `read = true` for one notification.
    async fn mark_read(&self, id: &str) -> Result<(), Error>;
    /// Persist `read = true` for every notification of a user.
    async fn mark_all_read(&self, user_id: &str) -> Result<(), Error>;
}

/// Change notifications for feed subscribers (the UI layer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedChange {
    Inserted(String),
    Read(String),
    AllRead,
    Removed(String),
    Refreshed,
}

struct FeedInner {
    user_id: String,
    items: RwLock<Vec<NotificationEvent>>,
    store: Arc<dyn NotificationStore>,
    changes: broadcast::Sender<FeedChange>,
    toast_duration: Duration,
}

/// The notification feed controller.
///
/// Cheap to clone; all clones share one feed. Scoped to the signed-in
/// user — sign-out tears the feed down, sign-in builds a fresh one.
#[derive(Clone)]
pub struct NotificationFeed {
    inner: Arc<FeedInner>,
}

impl NotificationFeed {
    pub fn new(user_id: impl Into<String>, store: Arc<dyn NotificationStore>, toast_duration: Duration) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(FeedInner {
                user_id: user_id.into(),
                items: RwLock::new(Vec::new()),
                store,
                changes,
                toast_duration,
            }),
        }
    }

    /// All known items, newest first.
    pub fn list(&self) -> Vec<NotificationEvent> {
        self.inner.items.read().clone()
    }

    /// Count of unread persisted items. Toasts never count.
    pub fn unread_count(&self) -> usize {
        self.inner
            .items
            .read()
            .iter()
            .filter(|item| !item.read && !item.is_toast())
            .count()
    }

    /// Subscribe to feed changes.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedChange> {
        self.inner.changes.subscribe()
    }

    /// Merge one delivered item into the feed.
    ///
    /// De-duplicates by id — push and realtime can both deliver the same
    /// row — and keeps the feed ordered newest first. Among items created
    /// in the same instant, the latest arrival sorts first.
    pub fn insert(&self, event: NotificationEvent) {
        let id = event.id.clone();
        {
            let mut items = self.inner.items.write();
            if items.iter().any(|item| item.id == event.id) {
                tracing::debug!(id = %event.id, "duplicate delivery dropped");
                return;
            }
            items.insert(0, event);
            items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        let _ = self.inner.changes.send(FeedChange::Inserted(id));
    }

    /// Replace the persisted items with the authoritative server state.
    /// Toasts survive a refresh; they were never persisted.
    pub async fn refresh(&self) -> Result<(), Error> {
        let fetched = self.inner.store.fetch_for_user(&self.inner.user_id).await?;
        {
            let mut items = self.inner.items.write();
            items.retain(|item| item.is_toast());
            items.extend(fetched);
            items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        let _ = self.inner.changes.send(FeedChange::Refreshed);
        Ok(())
    }

    /// Mark one item read, persistently. Idempotent.
    ///
    /// # Errors
    ///
    /// On persistence failure the local flag is reverted and the feed is
    /// re-fetched from the store before the error is returned.
    pub async fn mark_read(&self, id: &str) -> Result<(), Error> {
        let was_unread = {
            let mut items = self.inner.items.write();
            match items.iter_mut().find(|item| item.id == id) {
                Some(item) if !item.read => {
                    item.read = true;
                    true
                }
                _ => false,
            }
        };
        if !was_unread {
            // Already read (or unknown): nothing to persist.
            return Ok(());
        }

        if let Err(e) = self.inner.store.mark_read(id).await {
            tracing::warn!(id, error = %e, "mark-read persistence failed; reverting");
            if let Some(item) = self.inner.items.write().iter_mut().find(|item| item.id == id) {
                item.read = false;
            }
            self.refresh().await.ok();
            return Err(e);
        }

        let _ = self.inner.changes.send(FeedChange::Read(id.to_string()));
        Ok(())
    }

    /// Mark every persisted item read. Same revert contract as
    /// [`NotificationFeed::mark_read`].
    pub async fn mark_all_read(&self) -> Result<(), Error> {
        let flipped: Vec<String> = {
            let mut items = self.inner.items.write();
            items
                .iter_mut()
                .filter(|item| !item.read && !item.is_toast())
                .map(|item| {
                    item.read = true;
                    item.id.clone()
                })
                .collect()
        };
        if flipped.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.inner.store.mark_all_read(&self.inner.user_id).await {
            tracing::warn!(error = %e, "mark-all-read persistence failed; reverting");
            {
                let mut items = self.inner.items.write();
                for item in items.iter_mut().filter(|item| flipped.contains(&item.id)) {
                    item.read = false;
                }
            }
            self.refresh().await.ok();
            return Err(e);
        }

        let _ = self.inner.changes.send(FeedChange::AllRead);
        Ok(())
    }

    /// Raise a transient toast for immediate feedback.
    ///
    /// The toast is never persisted, never unread, and removes itself
    /// after the configured duration independent of user action. Returns
    /// the toast id.
    pub fn push_toast(&self, message: impl Into<String>, severity: Severity) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let toast = NotificationEvent {
            id: id.clone(),
            user_id: self.inner.user_id.clone(),
            message: message.into(),
            link: None,
            read: true,
            created_at: Utc::now(),
            origin: Origin::Local,
            severity: Some(severity),
        };

        {
            let mut items = self.inner.items.write();
            items.insert(0, toast);
            items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        let _ = self.inner.changes.send(FeedChange::Inserted(id.clone()));

        let feed = self.clone();
        let toast_id = id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(feed.inner.toast_duration).await;
            feed.remove(&toast_id);
        });

        id
    }

    fn remove(&self, id: &str) {
        let removed = {
            let mut items = self.inner.items.write();
            let before = items.len();
            items.retain(|item| item.id != id);
            items.len() != before
        };
        if removed {
            let _ = self.inner.changes.send(FeedChange::Removed(id.to_string()));
        }
    }
}
