//! Test support: in-memory fakes for the capability traits.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::feed::{NotificationEvent, NotificationStore};
use crate::push::{
    NotificationDisplay, Permission, PlatformNotification, PushPlatform, PushSubscriptionHandle, SubscriptionStore,
    WindowRegistry,
};
use crate::realtime::{Channel, InsertEvent, RealtimeSubscription, RealtimeTransport};
use gatehouse_core::Error;

/// Authoritative notification rows, with scriptable write failures.
pub(crate) struct MemoryNotificationStore {
    rows: Mutex<Vec<NotificationEvent>>,
    fail_writes: AtomicBool,
    mark_read_calls: AtomicUsize,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self { rows: Mutex::new(Vec::new()), fail_writes: AtomicBool::new(false), mark_read_calls: AtomicUsize::new(0) }
    }

    pub fn seed(&self, event: NotificationEvent) {
        self.rows.lock().push(event);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn is_read(&self, id: &str) -> bool {
        self.rows.lock().iter().any(|row| row.id == id && row.read)
    }

    pub fn mark_read_calls(&self) -> usize {
        self.mark_read_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn fetch_for_user(&self, user_id: &str) -> Result<Vec<NotificationEvent>, Error> {
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: &str) -> Result<(), Error> {
        self.mark_read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Persist("write rejected".into()));
        }
        if let Some(row) = self.rows.lock().iter_mut().find(|row| row.id == id) {
            row.read = true;
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Persist("write rejected".into()));
        }
        for row in self.rows.lock().iter_mut().filter(|row| row.user_id == user_id) {
            row.read = true;
        }
        Ok(())
    }
}

/// The platform's permission prompt and push service.
pub(crate) struct FakePushPlatform {
    permission: Mutex<Permission>,
    existing: Mutex<Option<PushSubscriptionHandle>>,
    fail_subscribe: AtomicBool,
    subscribe_calls: AtomicUsize,
}

impl FakePushPlatform {
    pub fn new() -> Self {
        Self {
            permission: Mutex::new(Permission::Default),
            existing: Mutex::new(None),
            fail_subscribe: AtomicBool::new(false),
            subscribe_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_permission(&self, permission: Permission) {
        *self.permission.lock() = permission;
    }

    pub fn set_existing(&self, handle: PushSubscriptionHandle) {
        *self.existing.lock() = Some(handle);
    }

    pub fn fail_subscribe(&self) {
        self.fail_subscribe.store(true, Ordering::SeqCst);
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushPlatform for FakePushPlatform {
    async fn request_permission(&self) -> Permission {
        *self.permission.lock()
    }

    async fn existing_subscription(&self) -> Option<PushSubscriptionHandle> {
        self.existing.lock().clone()
    }

    async fn subscribe(&self, _public_key: &str) -> Result<PushSubscriptionHandle, Error> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(Error::SubscribeFailed("push service rejected the request".into()));
        }
        Ok(PushSubscriptionHandle {
            endpoint: "https://push.example.net/send/generated".into(),
            p256dh: "p256dh-key".into(),
            auth: "auth-secret".into(),
        })
    }
}

/// One subscription row per user, replace on conflict.
pub(crate) struct MemorySubscriptionStore {
    rows: Mutex<HashMap<String, PushSubscriptionHandle>>,
    upserts: AtomicUsize,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self { rows: Mutex::new(HashMap::new()), upserts: AtomicUsize::new(0) }
    }

    pub fn get(&self, user_id: &str) -> Option<PushSubscriptionHandle> {
        self.rows.lock().get(user_id).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn upsert(&self, user_id: &str, handle: &PushSubscriptionHandle) -> Result<(), Error> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().insert(user_id.to_string(), handle.clone());
        Ok(())
    }
}

/// Records displayed and dismissed notifications.
pub(crate) struct FakeDisplay {
    shown: Mutex<Vec<PlatformNotification>>,
    dismissed: Mutex<Vec<String>>,
}

impl FakeDisplay {
    pub fn new() -> Self {
        Self { shown: Mutex::new(Vec::new()), dismissed: Mutex::new(Vec::new()) }
    }

    pub fn shown(&self) -> Vec<PlatformNotification> {
        self.shown.lock().clone()
    }

    pub fn dismissed(&self) -> Vec<String> {
        self.dismissed.lock().clone()
    }
}

#[async_trait]
impl NotificationDisplay for FakeDisplay {
    async fn show(&self, notification: &PlatformNotification) -> Result<(), Error> {
        self.shown.lock().push(notification.clone());
        Ok(())
    }

    async fn dismiss(&self, tag: &str) {
        self.dismissed.lock().push(tag.to_string());
    }
}

/// Open windows addressable by URL; `open` registers a new window so a
/// later `find` for the same URL sees it.
pub(crate) struct FakeWindows {
    windows: Mutex<Vec<(u64, String)>>,
    next_id: AtomicU64,
    focused: Mutex<Vec<u64>>,
    opened: Mutex<Vec<String>>,
}

impl FakeWindows {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            focused: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn focused(&self) -> Vec<u64> {
        self.focused.lock().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl WindowRegistry for FakeWindows {
    async fn find(&self, url: &str) -> Option<u64> {
        self.windows.lock().iter().find(|(_, u)| u == url).map(|(id, _)| *id)
    }

    async fn focus(&self, id: u64) {
        self.focused.lock().push(id);
    }

    async fn open(&self, url: &str) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.windows.lock().push((id, url.to_string()));
        self.opened.lock().push(url.to_string());
    }
}

/// A scriptable realtime transport that tracks live subscriptions.
pub(crate) struct FakeTransport {
    sender: Mutex<Option<mpsc::Sender<InsertEvent>>>,
    subscriptions: Mutex<Vec<(String, usize)>>,
    active: Arc<AtomicUsize>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self { sender: Mutex::new(None), subscriptions: Mutex::new(Vec::new()), active: Arc::new(AtomicUsize::new(0)) }
    }

    /// Deliver an insert event to the most recent subscription.
    pub fn emit(&self, event: InsertEvent) {
        if let Some(sender) = self.sender.lock().as_ref() {
            sender.try_send(event).ok();
        }
    }

    /// (user_id, channel count) per subscribe call, in order.
    pub fn subscriptions(&self) -> Vec<(String, usize)> {
        self.subscriptions.lock().clone()
    }

    /// Subscriptions not yet torn down.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RealtimeTransport for FakeTransport {
    async fn subscribe(&self, user_id: &str, channels: &[Channel]) -> Result<RealtimeSubscription, Error> {
        let (sender, receiver) = mpsc::channel(16);
        *self.sender.lock() = Some(sender);
        self.subscriptions.lock().push((user_id.to_string(), channels.len()));

        self.active.fetch_add(1, Ordering::SeqCst);
        let active = self.active.clone();
        Ok(RealtimeSubscription::new(receiver, move || {
            active.fetch_sub(1, Ordering::SeqCst);
        }))
    }
}
