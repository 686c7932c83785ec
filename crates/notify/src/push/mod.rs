//! The push subscription broker.
//!
//! Obtains and keeps current a push-delivery endpoint for the signed-in
//! user, and converts inbound push payloads into displayed notifications.
//! The permission prompt, the platform push service, the notification
//! display surface, and the window registry are all external capabilities
//! behind narrow traits; the broker owns only the policy.
//!
//! Subscribe failures are non-fatal: one error toast, no automatic retry —
//! the next app session runs `ensure_subscribed` again and recovers there.

pub mod payload;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::feed::{NotificationEvent, NotificationFeed, Origin, Severity};
use gatehouse_core::Error;

pub use payload::{PlatformNotification, PushPayload};

/// Notification permission tri-state, as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Never asked, or the prompt was dismissed without an answer.
    Default,
    Granted,
    Denied,
}

/// A delivery-service-issued subscription: endpoint plus encryption keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscriptionHandle {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

/// The platform's permission prompt and push service.
#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// Ask the runtime for notification permission.
    async fn request_permission(&self) -> Permission;
    /// The subscription this installation already holds, if any.
    async fn existing_subscription(&self) -> Option<PushSubscriptionHandle>;
    /// Negotiate a new subscription with the push service.
    async fn subscribe(&self, public_key: &str) -> Result<PushSubscriptionHandle, Error>;
}

/// Server-side persistence of subscription records: one row per user,
/// replace on conflict.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn upsert(&self, user_id: &str, handle: &PushSubscriptionHandle) -> Result<(), Error>;
}

/// The platform surface that shows and dismisses notifications.
#[async_trait]
pub trait NotificationDisplay: Send + Sync {
    /// Display a notification. Awaited: the triggering push event is not
    /// considered handled until the notification is on screen.
    async fn show(&self, notification: &PlatformNotification) -> Result<(), Error>;
    /// Dismiss a displayed notification by its platform tag.
    async fn dismiss(&self, tag: &str);
}

/// Open client windows, addressable by URL.
#[async_trait]
pub trait WindowRegistry: Send + Sync {
    /// A window currently showing exactly this URL, if any.
    async fn find(&self, url: &str) -> Option<u64>;
    async fn focus(&self, id: u64);
    async fn open(&self, url: &str);
}

/// A click on a displayed platform notification.
#[derive(Debug, Clone)]
pub struct NotificationClick {
    /// Platform tag of the clicked notification.
    pub tag: String,
    /// The notification's opaque url data field.
    pub url: String,
}

/// The capability collaborators the broker drives.
#[derive(Clone)]
pub struct PushCapabilities {
    pub platform: Arc<dyn PushPlatform>,
    pub store: Arc<dyn SubscriptionStore>,
    pub display: Arc<dyn NotificationDisplay>,
    pub windows: Arc<dyn WindowRegistry>,
}

/// The push subscription broker, scoped to one signed-in session.
pub struct PushBroker {
    user_id: String,
    public_key: String,
    origin: Url,
    capabilities: PushCapabilities,
    feed: NotificationFeed,
    permission: Mutex<Permission>,
}

impl PushBroker {
    pub fn new(
        user_id: impl Into<String>, public_key: impl Into<String>, origin: Url, capabilities: PushCapabilities,
        feed: NotificationFeed,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            public_key: public_key.into(),
            origin,
            capabilities,
            feed,
            permission: Mutex::new(Permission::Default),
        }
    }

    /// The last permission state the runtime reported.
    pub fn permission(&self) -> Permission {
        *self.permission.lock()
    }

    /// Ask the runtime for notification permission and record the answer.
    ///
    /// On a grant, subscription setup runs immediately; its failure is
    /// already surfaced as a toast and does not change the returned
    /// permission. A denial gets its own toast.
    pub async fn request_permission(&self) -> Permission {
        let permission = self.capabilities.platform.request_permission().await;
        *self.permission.lock() = permission;

        match permission {
            Permission::Granted => {
                self.ensure_subscribed().await.ok();
            }
            Permission::Denied => {
                self.feed
                    .push_toast("Notifications are blocked for this site", Severity::Warning);
            }
            Permission::Default => {}
        }

        permission
    }

    /// Make sure a current subscription for this user exists server-side.
    ///
    /// Reuses the installation's existing subscription handle when there is
    /// one; otherwise negotiates a new one with the push service. Either
    /// way the record is upserted keyed by user id — re-subscribing
    /// replaces, never duplicates. Failures surface as one error toast and
    /// are not retried until the next session.
    ///
    /// # Errors
    ///
    /// Returns `Error::PermissionDenied` when permission is not granted,
    /// or the subscribe/persist failure otherwise.
    pub async fn ensure_subscribed(&self) -> Result<(), Error> {
        if self.permission() != Permission::Granted {
            return Err(Error::PermissionDenied);
        }

        let handle = match self.capabilities.platform.existing_subscription().await {
            Some(handle) => handle,
            None => match self.capabilities.platform.subscribe(&self.public_key).await {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::warn!(error = %e, "push subscribe failed");
                    self.feed
                        .push_toast("Couldn't enable push notifications", Severity::Error);
                    return Err(e);
                }
            },
        };

        if let Err(e) = self.capabilities.store.upsert(&self.user_id, &handle).await {
            tracing::warn!(error = %e, "push subscription upsert failed");
            self.feed
                .push_toast("Couldn't enable push notifications", Severity::Error);
            return Err(e);
        }

        tracing::debug!(endpoint = %handle.endpoint, "push subscription current");
        Ok(())
    }

    /// Handle a push message arriving from the delivery service.
    ///
    /// The display call is awaited — the platform keeps the agent alive
    /// until the notification is shown — and the event is merged into the
    /// feed so an open session sees it without a refresh.
    pub async fn on_push_received(&self, raw: &[u8]) {
        let notification = PushPayload::parse(raw).into_notification();

        if let Err(e) = self.capabilities.display.show(&notification).await {
            tracing::warn!(error = %e, "platform notification display failed");
        }

        self.feed.insert(NotificationEvent {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: self.user_id.clone(),
            message: notification.body.clone(),
            link: Some(notification.url.clone()),
            read: false,
            created_at: chrono::Utc::now(),
            origin: Origin::Push,
            severity: None,
        });
    }

    /// Handle the user activating a displayed notification.
    ///
    /// The notification is dismissed first in all cases. Its deep link is
    /// resolved against the app origin; a window already at that exact URL
    /// is focused, otherwise exactly one new window opens.
    pub async fn on_notification_clicked(&self, click: NotificationClick) {
        self.capabilities.display.dismiss(&click.tag).await;

        let target = match self.origin.join(&click.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(url = %click.url, error = %e, "unresolvable deep link, opening app root");
                self.origin.clone()
            }
        };

        match self.capabilities.windows.find(target.as_str()).await {
            Some(id) => self.capabilities.windows.focus(id).await,
            None => self.capabilities.windows.open(target.as_str()).await,
        }
    }
}
