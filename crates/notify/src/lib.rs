//! Notification delivery for gatehouse.
//!
//! Three producers — server-pushed messages delivered while the app is
//! closed, realtime row-insert events delivered while it is open, and
//! locally generated toasts — merge into one ordered, de-duplicated feed
//! with unread tracking. A modal confirm gate covers destructive actions.
//!
//! Every platform touchpoint (permission prompt, push service, platform
//! notifications, window focus, the realtime transport, the server-side
//! notification table) sits behind a narrow trait so the brokering logic
//! is testable with fakes.

pub mod confirm;
pub mod feed;
pub mod push;
pub mod realtime;

#[cfg(test)]
pub(crate) mod testing;

pub use confirm::{ConfirmGate, Decision};
pub use feed::{FeedChange, NotificationEvent, NotificationFeed, NotificationStore, Origin, Severity};
pub use push::{
    NotificationClick, NotificationDisplay, Permission, PlatformNotification, PushBroker, PushCapabilities,
    PushPayload, PushPlatform, PushSubscriptionHandle, SubscriptionStore, WindowRegistry,
};
pub use realtime::{Channel, InsertEvent, RealtimeListener, RealtimeSubscription, RealtimeTransport};
