//! The realtime event listener.
//!
//! While the app is open and a user is signed in, server-side row inserts
//! for that user's notifications and chat messages are mirrored into the
//! local feed without polling. One subscription per session, filtered
//! server-side to the user's rows.
//!
//! Reconnection after a network blip belongs to the transport; this
//! component carries no retry or backoff state. A user change means
//! stopping this listener and starting a fresh one — re-pointing a live
//! subscription would deliver the previous user's events to the new
//! session.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::feed::{NotificationEvent, NotificationFeed, Severity};
use gatehouse_core::Error;

/// Server-side tables the listener mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Notifications,
    ChatMessages,
}

/// One observed row insert. The transport maps rows from either channel
/// into the feed's event form.
#[derive(Debug, Clone)]
pub struct InsertEvent {
    pub channel: Channel,
    pub record: NotificationEvent,
}

/// A live, filtered subscription handed out by the transport.
///
/// Dropping the subscription unsubscribes; `unsubscribe` does it
/// explicitly. Either way the transport-side resources are released.
pub struct RealtimeSubscription {
    events: mpsc::Receiver<InsertEvent>,
    on_unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl RealtimeSubscription {
    pub fn new(events: mpsc::Receiver<InsertEvent>, on_unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self { events, on_unsubscribe: Some(Box::new(on_unsubscribe)) }
    }

    /// Next insert event; None when the transport closed the stream.
    pub async fn next(&mut self) -> Option<InsertEvent> {
        self.events.recv().await
    }

    /// Tear the subscription down explicitly.
    pub fn unsubscribe(mut self) {
        if let Some(hook) = self.on_unsubscribe.take() {
            hook();
        }
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        if let Some(hook) = self.on_unsubscribe.take() {
            hook();
        }
    }
}

/// The realtime transport (the hosted database's change stream).
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Open one subscription filtered server-side to the user's rows.
    async fn subscribe(&self, user_id: &str, channels: &[Channel]) -> Result<RealtimeSubscription, Error>;
}

/// Mirrors one user's insert events into the feed for the session's
/// lifetime.
pub struct RealtimeListener {
    user_id: String,
    stop: Option<oneshot::Sender<()>>,
}

impl RealtimeListener {
    /// Open the subscription and start mirroring.
    ///
    /// Each insert is prepended to the feed and raises a toast. The
    /// listener runs until [`RealtimeListener::stop`] (or drop), or until
    /// the transport closes the stream.
    pub async fn start(
        transport: &dyn RealtimeTransport, user_id: impl Into<String>, feed: NotificationFeed,
    ) -> Result<Self, Error> {
        let user_id = user_id.into();
        let subscription = transport
            .subscribe(&user_id, &[Channel::Notifications, Channel::ChatMessages])
            .await?;
        tracing::debug!(user_id = %user_id, "realtime subscription open");

        let (stop, stopped) = oneshot::channel();
        tokio::spawn(run(subscription, feed, stopped));

        Ok(Self { user_id, stop: Some(stop) })
    }

    /// The user this listener is scoped to.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Tear the listener and its subscription down.
    pub fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for RealtimeListener {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

async fn run(mut subscription: RealtimeSubscription, feed: NotificationFeed, mut stopped: oneshot::Receiver<()>) {
    loop {
        tokio::select! {
            _ = &mut stopped => break,
            event = subscription.next() => match event {
                Some(insert) => {
                    let message = insert.record.message.clone();
                    feed.insert(insert.record);
                    feed.push_toast(message, Severity::Info);
                }
                None => {
                    tracing::debug!("realtime stream closed by transport");
                    break;
                }
            },
        }
    }
    subscription.unsubscribe();
}
