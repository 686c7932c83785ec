//! The modal confirm gate.
//!
//! A yes/no gate for destructive actions. Exclusive by design: opening a
//! new gate while one is pending cancels the pending one instead of
//! queueing behind it. Each gate resolves exactly once — confirm or
//! cancel, never both. Not a feed item; nothing here persists.

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Outcome of a confirm gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirmed,
    Cancelled,
}

struct Pending {
    message: String,
    reply: oneshot::Sender<Decision>,
}

/// One gate per UI session.
#[derive(Default)]
pub struct ConfirmGate {
    pending: Mutex<Option<Pending>>,
}

impl ConfirmGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a gate and wait for the user's decision.
    ///
    /// If another gate is already open it resolves `Cancelled` immediately
    /// and this one takes its place. If the gate is dropped unresolved the
    /// caller sees `Cancelled`.
    pub async fn confirm(&self, message: impl Into<String>) -> Decision {
        let (reply, decision) = oneshot::channel();
        let replaced = self
            .pending
            .lock()
            .replace(Pending { message: message.into(), reply });

        if let Some(previous) = replaced {
            tracing::debug!(message = %previous.message, "confirm gate replaced");
            let _ = previous.reply.send(Decision::Cancelled);
        }

        decision.await.unwrap_or(Decision::Cancelled)
    }

    /// The message of the currently open gate, if any.
    pub fn pending_message(&self) -> Option<String> {
        self.pending.lock().as_ref().map(|p| p.message.clone())
    }

    /// Settle the open gate. Returns false if none was open.
    pub fn resolve(&self, decision: Decision) -> bool {
        match self.pending.lock().take() {
            Some(pending) => {
                let _ = pending.reply.send(decision);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_confirm_resolves_once() {
        let gate = Arc::new(ConfirmGate::new());

        let waiting = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.confirm("Delete this post?").await })
        };
        // Let the gate open before resolving it.
        tokio::task::yield_now().await;
        assert_eq!(gate.pending_message().as_deref(), Some("Delete this post?"));

        assert!(gate.resolve(Decision::Confirmed));
        assert_eq!(waiting.await.unwrap(), Decision::Confirmed);

        // Nothing left to settle.
        assert!(!gate.resolve(Decision::Confirmed));
    }

    #[tokio::test]
    async fn test_second_gate_replaces_first() {
        let gate = Arc::new(ConfirmGate::new());

        let first = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.confirm("Leave group?").await })
        };
        tokio::task::yield_now().await;

        let second = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.confirm("Delete account?").await })
        };
        tokio::task::yield_now().await;

        // The first gate was cancelled by the replacement, not queued.
        assert_eq!(first.await.unwrap(), Decision::Cancelled);
        assert_eq!(gate.pending_message().as_deref(), Some("Delete account?"));

        gate.resolve(Decision::Cancelled);
        assert_eq!(second.await.unwrap(), Decision::Cancelled);
    }

    #[tokio::test]
    async fn test_dropped_gate_reads_as_cancelled() {
        let gate = Arc::new(ConfirmGate::new());
        let waiting = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.confirm("Sign out?").await })
        };
        tokio::task::yield_now().await;

        // Simulate the dialog host going away without an answer.
        *gate.pending.lock() = None;
        assert_eq!(waiting.await.unwrap(), Decision::Cancelled);
    }
}
