//! Unified error types for gatehouse.
//!
//! One `Error` enum is shared by the cache store, the interception agent,
//! and the notification crates so that `?` composes across crate seams.
//! The interception request path itself never surfaces these to callers;
//! it always resolves to a response-shaped value.

use tokio_rusqlite::rusqlite;

/// Unified error type for the gatehouse crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database operation failed.
    #[error("cache database error: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("cache migration failed: {0}")]
    MigrationFailed(String),

    /// Generation version not present in the store.
    #[error("unknown cache generation: {0}")]
    UnknownGeneration(i64),

    /// A shell manifest entry could not be installed. Fatal to the new
    /// generation; the previously live generation keeps serving.
    #[error("shell install failed for {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    /// Transport-level fetch failure (DNS, connection refused, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// Response body exceeded the configured byte cap.
    #[error("response too large: {0} bytes")]
    TooLarge(usize),

    /// URL failed canonicalization.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid agent lifecycle transition.
    #[error("invalid lifecycle transition: {from} -> {to}")]
    Lifecycle { from: &'static str, to: &'static str },

    /// The agent task has exited; its command channel is closed.
    #[error("interception agent unavailable")]
    AgentUnavailable,

    /// Push subscribe handshake with the delivery platform failed.
    #[error("push subscription failed: {0}")]
    SubscribeFailed(String),

    /// The user denied notification permission.
    #[error("notification permission denied")]
    PermissionDenied,

    /// Server-side persistence failed (subscription record or read-state).
    #[error("persistence failed: {0}")]
    Persist(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
