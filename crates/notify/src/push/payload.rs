//! Inbound push payload parsing.
//!
//! The delivery service hands over an opaque byte payload. Well-formed
//! payloads are JSON `{ title?, body?, icon?, url? }` with every field
//! optional; anything else is treated as plain body text rather than
//! failing the notification.

use serde::Deserialize;

/// Default title when the payload omits one.
pub const DEFAULT_TITLE: &str = "Community Hub";
/// Default body when the payload omits one.
pub const DEFAULT_BODY: &str = "You have a new notification";
/// App logo, shown when the payload names no icon.
pub const DEFAULT_ICON: &str = "/icons/logo-192.png";
/// Monochrome badge for the platform's status area.
pub const DEFAULT_BADGE: &str = "/icons/badge-72.png";
/// Click target when the payload names none: the app root.
pub const DEFAULT_URL: &str = "/";

/// The wire form of a push payload. All fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub url: Option<String>,
}

impl PushPayload {
    /// Parse a raw payload, falling back to plain text on malformed JSON.
    pub fn parse(raw: &[u8]) -> Self {
        match serde_json::from_slice(raw) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(error = %e, "push payload is not JSON, using raw text as body");
                Self { body: Some(String::from_utf8_lossy(raw).into_owned()), ..Self::default() }
            }
        }
    }

    /// Fill in the documented defaults, producing a displayable notification.
    pub fn into_notification(self) -> PlatformNotification {
        PlatformNotification {
            title: self.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body: self.body.unwrap_or_else(|| DEFAULT_BODY.to_string()),
            icon: self.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
            badge: DEFAULT_BADGE.to_string(),
            url: self.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
        }
    }
}

/// A notification as handed to the platform for display.
///
/// `url` is opaque to the platform; only the click handler reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformNotification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub url: String,
}
