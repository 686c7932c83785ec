//! Request-descriptor cache keys.
//!
//! A cache key identifies a request by method + canonical URL. Only GET
//! requests ever reach the store (the interception layer bypasses everything
//! else), but the method is hashed in anyway so the key scheme does not
//! silently alias if that ever changes.

use sha2::{Digest, Sha256};

/// Compute the cache key for a normalized request descriptor.
pub fn compute_entry_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
