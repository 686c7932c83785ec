//! The application shell manifest and install step.
//!
//! The manifest is the fixed set of assets needed to boot the application
//! with no network: the entry document, the entry bundle, and the
//! third-party static assets the shell loads from CDN hosts. It is
//! hard-coded; deploys change it by shipping a new agent with a bumped
//! shell version, not by runtime configuration.

use crate::fetch::Fetcher;
use crate::url::canonicalize;
use gatehouse_core::cache::compute_entry_key;
use gatehouse_core::{CacheDb, Error, Generation};
use url::Url;

/// Assets cached unconditionally at install time. Relative entries resolve
/// against the configured origin; absolute entries are CDN assets.
pub const SHELL_MANIFEST: &[&str] = &[
    "/",
    "/assets/index.js",
    "https://fonts.googleapis.com/css2?family=Inter:wght@400;600&display=swap",
    "https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.js",
];

/// Resolve the manifest against the application origin, canonicalized.
pub fn resolve_manifest(origin: &Url) -> Result<Vec<Url>, Error> {
    SHELL_MANIFEST
        .iter()
        .map(|entry| {
            let joined = origin
                .join(entry)
                .map_err(|e| Error::InvalidUrl(format!("{entry}: {e}")))?;
            canonicalize(joined.as_str()).map_err(|e| Error::InvalidUrl(e.to_string()))
        })
        .collect()
}

/// Cache key of the shell entry document — the offline navigation fallback.
pub fn shell_document_key(origin: &Url) -> Result<String, Error> {
    let entry = origin.join("/").map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let entry = canonicalize(entry.as_str()).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    Ok(compute_entry_key("GET", entry.as_str()))
}

/// Fetch every manifest asset and store it in the given (not yet live)
/// generation. Returns the number of entries written.
///
/// # Errors
///
/// Any manifest entry that fails to fetch — transport failure or a
/// non-success status — aborts the install with `Error::InstallFailed`.
/// The generation is left behind not-live and is wiped on the next
/// install attempt; it is never activated.
pub async fn install_shell(
    db: &CacheDb, fetcher: &dyn Fetcher, origin: &Url, generation: &Generation,
) -> Result<u64, Error> {
    let urls = resolve_manifest(origin)?;
    let total = urls.len();

    for url in urls {
        let response = match fetcher.fetch(url.as_str()).await {
            Ok(response) if response.status == 200 => response,
            Ok(response) => {
                return Err(Error::InstallFailed {
                    url: url.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            Err(e) => {
                return Err(Error::InstallFailed { url: url.to_string(), reason: e.to_string() });
            }
        };

        db.put_entry(generation.id, &response.to_stored()).await?;
    }

    tracing::info!(version = generation.version, entries = total, "shell install complete");
    Ok(total as u64)
}
