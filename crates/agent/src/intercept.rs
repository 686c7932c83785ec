//! The per-request interception contract.
//!
//! Cache-first for GET traffic, with the live database/API hosts bypassed
//! entirely. On a miss the network result is returned and, when it is an
//! HTTP 200, stored under the request key in the live generation.
//! A dead network degrades instead of erroring: navigations fall back to
//! the cached shell document so the app can still boot and route
//! client-side, and any other resource resolves to a synthetic 404.
//!
//! `handle` is infallible by design: no raw network or store error ever
//! escapes to the calling page session. Store failures after a successful
//! fetch are logged and the fresh response is served anyway.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::fetch::Fetcher;
use crate::url::{canonicalize, is_excluded_host};
use gatehouse_core::cache::compute_entry_key;
use gatehouse_core::{CacheDb, StoredResponse};

/// How the page session will consume the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    /// A top-level page navigation; offline failures fall back to the shell.
    Navigation,
    /// Any other resource load (script, style, image, data).
    Resource,
}

/// An intercepted outbound request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterceptRequest {
    pub method: String,
    pub url: String,
    pub mode: RequestMode,
}

impl InterceptRequest {
    /// A top-level navigation GET.
    pub fn navigation(url: impl Into<String>) -> Self {
        Self { method: "GET".into(), url: url.into(), mode: RequestMode::Navigation }
    }

    /// A subresource GET.
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: "GET".into(), url: url.into(), mode: RequestMode::Resource }
    }

    /// A request with an explicit method.
    pub fn new(method: impl Into<String>, url: impl Into<String>, mode: RequestMode) -> Self {
        Self { method: method.into(), url: url.into(), mode }
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServedFrom {
    Cache,
    Network,
    ShellFallback,
    SyntheticNotFound,
}

/// A response the agent resolved on the page session's behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterceptedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub served_from: ServedFrom,
}

impl InterceptedResponse {
    fn from_stored(stored: StoredResponse, served_from: ServedFrom) -> Self {
        Self { status: stored.status, headers: stored.headers, body: stored.body, served_from }
    }

    fn synthetic_not_found() -> Self {
        Self {
            status: 404,
            headers: vec![("content-type".into(), "text/plain; charset=utf-8".into())],
            body: Vec::new(),
            served_from: ServedFrom::SyntheticNotFound,
        }
    }
}

/// Outcome of running a request through the agent.
#[derive(Debug, Clone)]
pub enum InterceptOutcome {
    /// The agent declines to touch the request; the page session performs
    /// its own network call, exactly as if the agent were not installed.
    Passthrough,
    /// The agent resolved the request.
    Response(InterceptedResponse),
}

/// The interception policy plus the handles it drives.
///
/// Cloning is cheap; every in-flight request runs on its own task with its
/// own clone, and concurrent requests to the same key each independently
/// check-then-fetch-then-store. Cache writes are last-write-wins upserts,
/// so the races are harmless.
#[derive(Clone)]
pub struct Interceptor {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    api_hosts: Vec<String>,
    shell_key: String,
}

impl Interceptor {
    pub fn new(db: CacheDb, fetcher: Arc<dyn Fetcher>, api_hosts: Vec<String>, shell_key: String) -> Self {
        Self { db, fetcher, api_hosts, shell_key }
    }

    /// Run one request through the per-request contract.
    pub async fn handle(&self, request: &InterceptRequest) -> InterceptOutcome {
        if !request.method.eq_ignore_ascii_case("GET") {
            return InterceptOutcome::Passthrough;
        }

        let url = match canonicalize(&request.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "uninterceptable URL, passing through");
                return InterceptOutcome::Passthrough;
            }
        };

        if is_excluded_host(&url, &self.api_hosts) {
            return InterceptOutcome::Passthrough;
        }

        let key = compute_entry_key("GET", url.as_str());

        match self.db.get_live(&key).await {
            Ok(Some(stored)) => {
                tracing::debug!(url = %url, "cache hit");
                return InterceptOutcome::Response(InterceptedResponse::from_stored(stored, ServedFrom::Cache));
            }
            Ok(None) => {}
            Err(e) => {
                // A broken store reads as a miss; the network path below
                // still produces a well-formed response.
                tracing::warn!(url = %url, error = %e, "cache lookup failed");
            }
        }

        match self.fetcher.fetch(url.as_str()).await {
            Ok(response) => {
                if response.status == 200 {
                    self.store(&response.to_stored(), &url).await;
                }
                InterceptOutcome::Response(InterceptedResponse {
                    status: response.status,
                    headers: response.headers,
                    body: response.body.to_vec(),
                    served_from: ServedFrom::Network,
                })
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "network fetch failed, degrading");
                InterceptOutcome::Response(self.offline_fallback(request.mode).await)
            }
        }
    }

    /// Store a fresh 200 under its key in the live generation. Cross-origin
    /// responses are stored like same-origin ones; third-party shell assets
    /// depend on it.
    async fn store(&self, stored: &StoredResponse, url: &url::Url) {
        let live = match self.db.live_generation().await {
            Ok(Some(live)) => live,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "cache store skipped");
                return;
            }
        };
        if let Err(e) = self.db.put_entry(live.id, stored).await {
            tracing::warn!(url = %url, error = %e, "cache store failed");
        }
    }

    async fn offline_fallback(&self, mode: RequestMode) -> InterceptedResponse {
        if mode == RequestMode::Navigation
            && let Ok(Some(shell)) = self.db.get_live(&self.shell_key).await
        {
            return InterceptedResponse::from_stored(shell, ServedFrom::ShellFallback);
        }
        InterceptedResponse::synthetic_not_found()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::shell_document_key;
    use crate::testing::FakeFetcher;
    use gatehouse_core::CacheDb;
    use url::Url;

    async fn active_db() -> CacheDb {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = db.create_generation(1).await.unwrap();
        db.activate_generation(generation.version).await.unwrap();
        db
    }

    fn interceptor(db: CacheDb, fetcher: Arc<FakeFetcher>) -> Interceptor {
        let origin = Url::parse("https://hub.example.org").unwrap();
        let shell_key = shell_document_key(&origin).unwrap();
        Interceptor::new(db, fetcher, vec!["api.example.org".into()], shell_key)
    }

    #[tokio::test]
    async fn test_cached_key_served_without_network() {
        let db = active_db().await;
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.respond("https://hub.example.org/feed", 200, b"cached page");

        let agent = interceptor(db, fetcher.clone());
        // Warm the cache through one network round trip.
        agent.handle(&InterceptRequest::get("https://hub.example.org/feed")).await;
        assert_eq!(fetcher.calls().len(), 1);

        let outcome = agent.handle(&InterceptRequest::get("https://hub.example.org/feed")).await;
        let InterceptOutcome::Response(response) = outcome else {
            panic!("expected a response");
        };
        assert_eq!(response.served_from, ServedFrom::Cache);
        assert_eq!(response.body, b"cached page");
        // Cache takes priority over network: still exactly one fetch.
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_miss_is_returned_and_stored() {
        let db = active_db().await;
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.respond("https://hub.example.org/feed", 200, b"fresh");

        let agent = interceptor(db.clone(), fetcher);
        let outcome = agent.handle(&InterceptRequest::get("https://hub.example.org/feed")).await;
        let InterceptOutcome::Response(response) = outcome else {
            panic!("expected a response");
        };
        assert_eq!(response.served_from, ServedFrom::Network);
        assert_eq!(response.body, b"fresh");

        let key = compute_entry_key("GET", "https://hub.example.org/feed");
        let stored = db.get_live(&key).await.unwrap().unwrap();
        assert_eq!(stored.body, b"fresh");
    }

    #[tokio::test]
    async fn test_non_200_not_cached() {
        let db = active_db().await;
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.respond("https://hub.example.org/gone", 410, b"");

        let agent = interceptor(db.clone(), fetcher);
        agent.handle(&InterceptRequest::get("https://hub.example.org/gone")).await;

        let key = compute_entry_key("GET", "https://hub.example.org/gone");
        assert!(db.get_live(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_get_passes_through() {
        let db = active_db().await;
        let fetcher = Arc::new(FakeFetcher::new());
        let agent = interceptor(db, fetcher.clone());

        let request = InterceptRequest::new("POST", "https://hub.example.org/tasks", RequestMode::Resource);
        let outcome = agent.handle(&request).await;
        assert!(matches!(outcome, InterceptOutcome::Passthrough));
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_api_host_passes_through() {
        let db = active_db().await;
        let fetcher = Arc::new(FakeFetcher::new());
        let agent = interceptor(db, fetcher.clone());

        let outcome = agent.handle(&InterceptRequest::get("https://api.example.org/rest/v1/tasks")).await;
        assert!(matches!(outcome, InterceptOutcome::Passthrough));
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_offline_navigation_falls_back_to_shell() {
        let db = active_db().await;
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.respond("https://hub.example.org/", 200, b"<html>shell</html>");

        let agent = interceptor(db, fetcher.clone());
        // Install-equivalent warm-up of the shell document.
        agent.handle(&InterceptRequest::get("https://hub.example.org/")).await;

        fetcher.go_offline();
        let outcome = agent.handle(&InterceptRequest::navigation("https://hub.example.org/tasks/42")).await;
        let InterceptOutcome::Response(response) = outcome else {
            panic!("expected a response");
        };
        assert_eq!(response.served_from, ServedFrom::ShellFallback);
        assert_eq!(response.body, b"<html>shell</html>");
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_offline_resource_gets_synthetic_not_found() {
        let db = active_db().await;
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.go_offline();

        let agent = interceptor(db, fetcher);
        let outcome = agent.handle(&InterceptRequest::get("https://hub.example.org/avatar.png")).await;
        let InterceptOutcome::Response(response) = outcome else {
            panic!("expected a response");
        };
        assert_eq!(response.served_from, ServedFrom::SyntheticNotFound);
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_offline_navigation_without_shell_degrades_to_not_found() {
        let db = active_db().await;
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.go_offline();

        let agent = interceptor(db, fetcher);
        let outcome = agent.handle(&InterceptRequest::navigation("https://hub.example.org/tasks")).await;
        let InterceptOutcome::Response(response) = outcome else {
            panic!("expected a response");
        };
        assert_eq!(response.served_from, ServedFrom::SyntheticNotFound);
    }

    #[tokio::test]
    async fn test_cross_origin_success_is_cached() {
        let db = active_db().await;
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.respond("https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.js", 200, b"chart");

        let agent = interceptor(db.clone(), fetcher);
        agent
            .handle(&InterceptRequest::get("https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.js"))
            .await;

        let key = compute_entry_key("GET", "https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.js");
        assert!(db.get_live(&key).await.unwrap().is_some());
    }
}
