//! Test support: a scripted fake network.

use crate::fetch::{FetchedResponse, Fetcher};
use async_trait::async_trait;
use bytes::Bytes;
use gatehouse_core::Error;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// A `Fetcher` that serves scripted routes and records every call.
///
/// Unknown URLs and anything fetched after `go_offline()` fail with a
/// transport error, which is how tests simulate a dead network.
pub(crate) struct FakeFetcher {
    routes: Mutex<HashMap<String, (u16, Vec<u8>)>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self { routes: Mutex::new(HashMap::new()), calls: Mutex::new(Vec::new()), offline: AtomicBool::new(false) }
    }

    /// Script a response for a URL.
    pub fn respond(&self, url: &str, status: u16, body: &[u8]) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, body.to_vec()));
    }

    /// Make every subsequent fetch fail at the transport level.
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    /// URLs fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResponse, Error> {
        self.calls.lock().unwrap().push(url.to_string());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network("connection refused".into()));
        }

        let routes = self.routes.lock().unwrap();
        match routes.get(url) {
            Some((status, body)) => Ok(FetchedResponse {
                url: url.to_string(),
                final_url: url.to_string(),
                status: *status,
                headers: vec![("content-type".into(), "application/octet-stream".into())],
                body: Bytes::from(body.clone()),
                fetch_ms: 1,
            }),
            None => Err(Error::Network(format!("no route for {url}"))),
        }
    }
}
