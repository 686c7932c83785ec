//! The interception agent for gatehouse.
//!
//! A single background task per installation sits between every page
//! session's network call and the actual network. It keeps the cache warm
//! from live traffic, serves cached responses when the network is gone,
//! and guarantees the application shell stays servable fully offline.

pub mod fetch;
pub mod intercept;
pub mod lifecycle;
pub mod manifest;
pub mod url;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use fetch::{FetchConfig, FetchedResponse, Fetcher, HttpFetcher};
pub use intercept::{InterceptOutcome, InterceptRequest, InterceptedResponse, Interceptor, RequestMode, ServedFrom};
pub use lifecycle::AgentState;
pub use worker::{Agent, AgentConfig, AgentEvent, AgentHandle};
