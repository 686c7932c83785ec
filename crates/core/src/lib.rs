//! Core types and shared functionality for gatehouse.
//!
//! This crate provides:
//! - Generation-scoped response cache with SQLite backend
//! - Unified error types
//! - Layered application configuration
//! - Process-wide connectivity state

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;

pub use cache::{CacheDb, Generation, StoredResponse};
pub use config::AppConfig;
pub use connectivity::ConnectivityMonitor;
pub use error::Error;
