//! yeet library -- a minimal HTTP file relay.
//!
//! Clients upload a file with POST/PUT and get back a short URL; anyone
//! holding the URL can download the file with GET.  This crate provides
//! the request router, key generation (slug or UUID), filename and type
//! inference, and pluggable blob store backends.

use std::sync::Arc;

pub mod config;
pub mod errors;
pub mod keys;
pub mod metrics;
pub mod resolve;
pub mod server;
pub mod storage;

use crate::config::Config;
use crate::keys::KeyGenerator;
use crate::storage::backend::BlobStore;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Blob store holding uploaded bodies and their metadata.
    pub storage: Arc<dyn BlobStore>,
    /// Active key strategy.
    pub keys: Arc<dyn KeyGenerator>,
}
