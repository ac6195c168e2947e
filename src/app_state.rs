//! Shared application state for the Actix-web server and the worker.

use crate::config::Config;
use crate::http_client::EnhancedHttpClient;
use crate::queue::JobQueue;
use rusqlite::Connection;
use std::sync::Mutex;

/// Wrapped in `web::Data` and shared by all HTTP handlers and the worker
/// loop. The single SQLite connection is serialized behind a mutex; the
/// queue and HTTP client are internally thread-safe.
pub struct AppState {
    pub db: Mutex<Connection>,
    pub fetcher: EnhancedHttpClient,
    pub queue: JobQueue,
    pub config: Config,
}
