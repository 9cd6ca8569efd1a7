//! Id and timestamp utilities shared across the workspace.

use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Milliseconds since the UNIX epoch, used for `Decision::metadata.evaluatedAt` and
/// TTL bookkeeping throughout the caches.
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64
}

/// Generate a fresh correlation id when the caller did not supply one.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}
