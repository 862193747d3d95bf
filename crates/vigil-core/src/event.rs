#![forbid(unsafe_code)]

//! Change events handed to observation callbacks.

use serde::{Deserialize, Serialize};
use web_time::SystemTime;

use crate::path;

/// One observed mutation or access, stamped at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Full path of the affected property: `parent.prop`, or the bare
    /// property name at the root.
    pub path: String,
    /// Wall-clock creation time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl ChangeEvent {
    /// Build an event for `prop` under `parent_path`, stamped now.
    #[must_use]
    pub fn new(prop: &str, parent_path: &str) -> Self {
        Self {
            path: path::join_key(parent_path, prop),
            timestamp_ms: now_ms(),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
