//! `Reporter` backed by `tracing`.
//!
//! The first report for a key is logged at `warn` level; every later report
//! for the same key drops to `debug`.  Keys are remembered for the lifetime of
//! the reporter.

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::application::report::Reporter;

/// Logs each anomaly prominently once.
#[derive(Debug, Default)]
pub struct TracingReporter {
    seen: Mutex<HashSet<String>>,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key` and returns `true` if it had not been seen before.
    fn first_sighting(&self, key: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.insert(key.to_string())
    }

    /// Keys reported so far, sorted.
    pub fn reported_keys(&self) -> Vec<String> {
        let seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = seen.iter().cloned().collect();
        keys.sort();
        keys
    }
}

impl Reporter for TracingReporter {
    fn report_once(&self, key: &str, message: &str) {
        if self.first_sighting(key) {
            warn!(key, "{message}");
        } else {
            debug!(key, "{message}");
        }
    }
}
