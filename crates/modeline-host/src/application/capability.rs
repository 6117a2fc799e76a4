//! One-shot RandR capability probe.
//!
//! Presence of the extension alone is not enough.  Xvfb and several
//! compositor-backed servers advertise RandR but list zero sizes, and any
//! attempt to switch or synthesize modes on them fails.  The probe therefore
//! requires all three of:
//!
//! - the extension is present,
//! - its protocol version is at least 1.2 (output/mode management),
//! - the static size list is non-empty.
//!
//! The result is computed once when the `ResolutionManager` is built and
//! never re-queried.

use tracing::{debug, warn};

use super::display_server::DisplayServer;
use super::report::{keys, Reporter};

/// Oldest RandR protocol version with output and mode management.
pub const MIN_RANDR_VERSION: (u32, u32) = (1, 2);

/// Outcome of the startup probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    /// `(major, minor)` version, `None` when the extension is missing.
    pub version: Option<(u32, u32)>,
    /// Number of entries in the static size list at probe time.
    pub static_sizes: usize,
}

impl Capability {
    /// Queries the server once and reports an unusable extension through
    /// `reporter`.
    ///
    /// Query failures count as "not available"; the probe itself never fails.
    pub fn probe(display: &dyn DisplayServer, reporter: &dyn Reporter) -> Self {
        let version = display.query_version().unwrap_or_else(|e| {
            warn!("RandR version query failed: {e}");
            None
        });

        let static_sizes = match version {
            Some(_) => match display.screen_config() {
                Ok(cfg) => cfg.sizes.len(),
                Err(e) => {
                    warn!("RandR screen configuration query failed: {e}");
                    0
                }
            },
            None => 0,
        };

        let capability = Self {
            version,
            static_sizes,
        };
        debug!(?capability, "RandR probe complete");

        if !capability.is_usable() {
            reporter.report_once(keys::RANDR_UNUSABLE, &capability.describe());
        }
        capability
    }

    /// `true` when resizing and mode synthesis may be attempted.
    pub fn is_usable(&self) -> bool {
        matches!(self.version, Some(v) if v >= MIN_RANDR_VERSION) && self.static_sizes > 0
    }

    /// One-line human-readable summary.
    pub fn describe(&self) -> String {
        match self.version {
            None => "RandR extension not present; resizing disabled".to_string(),
            Some((major, minor)) if (major, minor) < MIN_RANDR_VERSION => format!(
                "RandR {major}.{minor} is older than {}.{}; resizing disabled",
                MIN_RANDR_VERSION.0, MIN_RANDR_VERSION.1
            ),
            Some((major, minor)) if self.static_sizes == 0 => format!(
                "RandR {major}.{minor} reports no screen sizes; resizing disabled"
            ),
            Some((major, minor)) => format!(
                "RandR {major}.{minor} with {} screen sizes",
                self.static_sizes
            ),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
