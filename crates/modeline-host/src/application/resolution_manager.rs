//! ResolutionManager: the host-facing resize façade.
//!
//! # Resize flow
//!
//! ```text
//! resize_to(w, h)
//!  ├─ (w, h) in static size list?  ── yes ──► set_size(w, h)
//!  └─ no
//!      ├─ cached?  ── yes ──► reuse the mode already created
//!      └─ no ──► synthesize ─► create ─► attach ─► cache ─► evict oldest?
//!      └─► set_size(w, h)
//! ```
//!
//! The manager owns the bounded cache of modes it created.  Everything that
//! reaches the server goes through the `ModeRegistrar` and the
//! `ScreenConfigController`, which only borrow the display connection for the
//! duration of one call.
//!
//! # Error policy
//!
//! Server failures never escape as panics.  Operations where the caller
//! needs the reason (`set_size`, `resize_to`, `try_add_size`,
//! `remove_size`) return `Result<_, ResizeError>`; plain queries return
//! `Option` or an empty collection and log the cause.

use std::collections::BTreeMap;
use std::sync::Arc;

use modeline_core::{synthesize, CacheError, ModeCache, ModeKey, DEFAULT_MAX_NEW_MODES};
use tracing::{debug, info, warn};

use super::capability::Capability;
use super::display_server::DisplayServer;
use super::error::ResizeError;
use super::mode_registrar::{AddedMode, ModeRegistrar};
use super::report::{keys, Reporter};
use super::screen_config::ScreenConfigController;

/// Settings the manager is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeSettings {
    /// Master switch for every mutating operation.
    pub enabled: bool,
    /// Capacity of the synthesized-mode cache (≥ 2).
    pub max_new_modes: usize,
}

impl Default for ResizeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_new_modes: DEFAULT_MAX_NEW_MODES,
        }
    }
}

/// Dynamic resolution manager for one display connection.
pub struct ResolutionManager {
    display: Arc<dyn DisplayServer>,
    reporter: Arc<dyn Reporter>,
    capability: Capability,
    enabled: bool,
    added: ModeCache<AddedMode>,
}

impl ResolutionManager {
    /// Builds the manager and runs the capability probe exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::CapacityTooSmall`] if `settings.max_new_modes < 2`.
    pub fn new(
        display: Arc<dyn DisplayServer>,
        reporter: Arc<dyn Reporter>,
        settings: ResizeSettings,
    ) -> Result<Self, CacheError> {
        let added = ModeCache::new(settings.max_new_modes)?;
        let capability = Capability::probe(display.as_ref(), reporter.as_ref());
        info!(
            usable = capability.is_usable(),
            enabled = settings.enabled,
            max_new_modes = settings.max_new_modes,
            "{}",
            capability.describe()
        );
        Ok(Self {
            display,
            reporter,
            capability,
            enabled: settings.enabled,
            added,
        })
    }

    /// Result of the startup probe.
    pub fn has_capability(&self) -> bool {
        self.capability.is_usable()
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// `true` when resize operations will be attempted at all.
    pub fn can_resize(&self) -> bool {
        self.enabled && self.has_capability()
    }

    fn ensure_resizable(&self) -> Result<(), ResizeError> {
        if !self.enabled {
            return Err(ResizeError::Disabled);
        }
        if !self.has_capability() {
            return Err(ResizeError::ExtensionUnavailable);
        }
        Ok(())
    }

    fn screen_config(&self) -> ScreenConfigController<'_> {
        ScreenConfigController::new(self.display.as_ref(), self.reporter.as_ref())
    }

    /// Current screen size, or `None` if the server could not be queried.
    ///
    /// Without RandR the root window dimensions are returned directly.
    pub fn current_size(&self) -> Option<(u32, u32)> {
        let result = if self.capability.version.is_none() {
            self.display.root_dimensions().map_err(ResizeError::from)
        } else {
            self.screen_config().current_size()
        };
        result
            .map_err(|e| warn!("failed to read current screen size: {e}"))
            .ok()
    }

    /// Static sizes the server lists (empty on failure).
    pub fn list_sizes(&self) -> Vec<(u32, u32)> {
        if self.capability.version.is_none() {
            return Vec::new();
        }
        self.screen_config()
            .list_sizes()
            .unwrap_or_else(|e| {
                warn!("failed to list screen sizes: {e}");
                Vec::new()
            })
    }

    /// Switches to a size from the static list.
    ///
    /// # Errors
    ///
    /// [`ResizeError::SizeNotFound`] if the size is not listed (try
    /// [`add_size`](Self::add_size) or [`resize_to`](Self::resize_to)), or
    /// [`ResizeError::ConfigurationApplyFailed`] if the server refuses.
    pub fn set_size(&self, width: u32, height: u32) -> Result<(), ResizeError> {
        self.ensure_resizable()?;
        self.screen_config().set_size(width, height)
    }

    /// Makes `width`×`height` available as a mode, synthesizing it if needed.
    ///
    /// Returns the size that was registered, or `None` after logging why it
    /// could not be.
    pub fn add_size(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        match self.try_add_size(width, height) {
            Ok(size) => Some(size),
            Err(e) => {
                warn!(width, height, "cannot add screen size: {e}");
                None
            }
        }
    }

    /// Like [`add_size`](Self::add_size) but returns the reason on failure.
    ///
    /// A size that is already cached is reused without any server call.  A
    /// size the server already lists is returned as-is: modes are named
    /// `"{w}x{h}"` and the server refuses a second mode with the same name.
    pub fn try_add_size(&mut self, width: u32, height: u32) -> Result<(u32, u32), ResizeError> {
        self.ensure_resizable()?;
        let key = ModeKey::new(width, height);
        if self.added.contains(&key) {
            debug!(%key, "reusing synthesized mode");
            return Ok(key.size());
        }
        if self.screen_config().list_sizes()?.contains(&key.size()) {
            debug!(%key, "size already listed by the server");
            return Ok(key.size());
        }

        let timing = synthesize(width, height)?;
        let registrar = ModeRegistrar::new(self.display.as_ref());
        let handle = registrar.create(&timing)?;
        let mut mode = AddedMode::new(handle, timing);

        let attached = registrar
            .active_output()
            .and_then(|output| registrar.attach(&mut mode, output));
        match attached {
            Ok(()) => {}
            Err(e @ ResizeError::MultipleOutputsUnsupported { .. }) => {
                self.reporter
                    .report_once(keys::MULTIPLE_OUTPUTS, &format!("{e}; new modes stay unattached"));
            }
            Err(e @ ResizeError::NoActiveOutput) => {
                self.reporter
                    .report_once(keys::NO_OUTPUT, &format!("{e}; new modes stay unattached"));
            }
            Err(e) => {
                if let Err(release) = registrar.destroy(mode) {
                    warn!(%key, "failed to release unattached mode: {release}");
                }
                return Err(e);
            }
        }

        info!(%key, modeline = %mode.timing.modeline(), attached = mode.is_attached(), "added mode");
        if let Some(replaced) = self.added.put(key, mode) {
            release(&registrar, key, replaced);
        }
        if let Some((old_key, evicted)) = self.added.evict_if_needed() {
            release(&registrar, old_key, evicted);
        }
        Ok(key.size())
    }

    /// Detaches and destroys the mode synthesized for `width`×`height`.
    ///
    /// Returns `Ok(false)` without touching the server when no such mode was
    /// added.  The cache entry is gone even if the release fails.
    pub fn remove_size(&mut self, width: u32, height: u32) -> Result<bool, ResizeError> {
        let key = ModeKey::new(width, height);
        let Some(mode) = self.added.remove(&key) else {
            debug!(%key, "remove_size: not a synthesized mode");
            return Ok(false);
        };
        ModeRegistrar::new(self.display.as_ref()).destroy(mode)?;
        info!(%key, "removed mode");
        Ok(true)
    }

    /// Switches to `width`×`height`, synthesizing a mode when the size is not
    /// in the static list.
    ///
    /// Returns the size now in use.
    pub fn resize_to(&mut self, width: u32, height: u32) -> Result<(u32, u32), ResizeError> {
        match self.set_size(width, height) {
            Ok(()) => return Ok((width, height)),
            Err(ResizeError::SizeNotFound { .. }) => {
                debug!(width, height, "size not listed, synthesizing a mode");
            }
            Err(e) => return Err(e),
        }
        self.try_add_size(width, height)?;
        self.set_size(width, height)?;
        Ok((width, height))
    }

    /// Effective refresh rate in Hz, or `None` if it cannot be determined.
    pub fn refresh_rate(&self) -> Option<u32> {
        if self.capability.version.is_none() {
            return None;
        }
        self.screen_config()
            .refresh_rate()
            .map_err(|e| warn!("failed to read refresh rate: {e}"))
            .ok()
    }

    /// Refresh rate of each active output, keyed by output name.
    pub fn per_output_refresh_rates(&self) -> BTreeMap<String, u32> {
        if self.capability.version.is_none() {
            return BTreeMap::new();
        }
        self.screen_config()
            .per_output_refresh_rates()
            .unwrap_or_else(|e| {
                warn!("failed to read per-output refresh rates: {e}");
                BTreeMap::new()
            })
    }

    /// Synthesized sizes currently cached, oldest first.
    pub fn cached_sizes(&self) -> Vec<(u32, u32)> {
        self.added.keys().map(|k| k.size()).collect()
    }

    /// Detaches and destroys every synthesized mode.
    ///
    /// Returns the number of modes whose release failed.
    pub fn release_all(&mut self) -> usize {
        let registrar = ModeRegistrar::new(self.display.as_ref());
        let mut failures = 0;
        for (key, mode) in self.added.drain() {
            if !release(&registrar, key, mode) {
                failures += 1;
            }
        }
        failures
    }

    /// RandR `(major, minor)` version found by the probe.
    pub fn extension_version(&self) -> Option<(u32, u32)> {
        self.capability.version
    }

    pub fn screen_count(&self) -> Option<u32> {
        self.display
            .screen_count()
            .map_err(|e| warn!("failed to read screen count: {e}"))
            .ok()
    }

    /// Physical size of the default screen in millimetres.
    pub fn physical_size_mm(&self) -> Option<(u32, u32)> {
        self.display
            .physical_size_mm()
            .map_err(|e| warn!("failed to read physical screen size: {e}"))
            .ok()
    }
}

/// Detaches and destroys `mode`, logging instead of propagating failure.
fn release(registrar: &ModeRegistrar<'_>, key: ModeKey, mode: AddedMode) -> bool {
    match registrar.destroy(mode) {
        Ok(()) => true,
        Err(e) => {
            warn!(%key, "failed to release mode, server-side mode may leak: {e}");
            false
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
