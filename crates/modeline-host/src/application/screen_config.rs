//! Current screen size and refresh rate, from the server's static size list.
//!
//! The static list is the RandR 1.0 view of the screen: a table of sizes,
//! each with its own refresh rates, and the index of the one in use.  It is
//! distinct from the modes this host synthesizes, although on most servers a
//! synthesized mode shows up in the table once it is attached to the output.

use std::collections::BTreeMap;

use modeline_core::vertical_refresh_hz;
use tracing::{debug, info};

use super::display_server::{DisplayError, DisplayServer};
use super::error::ResizeError;
use super::report::{keys, Reporter};

/// Reads and switches the static screen configuration.
pub struct ScreenConfigController<'a> {
    display: &'a dyn DisplayServer,
    reporter: &'a dyn Reporter,
}

impl<'a> ScreenConfigController<'a> {
    pub fn new(display: &'a dyn DisplayServer, reporter: &'a dyn Reporter) -> Self {
        Self { display, reporter }
    }

    /// Sizes in the static list, in server order.
    pub fn list_sizes(&self) -> Result<Vec<(u32, u32)>, ResizeError> {
        let cfg = self.display.screen_config()?;
        Ok(cfg.sizes.iter().map(|s| (s.width, s.height)).collect())
    }

    /// The size currently in use.
    ///
    /// Servers that list no static sizes (headless, compositor-backed) still
    /// have a root window; its raw pixel dimensions are returned instead.
    pub fn current_size(&self) -> Result<(u32, u32), ResizeError> {
        let cfg = self.display.screen_config()?;
        if cfg.sizes.is_empty() {
            self.reporter.report_once(
                keys::NO_STATIC_SIZES,
                "display lists no screen sizes, using root window dimensions",
            );
            return Ok(self.display.root_dimensions()?);
        }
        match cfg.current_size() {
            Some(size) => Ok(size),
            None => {
                debug!(index = ?cfg.current_index, "current size index not in size list");
                Ok(self.display.root_dimensions()?)
            }
        }
    }

    /// Switches to `width`×`height` at the first rate listed for that size.
    ///
    /// # Errors
    ///
    /// - [`ResizeError::SizeNotFound`] if the size is not listed; no further
    ///   server call is made in that case.
    /// - [`ResizeError::ConfigurationApplyFailed`] if the server refuses.
    pub fn set_size(&self, width: u32, height: u32) -> Result<(), ResizeError> {
        let cfg = self.display.screen_config()?;
        let index = cfg
            .position(width, height)
            .ok_or(ResizeError::SizeNotFound { width, height })?;
        // A rate of 0 leaves the refresh rate to the server.
        let rate = cfg.sizes[index].rates.first().copied().unwrap_or(0);

        self.display
            .apply_screen_config(index, rate)
            .map_err(|source| match source {
                DisplayError::NoContext => ResizeError::NoContext,
                source => ResizeError::ConfigurationApplyFailed {
                    width,
                    height,
                    source,
                },
            })?;
        info!(width, height, rate, "screen size applied");
        Ok(())
    }

    /// Vertical refresh of every active output, keyed by output name.
    pub fn per_output_refresh_rates(&self) -> Result<BTreeMap<String, u32>, ResizeError> {
        let modes = self.display.active_output_modes()?;
        Ok(modes
            .into_iter()
            .filter_map(|m| {
                vertical_refresh_hz(m.dot_clock_hz, m.h_total, m.v_total).map(|hz| (m.output, hz))
            })
            .collect())
    }

    /// The effective refresh rate.
    ///
    /// The slowest active output wins when per-output data is available,
    /// since that reflects the modes actually driving the outputs.  Otherwise
    /// the static configuration's nominal rate is used.
    pub fn refresh_rate(&self) -> Result<u32, ResizeError> {
        match self.per_output_refresh_rates() {
            Ok(rates) => {
                if let Some(min) = rates.values().min() {
                    return Ok(*min);
                }
            }
            Err(e) => debug!("per-output refresh unavailable, using static rate: {e}"),
        }
        let cfg = self.display.screen_config()?;
        Ok(u32::from(cfg.current_rate))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::display_server::ActiveOutputMode;
    use crate::application::report::MockReporter;
    use crate::infrastructure::display_server::mock::{DisplayCall, MockDisplayServer};

    fn quiet_reporter() -> MockReporter {
        let mut reporter = MockReporter::new();
        reporter.expect_report_once().return_const(());
        reporter
    }

    #[test]
    fn test_list_sizes_returns_static_table_in_order() {
        let display = MockDisplayServer::virtual_1080p();
        let reporter = quiet_reporter();
        let controller = ScreenConfigController::new(&display, &reporter);

        let sizes = controller.list_sizes().expect("sizes");

        assert_eq!(sizes, vec![(1920, 1080), (1280, 720), (1024, 768)]);
    }

    #[test]
    fn test_current_size_reads_current_index() {
        let display = MockDisplayServer::virtual_1080p();
        let reporter = quiet_reporter();
        let controller = ScreenConfigController::new(&display, &reporter);

        assert_eq!(controller.current_size().expect("size"), (1920, 1080));
    }

    #[test]
    fn test_current_size_without_static_sizes_falls_back_to_root_dimensions() {
        // Arrange
        let display = MockDisplayServer::headless();
        let mut reporter = MockReporter::new();
        reporter
            .expect_report_once()
            .withf(|key, _| key == keys::NO_STATIC_SIZES)
            .times(1)
            .return_const(());
        let controller = ScreenConfigController::new(&display, &reporter);

        // Act
        let size = controller.current_size();

        // Assert
        assert_eq!(size.expect("fallback is not an error"), (5120, 3200));
    }

    #[test]
    fn test_set_size_applies_first_rate_of_listed_size() {
        // Arrange
        let display = MockDisplayServer::virtual_1080p();
        let reporter = quiet_reporter();
        let controller = ScreenConfigController::new(&display, &reporter);

        // Act
        controller.set_size(1280, 720).expect("set");

        // Assert
        assert!(display.calls().contains(&DisplayCall::ApplyScreenConfig {
            size_index: 1,
            rate: 60
        }));
        assert_eq!(controller.current_size().expect("size"), (1280, 720));
    }

    #[test]
    fn test_set_size_unknown_size_only_reads_configuration() {
        // Arrange
        let display = MockDisplayServer::virtual_1080p();
        let reporter = quiet_reporter();
        let controller = ScreenConfigController::new(&display, &reporter);

        // Act
        let result = controller.set_size(1000, 700);

        // Assert
        assert!(matches!(
            result,
            Err(ResizeError::SizeNotFound {
                width: 1000,
                height: 700
            })
        ));
        assert_eq!(display.calls(), vec![DisplayCall::ScreenConfig]);
    }

    #[test]
    fn test_set_size_rejected_by_server_is_configuration_apply_failed() {
        let mut display = MockDisplayServer::virtual_1080p();
        display.fail_apply = true;
        let reporter = quiet_reporter();
        let controller = ScreenConfigController::new(&display, &reporter);

        let result = controller.set_size(1024, 768);

        assert!(matches!(
            result,
            Err(ResizeError::ConfigurationApplyFailed { width: 1024, .. })
        ));
        assert_eq!(controller.current_size().expect("size"), (1920, 1080));
    }

    #[test]
    fn test_refresh_rate_prefers_slowest_active_output() {
        // Arrange: static table says 60 Hz, outputs run at 60 and 50 Hz
        let mut display = MockDisplayServer::virtual_1080p();
        display.active_modes.push(ActiveOutputMode {
            output: "DUMMY1".to_string(),
            dot_clock_hz: 145_451_600,
            h_total: 2534,
            v_total: 1148,
        });
        let reporter = quiet_reporter();
        let controller = ScreenConfigController::new(&display, &reporter);

        // Act
        let rates = controller.per_output_refresh_rates().expect("rates");
        let rate = controller.refresh_rate().expect("rate");

        // Assert
        assert_eq!(rates.get("DUMMY0"), Some(&60));
        assert_eq!(rates.get("DUMMY1"), Some(&50));
        assert_eq!(rate, 50);
    }

    #[test]
    fn test_refresh_rate_without_active_outputs_uses_static_rate() {
        let mut display = MockDisplayServer::virtual_1080p();
        display.active_modes.clear();
        display.config.lock().unwrap().current_rate = 75;
        let reporter = quiet_reporter();
        let controller = ScreenConfigController::new(&display, &reporter);

        assert_eq!(controller.refresh_rate().expect("rate"), 75);
    }

    #[test]
    fn test_per_output_refresh_skips_disabled_frames() {
        let mut display = MockDisplayServer::virtual_1080p();
        display.active_modes.push(ActiveOutputMode {
            output: "DUMMY2".to_string(),
            dot_clock_hz: 0,
            h_total: 0,
            v_total: 0,
        });
        let reporter = quiet_reporter();
        let controller = ScreenConfigController::new(&display, &reporter);

        let rates = controller.per_output_refresh_rates().expect("rates");

        assert!(!rates.contains_key("DUMMY2"));
    }
}
