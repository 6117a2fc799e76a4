//! Timing synthesis for arbitrary resolutions.
//!
//! A simplified CVT-style generator: blanking intervals are fixed fractions of
//! the active area, and the pixel clock is chosen so the refresh rate lands as
//! close to [`IDEAL_VSYNC_HZ`] as the monitor-class limits allow.
//!
//! # The constraint window (for beginners)
//!
//! For a frame of `x_total × y_total` pixels (active area plus blanking) the
//! pixel clock determines both sync frequencies:
//!
//! ```text
//! horizontal sync = clock / x_total
//! vertical sync   = clock / (x_total · y_total)
//! ```
//!
//! Each frequency has a minimum and a maximum, and the clock itself has a
//! ceiling.  That gives a window `[min_clock, max_clock]`.  Very small or very
//! large resolutions can produce an empty window, in which case no mode can
//! be created for them and [`TimingError::ImpossibleMode`] is returned.

use std::fmt;

use thiserror::Error;
use tracing::debug;

use super::mode::{ModeKey, ModeTiming};

/// Highest pixel clock the synthesized modes may use.
pub const MAX_PIXEL_CLOCK_HZ: u64 = 230_000_000;
/// Lowest acceptable horizontal sync frequency.
pub const MIN_HSYNC_HZ: u64 = 10_000;
/// Highest acceptable horizontal sync frequency.
pub const MAX_HSYNC_HZ: u64 = 300_000;
/// Lowest acceptable vertical refresh.
pub const MIN_VSYNC_HZ: u64 = 10;
/// Highest acceptable vertical refresh.
pub const MAX_VSYNC_HZ: u64 = 300;
/// Refresh rate the synthesizer aims for before clamping.
pub const IDEAL_VSYNC_HZ: u64 = 50;

// Horizontal blanking as whole percentages of the active width.
const H_FRONT_PERCENT: u64 = 7;
const H_SYNC_PERCENT: u64 = 10;
const H_BACK_PERCENT: u64 = 15;

// Vertical blanking: fixed front porch and sync, back porch as a percentage.
const V_FRONT_LINES: u64 = 1;
const V_SYNC_LINES: u64 = 3;
const V_BACK_PERCENT: u64 = 6;

// No interlace or doublescan.
const Y_FACTOR: u64 = 1;

/// Closed interval of pixel clocks that satisfies every limit for one frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockRange {
    pub min_hz: u64,
    pub max_hz: u64,
}

impl ClockRange {
    /// `true` when no clock satisfies all constraints simultaneously.
    pub fn is_empty(&self) -> bool {
        self.min_hz > self.max_hz
    }

    /// `true` if `hz` lies inside the window.
    pub fn contains(&self, hz: u64) -> bool {
        self.min_hz <= hz && hz <= self.max_hz
    }
}

impl fmt::Display for ClockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} Hz, {} Hz]", self.min_hz, self.max_hz)
    }
}

/// Why a size could not be turned into a valid timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpossibleReason {
    /// The minimum admissible clock exceeds the maximum.
    EmptyClockRange(ClockRange),
    /// The floored blanking fractions collapse a sync or back-porch interval
    /// to zero pixels (widths below 10 or heights below 17).
    BlankingTooNarrow,
    /// A timing value does not fit the server's 32-bit fields.
    OutOfRange,
}

impl fmt::Display for ImpossibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyClockRange(range) => {
                write!(f, "minimum clock exceeds maximum clock {range}")
            }
            Self::BlankingTooNarrow => f.write_str("blanking intervals collapse to zero width"),
            Self::OutOfRange => f.write_str("timing exceeds 32-bit protocol fields"),
        }
    }
}

/// Error type for timing synthesis.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimingError {
    /// Width or height is zero.
    #[error("cannot synthesize a mode for {width}x{height}: zero dimension")]
    ZeroDimension { width: u32, height: u32 },

    /// No timing satisfies the monitor constraints for this size.
    ///
    /// This is a reported, non-fatal condition: the caller keeps its
    /// previous resolution.
    #[error("impossible mode {width}x{height}: {reason}")]
    ImpossibleMode {
        width: u32,
        height: u32,
        reason: ImpossibleReason,
    },
}

/// Computes the admissible pixel-clock window for a frame of
/// `x_total × y_total` pixels.
pub fn clock_range(x_total: u64, y_total: u64) -> ClockRange {
    let frame = x_total.saturating_mul(y_total).saturating_mul(Y_FACTOR);
    let max_hz = MAX_PIXEL_CLOCK_HZ
        .min(MAX_HSYNC_HZ.saturating_mul(x_total))
        .min(MAX_VSYNC_HZ.saturating_mul(frame));
    let min_hz = MIN_HSYNC_HZ
        .saturating_mul(x_total)
        .max(MIN_VSYNC_HZ.saturating_mul(frame));
    ClockRange { min_hz, max_hz }
}

/// Synthesizes a complete [`ModeTiming`] for `width`×`height`.
///
/// # Errors
///
/// - [`TimingError::ZeroDimension`] if either dimension is zero.
/// - [`TimingError::ImpossibleMode`] if no clock satisfies every constraint,
///   or if the blanking intervals would be degenerate.
///
/// # Example
///
/// ```
/// let timing = modeline_core::synthesize(1920, 1080).unwrap();
/// assert_eq!(timing.h_total, 2534);
/// assert_eq!(timing.v_total, 1148);
/// assert_eq!(timing.pixel_clock_hz, 145_451_600);
/// ```
pub fn synthesize(width: u32, height: u32) -> Result<ModeTiming, TimingError> {
    if width == 0 || height == 0 {
        return Err(TimingError::ZeroDimension { width, height });
    }
    let impossible = |reason| TimingError::ImpossibleMode {
        width,
        height,
        reason,
    };

    let w = u64::from(width);
    let h = u64::from(height);

    let x_front = w * H_FRONT_PERCENT / 100;
    let x_sync = w * H_SYNC_PERCENT / 100;
    let x_back = w * H_BACK_PERCENT / 100;
    let x_total = w + x_front + x_sync + x_back;

    let y_back = h * V_BACK_PERCENT / 100;
    let y_total = h + V_FRONT_LINES + V_SYNC_LINES + y_back;

    let range = clock_range(x_total, y_total);
    if range.is_empty() {
        debug!(%width, %height, %range, "no admissible pixel clock");
        return Err(impossible(ImpossibleReason::EmptyClockRange(range)));
    }
    if x_sync == 0 || x_back == 0 || y_back == 0 {
        return Err(impossible(ImpossibleReason::BlankingTooNarrow));
    }

    let ideal = IDEAL_VSYNC_HZ * x_total * y_total * Y_FACTOR;
    let pixel_clock_hz = ideal.clamp(range.min_hz, range.max_hz);

    let field = |value: u64| {
        u32::try_from(value).map_err(|_| impossible(ImpossibleReason::OutOfRange))
    };
    let h_sync_start = field(w + x_front)?;
    let h_sync_end = field(w + x_front + x_sync)?;
    let h_total = field(x_total)?;
    let v_sync_start = field(h + V_FRONT_LINES)?;
    let v_sync_end = field(h + V_FRONT_LINES + V_SYNC_LINES)?;
    let v_total = field(y_total)?;

    debug!(
        %width,
        %height,
        pixel_clock_hz,
        ideal,
        %range,
        "synthesized mode timing"
    );

    Ok(ModeTiming {
        width,
        height,
        pixel_clock_hz,
        h_sync_start,
        h_sync_end,
        h_total,
        v_sync_start,
        v_sync_end,
        v_total,
        name: ModeKey::new(width, height).to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
