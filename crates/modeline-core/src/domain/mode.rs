//! Mode keys and timing records.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A requested resolution; the cache key for synthesized modes.
///
/// Displays and parses as `"{width}x{height}"`, which is also the name the
/// mode is registered under on the display server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModeKey {
    /// Active width in pixels.
    pub width: u32,
    /// Active height in pixels.
    pub height: u32,
}

impl ModeKey {
    /// Creates a key for `width`×`height`.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the key as a `(width, height)` tuple.
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for ModeKey {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

impl fmt::Display for ModeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Error returned when a `WIDTHxHEIGHT` string cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModeKeyParseError {
    /// The text is not two integers separated by `x`.
    #[error("expected WIDTHxHEIGHT (e.g. 1280x720), got {0:?}")]
    Format(String),

    /// One of the dimensions is zero.
    #[error("width and height must be positive, got {0:?}")]
    ZeroDimension(String),
}

impl FromStr for ModeKey {
    type Err = ModeKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (w, h) = trimmed
            .split_once(['x', 'X'])
            .ok_or_else(|| ModeKeyParseError::Format(s.to_string()))?;
        let width: u32 = w
            .trim()
            .parse()
            .map_err(|_| ModeKeyParseError::Format(s.to_string()))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|_| ModeKeyParseError::Format(s.to_string()))?;
        if width == 0 || height == 0 {
            return Err(ModeKeyParseError::ZeroDimension(s.to_string()));
        }
        Ok(Self::new(width, height))
    }
}

/// Complete timing descriptor for one mode.
///
/// Only produced by [`crate::synthesize`], which guarantees
/// `h_sync_start < h_sync_end < h_total`, `v_sync_start < v_sync_end < v_total`
/// and a pixel clock inside the constraint window for this size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeTiming {
    pub width: u32,
    pub height: u32,
    /// Dot clock in Hz.
    pub pixel_clock_hz: u64,
    pub h_sync_start: u32,
    pub h_sync_end: u32,
    pub h_total: u32,
    pub v_sync_start: u32,
    pub v_sync_end: u32,
    pub v_total: u32,
    /// Server-side mode name, always `"{width}x{height}"`.
    pub name: String,
}

impl ModeTiming {
    /// The cache key this timing was synthesized for.
    pub fn key(&self) -> ModeKey {
        ModeKey::new(self.width, self.height)
    }

    /// Vertical refresh rate this timing produces, rounded to whole Hz.
    pub fn refresh_hz(&self) -> Option<u32> {
        vertical_refresh_hz(self.pixel_clock_hz, self.h_total, self.v_total)
    }

    /// Renders the timing as an xorg.conf-style modeline body.
    ///
    /// ```
    /// let timing = modeline_core::synthesize(1920, 1080).unwrap();
    /// assert_eq!(
    ///     timing.modeline(),
    ///     "\"1920x1080\" 145.45 1920 2054 2246 2534 1080 1081 1084 1148"
    /// );
    /// ```
    pub fn modeline(&self) -> String {
        format!(
            "\"{}\" {:.2} {} {} {} {} {} {} {} {}",
            self.name,
            self.pixel_clock_hz as f64 / 1_000_000.0,
            self.width,
            self.h_sync_start,
            self.h_sync_end,
            self.h_total,
            self.height,
            self.v_sync_start,
            self.v_sync_end,
            self.v_total,
        )
    }
}

/// Computes `round(dot_clock / (h_total · v_total))`.
///
/// Returns `None` for a zero-sized frame, which the server reports for
/// disabled CRTCs.
pub fn vertical_refresh_hz(dot_clock_hz: u64, h_total: u32, v_total: u32) -> Option<u32> {
    let frame = u64::from(h_total) * u64::from(v_total);
    if frame == 0 {
        return None;
    }
    let hz = (dot_clock_hz + frame / 2) / frame;
    u32::try_from(hz).ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_key_displays_as_width_x_height() {
        assert_eq!(ModeKey::new(1280, 720).to_string(), "1280x720");
    }

    #[test]
    fn test_mode_key_parses_lower_and_upper_case_separator() {
        assert_eq!("1280x720".parse::<ModeKey>(), Ok(ModeKey::new(1280, 720)));
        assert_eq!(" 800X600 ".parse::<ModeKey>(), Ok(ModeKey::new(800, 600)));
    }

    #[test]
    fn test_mode_key_parse_rejects_missing_separator() {
        let result = "1280-720".parse::<ModeKey>();
        assert!(matches!(result, Err(ModeKeyParseError::Format(_))));
    }

    #[test]
    fn test_mode_key_parse_rejects_non_numeric_dimensions() {
        assert!(matches!(
            "widexhigh".parse::<ModeKey>(),
            Err(ModeKeyParseError::Format(_))
        ));
        assert!(matches!(
            "-5x10".parse::<ModeKey>(),
            Err(ModeKeyParseError::Format(_))
        ));
    }

    #[test]
    fn test_mode_key_parse_rejects_zero_dimension() {
        let result = "0x720".parse::<ModeKey>();
        assert!(matches!(result, Err(ModeKeyParseError::ZeroDimension(_))));
    }

    #[test]
    fn test_mode_keys_order_by_width_then_height() {
        let mut keys = vec![
            ModeKey::new(1024, 768),
            ModeKey::new(800, 600),
            ModeKey::new(1024, 600),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ModeKey::new(800, 600),
                ModeKey::new(1024, 600),
                ModeKey::new(1024, 768)
            ]
        );
    }

    #[test]
    fn test_vertical_refresh_rounds_to_nearest_hz() {
        // 148.5 MHz over the CEA 1080p frame (2200 × 1125) is exactly 60 Hz.
        assert_eq!(vertical_refresh_hz(148_500_000, 2200, 1125), Some(60));
        // 59.94 Hz rounds up.
        assert_eq!(vertical_refresh_hz(148_351_648, 2200, 1125), Some(60));
        // 74.6 Hz rounds up, 74.4 Hz rounds down.
        assert_eq!(vertical_refresh_hz(7_460, 10, 10), Some(75));
        assert_eq!(vertical_refresh_hz(7_440, 10, 10), Some(74));
    }

    #[test]
    fn test_vertical_refresh_of_empty_frame_is_none() {
        assert_eq!(vertical_refresh_hz(148_500_000, 0, 1125), None);
        assert_eq!(vertical_refresh_hz(148_500_000, 2200, 0), None);
    }
}
