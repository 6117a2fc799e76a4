//! # modeline-core
//!
//! Pure mode-timing arithmetic and the bounded cache of synthesized modes used
//! by `modeline-host` to expose arbitrary resolutions on a display server that
//! only knows a fixed list of modes.
//!
//! This crate has zero dependencies on OS APIs or the display server itself,
//! so everything in it can be tested on any platform.
//!
//! # What is a modeline? (for beginners)
//!
//! A monitor does not only need to know "1920×1080".  It also needs to know
//! how fast pixels are clocked out and how long the invisible *blanking*
//! intervals around each line and each frame last.  Together those numbers
//! are called a **modeline**:
//!
//! ```text
//!  "1920x1080" 145.45  1920 2054 2246 2534  1080 1081 1084 1148
//!   name       MHz     active/sync-start/sync-end/total (horizontal, vertical)
//! ```
//!
//! The display server refuses to create a mode whose pixel clock would push
//! the horizontal or vertical sync frequency outside of what a monitor can
//! accept.  [`synthesize`] picks the clock closest to 50 Hz that satisfies all
//! of those limits at once, or reports that none exists.
//!
//! - **`domain::mode`** – [`ModeKey`] and the immutable [`ModeTiming`] record.
//! - **`domain::timing`** – the timing synthesizer and its constants.
//! - **`domain::cache`** – [`ModeCache`], insertion-ordered with oldest-first
//!   eviction.

pub mod domain;

pub use domain::cache::{CacheError, ModeCache, DEFAULT_MAX_NEW_MODES, MIN_MAX_NEW_MODES};
pub use domain::mode::{vertical_refresh_hz, ModeKey, ModeKeyParseError, ModeTiming};
pub use domain::timing::{clock_range, synthesize, ClockRange, ImpossibleReason, TimingError};
