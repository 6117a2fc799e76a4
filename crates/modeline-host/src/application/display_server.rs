//! Boundary to the display server's resolution-management extension.
//!
//! The application layer only ever talks to the X server through the
//! [`DisplayServer`] trait.  The real implementation (`X11DisplayServer`,
//! Xlib + Xrandr) and an in-memory `MockDisplayServer` live in
//! `infrastructure::display_server`.
//!
//! # Resource ownership
//!
//! Query results that the server hands out as heap objects (screen
//! configuration, screen resources, output and CRTC info) never cross this
//! boundary: implementations copy what they need into the plain structs
//! below and release the native object before returning, on every path.
//!
//! Created modes are different.  They outlive the call that made them, so
//! they come back as a [`ModeHandle`] that is deliberately neither `Clone`
//! nor `Copy`: whoever holds it owns the server-side mode, and
//! [`DisplayServer::destroy_mode`] consumes it.

use std::fmt;

use modeline_core::ModeTiming;
use thiserror::Error;

/// Owned token for a mode created on the display server.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ModeHandle(u64);

impl ModeHandle {
    /// Wraps a raw server mode id.  Only display-server implementations
    /// should mint handles.
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// The raw server mode id.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Server id of an output (connector).  Outputs are owned by the server, so
/// the id is freely copyable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(pub u64);

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// One entry of the server's static size table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSize {
    pub width: u32,
    pub height: u32,
    /// Physical width in millimetres as advertised by the server.
    pub mm_width: u32,
    /// Physical height in millimetres as advertised by the server.
    pub mm_height: u32,
    /// Refresh rates available at this size, in the server's order.
    pub rates: Vec<u16>,
}

/// Snapshot of the static screen configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenConfig {
    pub sizes: Vec<StaticSize>,
    /// Index into `sizes` of the size currently in use.
    pub current_index: Option<usize>,
    /// Refresh rate currently in use, in Hz.
    pub current_rate: u16,
}

impl ScreenConfig {
    /// Index of `width`×`height` in the static size list.
    pub fn position(&self, width: u32, height: u32) -> Option<usize> {
        self.sizes
            .iter()
            .position(|s| s.width == width && s.height == height)
    }

    /// The size at `current_index`, if that index is valid.
    pub fn current_size(&self) -> Option<(u32, u32)> {
        self.current_index
            .and_then(|i| self.sizes.get(i))
            .map(|s| (s.width, s.height))
    }
}

/// The mode currently driving one enabled, connected output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveOutputMode {
    /// Output name, e.g. `"DUMMY0"` or `"VNC-0"`.
    pub output: String,
    pub dot_clock_hz: u64,
    pub h_total: u32,
    pub v_total: u32,
}

/// Error type for display-server boundary calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DisplayError {
    /// The call was made without a live display connection.
    #[error("no display connection")]
    NoContext,

    /// The display could not be opened.
    #[error("cannot open display: {0}")]
    Connect(String),

    /// The server returned a null object for a query.
    #[error("{0} returned no reply")]
    NullReply(&'static str),

    /// The server answered a request with a protocol error.
    #[error("{request} failed with X error code {code}")]
    Protocol { request: &'static str, code: u8 },

    /// The server processed the request but refused it.
    #[error("{request} rejected with status {status}")]
    Rejected { request: &'static str, status: i32 },
}

/// Synchronous access to the display server's resolution extension.
///
/// Every method blocks until the server has replied.  Implementations are not
/// required to be thread-safe; callers serialize access.
pub trait DisplayServer {
    /// Returns the extension's `(major, minor)` protocol version, or `None`
    /// when the extension is not present.
    fn query_version(&self) -> Result<Option<(u32, u32)>, DisplayError>;

    /// Reads the static size/rate table and the current configuration.
    fn screen_config(&self) -> Result<ScreenConfig, DisplayError>;

    /// Switches to `sizes[size_index]` at `rate` Hz, keeping the current
    /// rotation and stamping the request with the current server time.
    fn apply_screen_config(&self, size_index: usize, rate: u16) -> Result<(), DisplayError>;

    /// Raw pixel dimensions of the default screen's root window.
    fn root_dimensions(&self) -> Result<(u32, u32), DisplayError>;

    /// Number of X screens on the connection.
    fn screen_count(&self) -> Result<u32, DisplayError>;

    /// Physical size of the default screen in millimetres.
    fn physical_size_mm(&self) -> Result<(u32, u32), DisplayError>;

    /// All outputs listed in the current screen resources.
    fn outputs(&self) -> Result<Vec<OutputId>, DisplayError>;

    /// Modes driving every connected output that has a CRTC assigned.
    fn active_output_modes(&self) -> Result<Vec<ActiveOutputMode>, DisplayError>;

    /// Registers a new mode built from `timing`.
    fn create_mode(&self, timing: &ModeTiming) -> Result<ModeHandle, DisplayError>;

    /// Adds `mode` to `output`'s mode list.
    fn add_output_mode(&self, output: OutputId, mode: &ModeHandle) -> Result<(), DisplayError>;

    /// Removes `mode` from `output`'s mode list.
    fn delete_output_mode(&self, output: OutputId, mode: &ModeHandle)
        -> Result<(), DisplayError>;

    /// Destroys `mode` on the server.  The mode must not be attached to any
    /// output.
    fn destroy_mode(&self, mode: ModeHandle) -> Result<(), DisplayError>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
