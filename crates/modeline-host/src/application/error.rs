//! Error taxonomy for resize operations.

use modeline_core::TimingError;
use thiserror::Error;

use super::display_server::DisplayError;

/// Error type for every resize/mode-lifecycle operation.
///
/// None of these terminate the host: the façade in `resolution_manager`
/// logs them and converts them into `Option`/`bool`-style results where the
/// caller has nothing useful to do with the detail.
#[derive(Debug, Error)]
pub enum ResizeError {
    /// RandR is missing, older than 1.2, or lists no sizes.  Disables the
    /// subsystem for the lifetime of the process.
    #[error("RandR extension unavailable or unusable on this display")]
    ExtensionUnavailable,

    /// Resize features were switched off by configuration.
    #[error("resize support disabled by configuration")]
    Disabled,

    /// The requested size cannot be turned into a valid timing.
    #[error(transparent)]
    Timing(#[from] TimingError),

    /// The server refused to create the mode.
    #[error("failed to create mode {name}: {source}")]
    ModeCreationFailed {
        name: String,
        #[source]
        source: DisplayError,
    },

    /// The server refused the screen configuration change.
    #[error("failed to apply screen size {width}x{height}: {source}")]
    ConfigurationApplyFailed {
        width: u32,
        height: u32,
        #[source]
        source: DisplayError,
    },

    /// The size is not in the static size list.
    #[error("screen size {width}x{height} is not in the static size list")]
    SizeNotFound { width: u32, height: u32 },

    /// More than one output exists; synthesized modes are left unattached.
    #[error("{count} outputs present, only a single output is supported")]
    MultipleOutputsUnsupported { count: usize },

    /// No output exists to attach synthesized modes to.
    #[error("no output available to attach modes to")]
    NoActiveOutput,

    /// Called without a live display connection.
    #[error("no display connection")]
    NoContext,

    /// Any other failed server query.
    #[error("display query failed: {0}")]
    Display(DisplayError),
}

impl ResizeError {
    /// `true` for [`TimingError::ImpossibleMode`].
    pub fn is_impossible_mode(&self) -> bool {
        matches!(self, Self::Timing(TimingError::ImpossibleMode { .. }))
    }
}

impl From<DisplayError> for ResizeError {
    fn from(err: DisplayError) -> Self {
        match err {
            DisplayError::NoContext => Self::NoContext,
            other => Self::Display(other),
        }
    }
}
