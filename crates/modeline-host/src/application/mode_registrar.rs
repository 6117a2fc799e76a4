//! Lifecycle of synthesized modes on the display server.
//!
//! ```text
//! create ──► attach(output) ──► detach ──► destroy
//!    │                                       ▲
//!    └──────────── (unattached) ─────────────┘
//! ```
//!
//! A mode must never be destroyed while an output still lists it, so
//! [`ModeRegistrar::destroy`] always detaches first.  Detaching a mode that
//! is not attached is a no-op, which makes `destroy` safe on both paths.

use modeline_core::ModeTiming;
use tracing::{debug, trace};

use super::display_server::{DisplayError, DisplayServer, ModeHandle, OutputId};
use super::error::ResizeError;

/// A mode this host created, together with the output it is attached to.
#[derive(Debug)]
pub struct AddedMode {
    pub handle: ModeHandle,
    /// `None` while the mode is unattached (e.g. multiple outputs present).
    pub output: Option<OutputId>,
    pub timing: ModeTiming,
}

impl AddedMode {
    pub fn new(handle: ModeHandle, timing: ModeTiming) -> Self {
        Self {
            handle,
            output: None,
            timing,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.output.is_some()
    }
}

/// Creates, attaches, detaches and destroys modes through a [`DisplayServer`].
pub struct ModeRegistrar<'a> {
    display: &'a dyn DisplayServer,
}

impl<'a> ModeRegistrar<'a> {
    pub fn new(display: &'a dyn DisplayServer) -> Self {
        Self { display }
    }

    /// Registers a new mode built from `timing`.
    ///
    /// # Errors
    ///
    /// [`ResizeError::ModeCreationFailed`] if the server refuses, or
    /// [`ResizeError::NoContext`] without a connection.
    pub fn create(&self, timing: &ModeTiming) -> Result<ModeHandle, ResizeError> {
        trace!(name = %timing.name, modeline = %timing.modeline(), "creating mode");
        self.display.create_mode(timing).map_err(|e| match e {
            DisplayError::NoContext => ResizeError::NoContext,
            source => ResizeError::ModeCreationFailed {
                name: timing.name.clone(),
                source,
            },
        })
    }

    /// Resolves the single output synthesized modes are attached to.
    ///
    /// # Errors
    ///
    /// [`ResizeError::MultipleOutputsUnsupported`] or
    /// [`ResizeError::NoActiveOutput`] when there is not exactly one output.
    pub fn active_output(&self) -> Result<OutputId, ResizeError> {
        let outputs = self.display.outputs()?;
        match outputs.as_slice() {
            [output] => Ok(*output),
            [] => Err(ResizeError::NoActiveOutput),
            many => Err(ResizeError::MultipleOutputsUnsupported { count: many.len() }),
        }
    }

    /// Adds `mode` to `output`.  Already attached to the same output is a no-op.
    pub fn attach(&self, mode: &mut AddedMode, output: OutputId) -> Result<(), ResizeError> {
        if mode.output == Some(output) {
            return Ok(());
        }
        if mode.output.is_some() {
            self.detach(mode)?;
        }
        self.display.add_output_mode(output, &mode.handle)?;
        debug!(mode = %mode.handle, %output, name = %mode.timing.name, "attached mode");
        mode.output = Some(output);
        Ok(())
    }

    /// Removes `mode` from its output.  Unattached modes are left alone.
    pub fn detach(&self, mode: &mut AddedMode) -> Result<(), ResizeError> {
        let Some(output) = mode.output else {
            return Ok(());
        };
        self.display.delete_output_mode(output, &mode.handle)?;
        debug!(mode = %mode.handle, %output, name = %mode.timing.name, "detached mode");
        mode.output = None;
        Ok(())
    }

    /// Detaches `mode` if needed, then destroys it on the server.
    ///
    /// When detaching fails the mode is not destroyed, so a server-side mode
    /// can leak; it is never destroyed while still attached.
    pub fn destroy(&self, mut mode: AddedMode) -> Result<(), ResizeError> {
        self.detach(&mut mode)?;
        let name = mode.timing.name;
        self.display.destroy_mode(mode.handle)?;
        debug!(%name, "destroyed mode");
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
