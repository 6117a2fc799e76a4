//! In-memory display server for tests.
//!
//! `MockDisplayServer` keeps a small model of a RandR screen: a static size
//! table, a set of outputs, the modes created on it and which output each is
//! attached to.  Every boundary call is appended to a call log so tests can
//! assert exactly which requests reached the "server" and in what order.
//!
//! The model enforces the one rule the real server enforces that matters to
//! callers: a mode still attached to an output cannot be destroyed.
//!
//! # Failure injection
//!
//! The `fail_*` flags make the matching request fail with a protocol error.
//! `disconnected` makes every request fail with [`DisplayError::NoContext`].
//!
//! ```ignore
//! let mut display = MockDisplayServer::virtual_1080p();
//! display.fail_create = true;
//! assert!(display.create_mode(&synthesize(1024, 768)?).is_err());
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use modeline_core::{ModeKey, ModeTiming};

use crate::application::display_server::{
    ActiveOutputMode, DisplayError, DisplayServer, ModeHandle, OutputId, ScreenConfig, StaticSize,
};

/// One request received by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCall {
    QueryVersion,
    ScreenConfig,
    ApplyScreenConfig { size_index: usize, rate: u16 },
    RootDimensions,
    ScreenCount,
    PhysicalSize,
    Outputs,
    ActiveOutputModes,
    CreateMode { name: String },
    AddOutputMode { output: OutputId, mode: u64 },
    DeleteOutputMode { output: OutputId, mode: u64 },
    DestroyMode { mode: u64 },
}

#[derive(Debug)]
struct LiveMode {
    key: ModeKey,
    refresh_hz: u16,
    /// `true` while this mode's size was appended to the static table.
    mirrored: bool,
}

/// A scriptable display server that records every call.
pub struct MockDisplayServer {
    /// `None` simulates a server without the extension.
    pub version: Option<(u32, u32)>,
    pub config: Mutex<ScreenConfig>,
    pub root: (u32, u32),
    pub physical_mm: (u32, u32),
    pub screens: u32,
    pub outputs: Vec<OutputId>,
    pub active_modes: Vec<ActiveOutputMode>,
    pub fail_create: bool,
    pub fail_attach: bool,
    pub fail_detach: bool,
    pub fail_destroy: bool,
    pub fail_apply: bool,
    pub disconnected: bool,
    /// When `true`, attaching a mode adds its size to the static table, as
    /// real servers do for the output's mode list.
    pub mirror_output_modes: bool,
    calls: Mutex<Vec<DisplayCall>>,
    live: Mutex<BTreeMap<u64, LiveMode>>,
    attached: Mutex<Vec<(OutputId, u64)>>,
    next_id: AtomicU64,
    created: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn static_size(width: u32, height: u32, rates: Vec<u16>) -> StaticSize {
    StaticSize {
        width,
        height,
        mm_width: width * 254 / 960,
        mm_height: height * 254 / 960,
        rates,
    }
}

impl MockDisplayServer {
    fn with_config(version: Option<(u32, u32)>, config: ScreenConfig, root: (u32, u32)) -> Self {
        Self {
            version,
            config: Mutex::new(config),
            root,
            physical_mm: (root.0 * 254 / 960, root.1 * 254 / 960),
            screens: 1,
            outputs: Vec::new(),
            active_modes: Vec::new(),
            fail_create: false,
            fail_attach: false,
            fail_detach: false,
            fail_destroy: false,
            fail_apply: false,
            disconnected: false,
            mirror_output_modes: true,
            calls: Mutex::new(Vec::new()),
            live: Mutex::new(BTreeMap::new()),
            attached: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0x200),
            created: AtomicUsize::new(0),
        }
    }

    /// A virtual framebuffer at 1920x1080 with RandR 1.5, one output
    /// (`0x42`, named `DUMMY0`) and three static sizes.
    pub fn virtual_1080p() -> Self {
        let config = ScreenConfig {
            sizes: vec![
                static_size(1920, 1080, vec![60, 50]),
                static_size(1280, 720, vec![60]),
                static_size(1024, 768, vec![60, 75]),
            ],
            current_index: Some(0),
            current_rate: 60,
        };
        let mut server = Self::with_config(Some((1, 5)), config, (1920, 1080));
        server.outputs = vec![OutputId(0x42)];
        server.active_modes = vec![ActiveOutputMode {
            output: "DUMMY0".to_string(),
            dot_clock_hz: 148_500_000,
            h_total: 2200,
            v_total: 1125,
        }];
        server
    }

    /// RandR 1.5 present but listing no sizes and no outputs, like Xvfb or a
    /// compositor-backed server.
    pub fn headless() -> Self {
        Self::with_config(Some((1, 5)), ScreenConfig::default(), (5120, 3200))
    }

    /// A 1024x768 server without the RandR extension.
    pub fn without_randr() -> Self {
        Self::with_config(None, ScreenConfig::default(), (1024, 768))
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<DisplayCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// `true` while mode `id` exists on the server.
    pub fn is_live(&self, id: u64) -> bool {
        lock(&self.live).contains_key(&id)
    }

    /// Number of modes currently existing on the server.
    pub fn live_count(&self) -> usize {
        lock(&self.live).len()
    }

    /// Number of successful `create_mode` calls.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Mode ids attached to `output`, in attach order.
    pub fn attached_to(&self, output: OutputId) -> Vec<u64> {
        lock(&self.attached)
            .iter()
            .filter(|(o, _)| *o == output)
            .map(|(_, m)| *m)
            .collect()
    }

    fn record(&self, call: DisplayCall) -> Result<(), DisplayError> {
        lock(&self.calls).push(call);
        if self.disconnected {
            return Err(DisplayError::NoContext);
        }
        Ok(())
    }

    fn require_randr(&self, request: &'static str) -> Result<(), DisplayError> {
        match self.version {
            Some(_) => Ok(()),
            None => Err(DisplayError::NullReply(request)),
        }
    }

    fn mirror_attach(&self, id: u64) {
        if !self.mirror_output_modes {
            return;
        }
        let mut live = lock(&self.live);
        let Some(mode) = live.get_mut(&id) else {
            return;
        };
        let mut config = lock(&self.config);
        if config.position(mode.key.width, mode.key.height).is_none() {
            config
                .sizes
                .push(static_size(mode.key.width, mode.key.height, vec![mode.refresh_hz]));
            mode.mirrored = true;
        }
    }

    fn mirror_detach(&self, id: u64) {
        let mut live = lock(&self.live);
        let Some(mode) = live.get_mut(&id) else {
            return;
        };
        if !mode.mirrored {
            return;
        }
        mode.mirrored = false;
        let mut config = lock(&self.config);
        let Some(pos) = config.position(mode.key.width, mode.key.height) else {
            return;
        };
        config.sizes.remove(pos);
        config.current_index = match config.current_index {
            Some(i) if i == pos => None,
            Some(i) if i > pos => Some(i - 1),
            other => other,
        };
    }
}

impl DisplayServer for MockDisplayServer {
    fn query_version(&self) -> Result<Option<(u32, u32)>, DisplayError> {
        self.record(DisplayCall::QueryVersion)?;
        Ok(self.version)
    }

    fn screen_config(&self) -> Result<ScreenConfig, DisplayError> {
        self.record(DisplayCall::ScreenConfig)?;
        self.require_randr("XRRGetScreenInfo")?;
        Ok(lock(&self.config).clone())
    }

    fn apply_screen_config(&self, size_index: usize, rate: u16) -> Result<(), DisplayError> {
        self.record(DisplayCall::ApplyScreenConfig { size_index, rate })?;
        self.require_randr("XRRGetScreenInfo")?;
        if self.fail_apply {
            return Err(DisplayError::Rejected {
                request: "XRRSetScreenConfigAndRate",
                status: 1,
            });
        }
        let mut config = lock(&self.config);
        if size_index >= config.sizes.len() {
            return Err(DisplayError::Protocol {
                request: "XRRSetScreenConfigAndRate",
                code: 2,
            });
        }
        config.current_index = Some(size_index);
        config.current_rate = rate;
        Ok(())
    }

    fn root_dimensions(&self) -> Result<(u32, u32), DisplayError> {
        self.record(DisplayCall::RootDimensions)?;
        let config = lock(&self.config);
        Ok(config.current_size().unwrap_or(self.root))
    }

    fn screen_count(&self) -> Result<u32, DisplayError> {
        self.record(DisplayCall::ScreenCount)?;
        Ok(self.screens)
    }

    fn physical_size_mm(&self) -> Result<(u32, u32), DisplayError> {
        self.record(DisplayCall::PhysicalSize)?;
        Ok(self.physical_mm)
    }

    fn outputs(&self) -> Result<Vec<OutputId>, DisplayError> {
        self.record(DisplayCall::Outputs)?;
        self.require_randr("XRRGetScreenResourcesCurrent")?;
        Ok(self.outputs.clone())
    }

    fn active_output_modes(&self) -> Result<Vec<ActiveOutputMode>, DisplayError> {
        self.record(DisplayCall::ActiveOutputModes)?;
        self.require_randr("XRRGetScreenResourcesCurrent")?;
        Ok(self.active_modes.clone())
    }

    fn create_mode(&self, timing: &ModeTiming) -> Result<ModeHandle, DisplayError> {
        self.record(DisplayCall::CreateMode {
            name: timing.name.clone(),
        })?;
        self.require_randr("XRRCreateMode")?;
        if self.fail_create {
            return Err(DisplayError::Protocol {
                request: "XRRCreateMode",
                code: 8,
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let refresh_hz = timing
            .refresh_hz()
            .and_then(|hz| u16::try_from(hz).ok())
            .unwrap_or(0);
        lock(&self.live).insert(
            id,
            LiveMode {
                key: timing.key(),
                refresh_hz,
                mirrored: false,
            },
        );
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(ModeHandle::from_raw(id))
    }

    fn add_output_mode(&self, output: OutputId, mode: &ModeHandle) -> Result<(), DisplayError> {
        self.record(DisplayCall::AddOutputMode {
            output,
            mode: mode.raw(),
        })?;
        if self.fail_attach || !self.is_live(mode.raw()) || !self.outputs.contains(&output) {
            return Err(DisplayError::Protocol {
                request: "XRRAddOutputMode",
                code: 8,
            });
        }
        lock(&self.attached).push((output, mode.raw()));
        self.mirror_attach(mode.raw());
        Ok(())
    }

    fn delete_output_mode(&self, output: OutputId, mode: &ModeHandle) -> Result<(), DisplayError> {
        self.record(DisplayCall::DeleteOutputMode {
            output,
            mode: mode.raw(),
        })?;
        if self.fail_detach {
            return Err(DisplayError::Protocol {
                request: "XRRDeleteOutputMode",
                code: 8,
            });
        }
        let removed = {
            let mut attached = lock(&self.attached);
            let before = attached.len();
            attached.retain(|&(o, m)| !(o == output && m == mode.raw()));
            attached.len() != before
        };
        if !removed {
            return Err(DisplayError::Protocol {
                request: "XRRDeleteOutputMode",
                code: 8,
            });
        }
        self.mirror_detach(mode.raw());
        Ok(())
    }

    fn destroy_mode(&self, mode: ModeHandle) -> Result<(), DisplayError> {
        let id = mode.raw();
        self.record(DisplayCall::DestroyMode { mode: id })?;
        let still_attached = lock(&self.attached).iter().any(|&(_, m)| m == id);
        if self.fail_destroy || still_attached {
            return Err(DisplayError::Protocol {
                request: "XRRDestroyMode",
                code: 8,
            });
        }
        match lock(&self.live).remove(&id) {
            Some(_) => Ok(()),
            None => Err(DisplayError::Protocol {
                request: "XRRDestroyMode",
                code: 2,
            }),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
