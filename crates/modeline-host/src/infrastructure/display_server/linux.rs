//! Xlib + Xrandr implementation of [`DisplayServer`].
//!
//! # Native object lifetimes
//!
//! Xrandr hands out heap objects that must be released with a matching
//! `XRRFree*` call (`XRRScreenConfiguration`, `XRRScreenResources`,
//! `XRROutputInfo`, `XRRCrtcInfo`, `XRRModeInfo`).  Each one is wrapped in a
//! [`Reply`] guard as soon as it is returned, so it is freed on every path,
//! including early `?` returns.  Nothing borrowed from a reply outlives the
//! guard: sizes, rates, names and mode timings are copied out first.
//!
//! # Protocol errors
//!
//! Requests such as `XRRCreateMode` report failure asynchronously through the
//! Xlib error handler, whose default action is to terminate the process.
//! Mutating requests therefore run under an [`ErrorTrap`], which installs a
//! recording handler, flushes the request with `XSync`, and restores the
//! previous handler when dropped.

use std::ffi::{CStr, CString};
use std::os::raw::{c_int, c_short};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU8, Ordering};

use modeline_core::ModeTiming;
use tracing::{debug, trace};
use x11::{xlib, xrandr};

use crate::application::display_server::{
    ActiveOutputMode, DisplayError, DisplayServer, ModeHandle, OutputId, ScreenConfig, StaticSize,
};

/// `CurrentTime`: let the server stamp the request.
const CURRENT_TIME: xlib::Time = 0;

/// `RR_Connected` from `randr.h`.
const RR_CONNECTED: c_int = 0;

/// `BadValue` from `X.h`, used for arguments that do not fit the wire type.
const BAD_VALUE: u8 = 2;

// ── Reply guard ───────────────────────────────────────────────────────────────

/// Owns a heap object returned by Xrandr and frees it on drop.
struct Reply<T> {
    ptr: NonNull<T>,
    free: unsafe extern "C" fn(*mut T),
}

impl<T> Reply<T> {
    /// Wraps `ptr`, or fails with [`DisplayError::NullReply`] if it is null.
    fn new(
        ptr: *mut T,
        free: unsafe extern "C" fn(*mut T),
        request: &'static str,
    ) -> Result<Self, DisplayError> {
        trace!(request, "reply");
        NonNull::new(ptr)
            .map(|ptr| Self { ptr, free })
            .ok_or(DisplayError::NullReply(request))
    }

    fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// # Safety
    ///
    /// `T` must be a complete (non-opaque) struct type.
    unsafe fn get(&self) -> &T {
        self.ptr.as_ref()
    }
}

impl<T> Drop for Reply<T> {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from the Xrandr call paired with `free` and is
        // freed exactly once.
        unsafe { (self.free)(self.ptr.as_ptr()) };
    }
}

/// Views a server-owned array as a slice; null or non-positive lengths give
/// an empty slice.
///
/// # Safety
///
/// When non-null, `ptr` must point to `len` initialised values that outlive
/// `'a`.
unsafe fn slice_or_empty<'a, T>(ptr: *const T, len: c_int) -> &'a [T] {
    match usize::try_from(len) {
        Ok(len) if len > 0 && !ptr.is_null() => std::slice::from_raw_parts(ptr, len),
        _ => &[],
    }
}

// ── Error trap ────────────────────────────────────────────────────────────────

static LAST_ERROR: AtomicU8 = AtomicU8::new(0);

unsafe extern "C" fn record_error(_dpy: *mut xlib::Display, event: *mut xlib::XErrorEvent) -> c_int {
    if let Some(event) = event.as_ref() {
        LAST_ERROR.store(event.error_code, Ordering::SeqCst);
    }
    0
}

/// Captures protocol errors raised while it is alive.
struct ErrorTrap {
    display: *mut xlib::Display,
    previous: Option<unsafe extern "C" fn(*mut xlib::Display, *mut xlib::XErrorEvent) -> c_int>,
}

impl ErrorTrap {
    fn install(display: *mut xlib::Display) -> Self {
        // SAFETY: `display` is an open connection.  Earlier errors are flushed
        // before the recording handler goes in.
        let previous = unsafe {
            xlib::XSync(display, xlib::False);
            xlib::XSetErrorHandler(Some(record_error))
        };
        LAST_ERROR.store(0, Ordering::SeqCst);
        Self { display, previous }
    }

    /// Flushes outstanding requests and fails if any of them raised an error.
    fn check(&self, request: &'static str) -> Result<(), DisplayError> {
        // SAFETY: the connection outlives the trap.
        unsafe { xlib::XSync(self.display, xlib::False) };
        match LAST_ERROR.swap(0, Ordering::SeqCst) {
            0 => Ok(()),
            code => Err(DisplayError::Protocol { request, code }),
        }
    }
}

impl Drop for ErrorTrap {
    fn drop(&mut self) {
        // SAFETY: restores the handler that was active at install time.
        unsafe { xlib::XSetErrorHandler(self.previous) };
    }
}

fn xid(value: u64, request: &'static str) -> Result<xlib::XID, DisplayError> {
    xlib::XID::try_from(value).map_err(|_| DisplayError::Protocol {
        request,
        code: BAD_VALUE,
    })
}

fn non_negative(value: c_int) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

// ── Display server ────────────────────────────────────────────────────────────

/// A connection to an X server with the RandR extension.
pub struct X11DisplayServer {
    display: *mut xlib::Display,
    screen: c_int,
    root: xlib::Window,
}

impl X11DisplayServer {
    /// Opens `name` (e.g. `":1"`), or `$DISPLAY` when `None`.
    ///
    /// # Errors
    ///
    /// [`DisplayError::Connect`] if the display cannot be opened.
    pub fn open(name: Option<&str>) -> Result<Self, DisplayError> {
        let c_name = name
            .map(CString::new)
            .transpose()
            .map_err(|_| DisplayError::Connect("display name contains a NUL byte".to_string()))?;
        let name_ptr = c_name.as_ref().map_or(std::ptr::null(), |n| n.as_ptr());

        // SAFETY: `name_ptr` is null or a NUL-terminated string alive for the call.
        let display = unsafe { xlib::XOpenDisplay(name_ptr) };
        if display.is_null() {
            let shown = name
                .map(str::to_string)
                .or_else(|| std::env::var("DISPLAY").ok())
                .unwrap_or_else(|| "<unset>".to_string());
            return Err(DisplayError::Connect(format!("XOpenDisplay failed for {shown}")));
        }

        // SAFETY: `display` is a valid connection.
        let (screen, root) = unsafe { (xlib::XDefaultScreen(display), xlib::XDefaultRootWindow(display)) };
        debug!(screen, root, "opened X display");
        Ok(Self {
            display,
            screen,
            root,
        })
    }

    /// Closes the connection.  Later calls fail with
    /// [`DisplayError::NoContext`].
    pub fn close(&mut self) {
        if !self.display.is_null() {
            // SAFETY: the pointer is non-null and nulled right after.
            unsafe { xlib::XCloseDisplay(self.display) };
            self.display = std::ptr::null_mut();
            debug!("closed X display");
        }
    }

    fn dpy(&self) -> Result<*mut xlib::Display, DisplayError> {
        if self.display.is_null() {
            Err(DisplayError::NoContext)
        } else {
            Ok(self.display)
        }
    }

    fn screen_info(&self) -> Result<Reply<xrandr::XRRScreenConfiguration>, DisplayError> {
        let dpy = self.dpy()?;
        // SAFETY: open connection, root window of the default screen.
        let ptr = unsafe { xrandr::XRRGetScreenInfo(dpy, self.root) };
        Reply::new(ptr, xrandr::XRRFreeScreenConfigInfo, "XRRGetScreenInfo")
    }

    fn resources(&self) -> Result<Reply<xrandr::XRRScreenResources>, DisplayError> {
        let dpy = self.dpy()?;
        // SAFETY: open connection, root window of the default screen.
        let ptr = unsafe { xrandr::XRRGetScreenResourcesCurrent(dpy, self.root) };
        Reply::new(
            ptr,
            xrandr::XRRFreeScreenResources,
            "XRRGetScreenResourcesCurrent",
        )
    }

    /// Runs `request` under an [`ErrorTrap`].
    fn trapped(&self, request: &'static str, call: impl FnOnce(*mut xlib::Display)) -> Result<(), DisplayError> {
        let dpy = self.dpy()?;
        trace!(request, "request");
        let trap = ErrorTrap::install(dpy);
        call(dpy);
        trap.check(request)
    }
}

impl Drop for X11DisplayServer {
    fn drop(&mut self) {
        self.close();
    }
}

impl DisplayServer for X11DisplayServer {
    fn query_version(&self) -> Result<Option<(u32, u32)>, DisplayError> {
        let dpy = self.dpy()?;
        let (mut event_base, mut error_base) = (0, 0);
        // SAFETY: open connection, out-params are valid locals.
        if unsafe { xrandr::XRRQueryExtension(dpy, &mut event_base, &mut error_base) } == 0 {
            return Ok(None);
        }
        let (mut major, mut minor) = (0, 0);
        // SAFETY: as above.
        let status = unsafe { xrandr::XRRQueryVersion(dpy, &mut major, &mut minor) };
        if status == 0 {
            return Err(DisplayError::Rejected {
                request: "XRRQueryVersion",
                status,
            });
        }
        Ok(Some((non_negative(major), non_negative(minor))))
    }

    fn screen_config(&self) -> Result<ScreenConfig, DisplayError> {
        let cfg = self.screen_info()?;

        let mut nsizes = 0;
        // SAFETY: `cfg` is live; the size array belongs to it and is copied
        // before `cfg` drops.
        let raw_sizes = unsafe { slice_or_empty(xrandr::XRRConfigSizes(cfg.as_ptr(), &mut nsizes), nsizes) };
        let sizes = (0..nsizes)
            .zip(raw_sizes)
            .map(|(index, s)| {
                let mut nrates = 0;
                // SAFETY: `index` < `nsizes`; the rate array belongs to `cfg`.
                let rates = unsafe {
                    slice_or_empty(xrandr::XRRConfigRates(cfg.as_ptr(), index, &mut nrates), nrates)
                };
                StaticSize {
                    width: non_negative(s.width),
                    height: non_negative(s.height),
                    mm_width: non_negative(s.mwidth),
                    mm_height: non_negative(s.mheight),
                    rates: rates.iter().filter_map(|&r| u16::try_from(r).ok()).collect(),
                }
            })
            .collect();

        let mut rotation: xrandr::Rotation = 0;
        // SAFETY: `cfg` is live.
        let (current, rate) = unsafe {
            (
                xrandr::XRRConfigCurrentConfiguration(cfg.as_ptr(), &mut rotation),
                xrandr::XRRConfigCurrentRate(cfg.as_ptr()),
            )
        };
        Ok(ScreenConfig {
            sizes,
            current_index: Some(usize::from(current)),
            current_rate: u16::try_from(rate).unwrap_or(0),
        })
    }

    fn apply_screen_config(&self, size_index: usize, rate: u16) -> Result<(), DisplayError> {
        const REQUEST: &str = "XRRSetScreenConfigAndRate";
        let bad_value = DisplayError::Protocol {
            request: REQUEST,
            code: BAD_VALUE,
        };
        let index = c_int::try_from(size_index).map_err(|_| bad_value.clone())?;
        let rate = c_short::try_from(rate).map_err(|_| bad_value)?;

        let cfg = self.screen_info()?;
        let mut rotation: xrandr::Rotation = 0;
        // SAFETY: `cfg` is live.
        unsafe { xrandr::XRRConfigCurrentConfiguration(cfg.as_ptr(), &mut rotation) };

        let mut status = 0;
        self.trapped(REQUEST, |dpy| {
            // SAFETY: `cfg` belongs to this connection and is live.
            status = unsafe {
                xrandr::XRRSetScreenConfigAndRate(dpy, cfg.as_ptr(), self.root, index, rotation, rate, CURRENT_TIME)
            };
        })?;
        if status != 0 {
            return Err(DisplayError::Rejected {
                request: REQUEST,
                status,
            });
        }
        Ok(())
    }

    fn root_dimensions(&self) -> Result<(u32, u32), DisplayError> {
        let dpy = self.dpy()?;
        // SAFETY: open connection, default screen number.
        let (w, h) = unsafe { (xlib::XDisplayWidth(dpy, self.screen), xlib::XDisplayHeight(dpy, self.screen)) };
        Ok((non_negative(w), non_negative(h)))
    }

    fn screen_count(&self) -> Result<u32, DisplayError> {
        let dpy = self.dpy()?;
        // SAFETY: open connection.
        Ok(non_negative(unsafe { xlib::XScreenCount(dpy) }))
    }

    fn physical_size_mm(&self) -> Result<(u32, u32), DisplayError> {
        let dpy = self.dpy()?;
        // SAFETY: open connection, default screen number.
        let (w, h) = unsafe {
            (
                xlib::XDisplayWidthMM(dpy, self.screen),
                xlib::XDisplayHeightMM(dpy, self.screen),
            )
        };
        Ok((non_negative(w), non_negative(h)))
    }

    fn outputs(&self) -> Result<Vec<OutputId>, DisplayError> {
        let res = self.resources()?;
        // SAFETY: `res` is live and fully typed; the output array belongs to it.
        let outputs = unsafe {
            let r = res.get();
            slice_or_empty(r.outputs, r.noutput)
        };
        Ok(outputs.iter().map(|&o| OutputId(u64::from(o))).collect())
    }

    fn active_output_modes(&self) -> Result<Vec<ActiveOutputMode>, DisplayError> {
        let dpy = self.dpy()?;
        let res = self.resources()?;
        // SAFETY: `res` is live; both arrays belong to it.
        let (outputs, modes) = unsafe {
            let r = res.get();
            (slice_or_empty(r.outputs, r.noutput), slice_or_empty(r.modes, r.nmode))
        };

        let mut active = Vec::new();
        for &output in outputs {
            // SAFETY: `output` comes from `res`, which is live.
            let info = Reply::new(
                unsafe { xrandr::XRRGetOutputInfo(dpy, res.as_ptr(), output) },
                xrandr::XRRFreeOutputInfo,
                "XRRGetOutputInfo",
            )?;
            // SAFETY: `info` is live and fully typed.
            let info = unsafe { info.get() };
            if c_int::from(info.connection) != RR_CONNECTED || info.crtc == 0 {
                continue;
            }

            // SAFETY: `info.crtc` comes from `res`, which is live.
            let crtc = Reply::new(
                unsafe { xrandr::XRRGetCrtcInfo(dpy, res.as_ptr(), info.crtc) },
                xrandr::XRRFreeCrtcInfo,
                "XRRGetCrtcInfo",
            )?;
            // SAFETY: `crtc` is live and fully typed.
            let mode_id = unsafe { crtc.get() }.mode;
            let Some(mode) = modes.iter().find(|m| m.id == mode_id) else {
                continue;
            };

            // SAFETY: the name buffer belongs to `info` and is copied here.
            let name = unsafe { slice_or_empty(info.name.cast::<u8>(), info.nameLen) };
            active.push(ActiveOutputMode {
                output: String::from_utf8_lossy(name).into_owned(),
                dot_clock_hz: u64::from(mode.dotClock),
                h_total: mode.hTotal,
                v_total: mode.vTotal,
            });
        }
        Ok(active)
    }

    fn create_mode(&self, timing: &ModeTiming) -> Result<ModeHandle, DisplayError> {
        const REQUEST: &str = "XRRCreateMode";
        let bad_value = DisplayError::Protocol {
            request: REQUEST,
            code: BAD_VALUE,
        };
        let name = CString::new(timing.name.as_str()).map_err(|_| bad_value.clone())?;
        let name_len = c_int::try_from(name.as_bytes().len()).map_err(|_| bad_value.clone())?;
        let dot_clock = std::os::raw::c_ulong::try_from(timing.pixel_clock_hz).map_err(|_| bad_value)?;

        // SAFETY: `name` is NUL-terminated and `name_len` excludes the NUL;
        // Xrandr copies it into the allocation.
        let info = Reply::new(
            unsafe { xrandr::XRRAllocModeInfo(name.as_ptr(), name_len) },
            xrandr::XRRFreeModeInfo,
            "XRRAllocModeInfo",
        )?;
        // SAFETY: `info` is live and exclusively owned here.
        unsafe {
            let m = &mut *info.as_ptr();
            m.width = timing.width;
            m.height = timing.height;
            m.dotClock = dot_clock;
            m.hSyncStart = timing.h_sync_start;
            m.hSyncEnd = timing.h_sync_end;
            m.hTotal = timing.h_total;
            m.hSkew = 0;
            m.vSyncStart = timing.v_sync_start;
            m.vSyncEnd = timing.v_sync_end;
            m.vTotal = timing.v_total;
            m.modeFlags = 0;
        }

        let mut id: xrandr::RRMode = 0;
        self.trapped(REQUEST, |dpy| {
            // SAFETY: `info` is a complete mode description alive for the call.
            id = unsafe { xrandr::XRRCreateMode(dpy, self.root, info.as_ptr()) };
        })?;
        if id == 0 {
            return Err(DisplayError::Rejected {
                request: REQUEST,
                status: 0,
            });
        }
        // SAFETY: `info.name` was set by XRRAllocModeInfo and is NUL-terminated.
        let created = unsafe { CStr::from_ptr((*info.as_ptr()).name) };
        debug!(mode = id, name = %created.to_string_lossy(), "created mode");
        Ok(ModeHandle::from_raw(u64::from(id)))
    }

    fn add_output_mode(&self, output: OutputId, mode: &ModeHandle) -> Result<(), DisplayError> {
        const REQUEST: &str = "XRRAddOutputMode";
        let (output, mode) = (xid(output.0, REQUEST)?, xid(mode.raw(), REQUEST)?);
        // SAFETY: plain XID arguments on an open connection.
        self.trapped(REQUEST, |dpy| unsafe { xrandr::XRRAddOutputMode(dpy, output, mode) })
    }

    fn delete_output_mode(&self, output: OutputId, mode: &ModeHandle) -> Result<(), DisplayError> {
        const REQUEST: &str = "XRRDeleteOutputMode";
        let (output, mode) = (xid(output.0, REQUEST)?, xid(mode.raw(), REQUEST)?);
        // SAFETY: plain XID arguments on an open connection.
        self.trapped(REQUEST, |dpy| unsafe { xrandr::XRRDeleteOutputMode(dpy, output, mode) })
    }

    fn destroy_mode(&self, mode: ModeHandle) -> Result<(), DisplayError> {
        const REQUEST: &str = "XRRDestroyMode";
        let mode = xid(mode.raw(), REQUEST)?;
        // SAFETY: plain XID argument on an open connection.
        self.trapped(REQUEST, |dpy| unsafe { xrandr::XRRDestroyMode(dpy, mode) })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
