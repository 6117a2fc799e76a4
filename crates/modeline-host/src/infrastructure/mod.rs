//! Infrastructure layer for the modeline host.
//!
//! Contains the OS-facing adapters behind the application-layer traits.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `modeline_core`, but MUST NOT be imported by the `application` or domain
//! layers (unit tests excepted, which borrow the mock display server).
//!
//! # Sub-modules
//!
//! - **`display_server`** – `X11DisplayServer` (Xlib + Xrandr) on Linux and an
//!   always-compiled `MockDisplayServer` for tests.
//!
//! - **`reporting`** – `TracingReporter`, which surfaces each repeating
//!   anomaly once at `warn` level and at `debug` level afterwards.
//!
//! - **`storage`** – TOML configuration loading, environment overrides and
//!   validation.

pub mod display_server;
pub mod reporting;
pub mod storage;
