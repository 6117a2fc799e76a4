//! `DisplayServer` implementations.
//!
//! The native backend is selected at compile time via `#[cfg(target_os = ...)]`.

pub mod mock;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "linux")]
pub use linux::X11DisplayServer as NativeDisplayServer;
