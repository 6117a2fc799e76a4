//! modeline-host library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does modeline-host do? (for beginners)
//!
//! A virtual or remote X11 display only offers the resolutions listed in its
//! configuration.  A remote client, however, may ask for any window size at
//! all.  This crate bridges the gap:
//!
//! 1. At startup it probes the RandR extension once and remembers whether
//!    resizing is possible at all (headless and compositor-backed servers
//!    often expose RandR but list zero sizes).
//! 2. When a size is requested that is already in the server's static size
//!    list, it simply switches to it.
//! 3. Otherwise it synthesizes a modeline (`modeline_core::synthesize`),
//!    creates the mode on the server, attaches it to the single output and
//!    records it in a bounded cache.
//! 4. When the cache overflows, the oldest synthesized mode is detached and
//!    destroyed again.
//!
//! Everything here is synchronous and single-threaded: each call blocks until
//! the X server replies.  Callers that share a `ResolutionManager` between
//! threads must serialize access themselves.

/// Application layer: resize use cases and the display-server boundary trait.
pub mod application;

/// Infrastructure layer: X11 adapter, mock server, reporting and config.
pub mod infrastructure;
