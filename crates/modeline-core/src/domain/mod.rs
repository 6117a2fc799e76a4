//! Domain entities for dynamic mode management.
//!
//! Nothing in here talks to the display server.  The host crate feeds the
//! results of these computations into its `DisplayServer` adapter, which is
//! the only place that knows about X11.

/// Bounded, insertion-ordered cache of synthesized modes.
pub mod cache;

/// Mode keys, timing records and refresh-rate arithmetic.
pub mod mode;

/// Timing synthesis under monitor-class constraints.
pub mod timing;
