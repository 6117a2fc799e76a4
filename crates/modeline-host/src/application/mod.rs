//! Application layer use cases for the resize host.
//!
//! # Components (leaf-first)
//!
//! - **`display_server`** – The [`DisplayServer`](display_server::DisplayServer)
//!   trait: the boundary to the X server's RandR extension.  Implementations
//!   live in the infrastructure layer.
//!
//! - **`capability`** – One-shot probe deciding whether RandR is present,
//!   recent enough (≥ 1.2) and actually lists sizes.
//!
//! - **`mode_registrar`** – Creates synthesized modes on the server, attaches
//!   them to the active output, and detaches + destroys them again.
//!
//! - **`screen_config`** – Reads and switches the current size from the
//!   server's static size list; reads refresh rates.
//!
//! - **`resolution_manager`** – The host-facing façade that ties the above
//!   together with the bounded `ModeCache`.
//!
//! - **`report`** – The [`Reporter`](report::Reporter) trait used to surface
//!   repeating anomalies to the operator exactly once.

pub mod capability;
pub mod display_server;
pub mod error;
pub mod mode_registrar;
pub mod report;
pub mod resolution_manager;
pub mod screen_config;
