//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module reads the TOML configuration file from the XDG
//! config directory, applies environment overrides and validates the result.
//! A missing file is not an error; defaults are used instead.

pub mod config;
