//! Keystack
//!
//! Priority-stacked input handlers with per-handler blocking and live key
//! remapping.

/// Application configuration - profiles, store location, handler templates
pub mod config;

/// Build-time information (timestamp, target, compiler)
pub mod build_info;

/// Consistency checks over a configured input stack
pub mod health;

/// Handler stack, dispatch and remapping
pub mod input;
