//! Shared types for the gly radio client: catalog entries, commands,
//! snapshots published by the core, configuration and platform paths.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod platform;
pub mod protocol;
pub mod state;
