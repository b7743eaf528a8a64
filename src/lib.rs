//! Workspace placeholder crate.
//!
//! This crate exposes feature flags that map to the individual workspace
//! crates (`core-service`, `core-playback`). Host applications can depend on
//! `emberplay-workspace` and pick either the full desktop stack
//! (`desktop-shims`) or just the streaming engine (`engine-only`) without
//! wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service;

#[cfg(feature = "engine-only")]
pub use core_playback;
