//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-sync`, `core-runtime`, `bridge-desktop`). Host
//! applications can depend on `content-sync-workspace` and enable the documented
//! features without needing to wire each crate individually.

#[cfg(any(feature = "core", feature = "desktop-shims"))]
pub use core_runtime;
#[cfg(any(feature = "core", feature = "desktop-shims"))]
pub use core_sync;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;
