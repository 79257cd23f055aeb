//! Workspace placeholder crate.
//!
//! This crate exists to expose a single dependency for hosts that embed the
//! picker import core. Enabling `desktop-shims` (default) pulls in
//! `core-service` with the reqwest/SQLite/filesystem adapters wired in.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
