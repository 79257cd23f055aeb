//! # Core Runtime Module
//!
//! Foundational runtime pieces shared by the import crates:
//! - Logging and tracing setup
//! - Import configuration (builder and environment loading)
//!
//! Nothing here performs I/O beyond reading environment variables and
//! writing log output.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ImportConfig, ImportConfigBuilder};
pub use error::{Error, Result};
