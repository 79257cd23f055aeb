//! # Host Bridge Traits
//!
//! Capability traits the import core depends on but does not implement.
//!
//! ## Overview
//!
//! This crate defines the contract between the import core and the concrete
//! adapters that talk to the outside world. Each trait is one capability the
//! core requires; `bridge-desktop` ships the default server-side adapters and
//! tests swap in fakes.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations
//! - [`PickerService`](picker::PickerService) - Remote media picker sessions
//!
//! ### Storage
//! - [`BlobStore`](storage::BlobStore) - Media payload storage, overwrite by key
//! - [`KeyValueStore`](storage::KeyValueStore) - Job and status records
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to a host
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Adapters should
//! convert their library errors into it with enough context (key, URL, status)
//! to be actionable from a log line.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single adapter instance can be
//! shared across driver steps running on different worker tasks.

pub mod error;
pub mod http;
pub mod picker;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use picker::{ItemsPage, MediaItem, MediaType, PickerService, RemoteSession};
pub use storage::{BlobStore, KeyValueStore};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
