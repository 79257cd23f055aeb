//! # Desktop / Server Bridge Implementations
//!
//! Default implementations of the bridge traits for a native host process.
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `BlobStore` on the local filesystem using `tokio::fs`
//! - `KeyValueStore` using an SQLite table
//! - In-memory `BlobStore`/`KeyValueStore` for tests and development
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteKeyValueStore, TokioBlobStore};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http = ReqwestHttpClient::new()?;
//!     let blobs = TokioBlobStore::new("/var/lib/picker-import/blobs").await?;
//!     let kv = SqliteKeyValueStore::new("/var/lib/picker-import/state.db".into()).await?;
//!     // Hand these to core-service
//!     Ok(())
//! }
//! ```

mod blob;
mod http;
mod kv;
mod memory;

pub use blob::TokioBlobStore;
pub use http::ReqwestHttpClient;
pub use kv::SqliteKeyValueStore;
pub use memory::{MemoryBlobStore, MemoryKeyValueStore};
