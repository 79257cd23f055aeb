//! # Core Import
//!
//! Resumable import of picker selections into blob storage.
//!
//! ## Overview
//!
//! An import is a persisted [`JobRecord`] advanced by externally triggered
//! [`JobDriver::step`] calls. Each step does as much as it safely can and
//! persists after every confirmed piece of work, so the process may die at
//! any point and the next trigger picks up from the last persisted state.
//!
//! - [`job`]: the record, its state machine and the UI status record
//! - [`store`]: JSON persistence over a namespaced key-value store
//! - [`pagination`]: resumable page stream over the picker listing
//! - [`transfer`]: download-then-overwrite of a single item
//! - [`driver`]: the step function
//! - [`queue`]: worker pool that runs steps off the request path
//!
//! ## Delivery
//!
//! Items are transferred at least once. A blob is written before the record
//! forgets the item, and blob keys are deterministic, so a repeated transfer
//! overwrites rather than duplicates.

pub mod driver;
pub mod error;
pub mod job;
pub mod pagination;
pub mod queue;
pub mod store;
pub mod transfer;

pub use driver::{JobDriver, StepOutcome};
pub use error::{ErrorKind, ImportError, Result};
pub use job::{JobId, JobRecord, JobState, StatusRecord};
pub use queue::{EnqueueOutcome, StepQueue};
pub use store::{JobStateStore, StatusStore};
pub use transfer::TransferWorker;
