//! Google Photos Picker Provider
//!
//! Implements the `PickerService` trait from `bridge-traits` for the Google
//! Photos Picker API: session creation, session polling, and paginated listing
//! of the items a user picked.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{GooglePhotosPicker, PICKER_API_BASE};
pub use error::{GooglePhotosError, Result};
