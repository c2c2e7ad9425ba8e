//! Device-local storage for nestline.
//!
//! This crate abstracts the key-value storage the host platform provides
//! (on device: the mobile storage API; in tests and tools: an in-memory
//! map) behind the [`DeviceStorage`] trait, and builds the typed stores
//! the rest of the platform uses on top of it:
//!
//! - [`DraftStore`]: per-user application-form drafts under
//!   `draft_{user_id}` keys, so a multi-step form survives restarts and
//!   lazy signup can resume where the user left off.
//!
//! All values are stored as strings; typed payloads go through JSON.

pub mod device;
pub mod draft;
pub mod error;

pub use device::{DeviceStorage, MemoryStorage};
pub use draft::DraftStore;
pub use error::StorageError;
