//! Core domain types shared by the nestline client libraries.
//!
//! Currently this is the `UserId` newtype for identities issued by the
//! hosted auth backend, used to key profile records and per-user local
//! storage entries.

pub mod id;

pub use id::UserId;
