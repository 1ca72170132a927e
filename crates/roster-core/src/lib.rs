//! Core types and contracts for the Roster identity and membership layer.
//!
//! This crate has no HTTP or database dependencies. Storage
//! backends (e.g. `roster-store-sqlite`) implement the source traits defined
//! here; callers depend on the contracts, never on a concrete backend.
//!
//! The pieces, leaf-first:
//!
//! - [`group_uuid`], [`email`], [`classifier`]: pure helpers.
//! - [`realm`]: pluggable authentication backends.
//! - [`group_backend`]: pluggable group sources and their composite.
//! - [`include_cache`], [`drafts`]: read-through caches with explicit eviction.
//! - [`loader`], [`directory`]: deferred batch filling of account attributes.

pub mod account;
mod cache;
pub mod classifier;
pub mod config;
pub mod directory;
pub mod drafts;
pub mod email;
pub mod error;
pub mod fill;
pub mod group;
pub mod group_backend;
pub mod group_uuid;
pub mod groups_update;
pub mod include_cache;
pub mod internal_groups;
pub mod loader;
pub mod realm;
pub mod system_groups;

pub use error::{AuthError, Error, Result};

#[cfg(test)]
mod testing;
