//! SQLite local store for Roster.
//!
//! One file holds accounts, groups and draft comments. The store implements
//! every storage-facing source and writer trait of `roster-core`, so a single
//! [`SqliteStore`] can back the account directory, the internal group
//! backend, the realms and both caches.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{NewAccount, SqliteStore};
