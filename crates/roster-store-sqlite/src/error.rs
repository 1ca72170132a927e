//! Error type for `roster-store-sqlite`.

use roster_core::account::AccountId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("account not found: {0}")]
  AccountNotFound(AccountId),

  #[error("username {0:?} is already taken")]
  UsernameTaken(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
