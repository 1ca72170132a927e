//! Error types for `roster-core`.
//!
//! Not-found is never an error in this crate: lookups return `None` or an
//! empty set. Errors are reserved for policy failures and for backends that
//! could not be reached.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// Evaluating a visibility or permission policy failed. Distinct from the
  /// policy denying access, which is not an error.
  #[error("permission backend error: {0}")]
  PermissionBackend(String),

  /// A storage or identity backend is unavailable.
  #[error("backend unavailable: {0}")]
  Backend(#[source] BoxError),

  #[error("invalid group name: {0:?}")]
  InvalidGroupName(String),

  /// A group with the same derived uuid already exists.
  #[error("group {0} already exists")]
  DuplicateGroup(String),
}

impl Error {
  /// Wrap any backend error as [`Error::Backend`].
  pub fn backend<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Backend(Box::new(err))
  }
}

/// Rejections from [`crate::realm::Realm::authenticate`].
#[derive(Debug, Error)]
pub enum AuthError {
  #[error("invalid username or password")]
  InvalidCredentials,

  #[error("account {0:?} is inactive")]
  Inactive(String),

  /// The identity provider could not be queried. Callers decide whether to
  /// retry or surface this as a login failure.
  #[error("authentication backend unavailable: {0}")]
  Unavailable(#[source] BoxError),
}

impl AuthError {
  pub fn unavailable<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Unavailable(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
