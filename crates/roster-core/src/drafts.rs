//! Cache of the changes on which an account has unpublished draft comments,
//! and the write path that keeps it fresh.

use std::{collections::HashSet, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result, account::AccountId, cache::ReadThrough};

/// Identifier of a change under review.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChangeId(pub u32);

impl fmt::Display for ChangeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait DraftSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn changes_with_drafts(
    &self,
    account: AccountId,
  ) -> std::result::Result<HashSet<ChangeId>, Self::Error>;
}

pub type ChangeSet = Arc<HashSet<ChangeId>>;

/// Read-through cache over a [`DraftSource`], keyed by account.
///
/// The draft write path must call [`evict`](Self::evict) whenever an
/// account's drafts are created, edited, deleted or published.
pub struct DraftCommentsCache<S> {
  source:  S,
  entries: ReadThrough<AccountId, ChangeSet>,
}

impl<S: DraftSource> DraftCommentsCache<S> {
  pub fn new(source: S) -> Self { Self { source, entries: ReadThrough::new() } }

  pub fn get(&self, account: AccountId) -> std::result::Result<ChangeSet, S::Error> {
    self.entries.get_or_load(&account, || {
      debug!(%account, "loading changes with drafts");
      self.source.changes_with_drafts(account).map(Arc::new)
    })
  }

  pub fn evict(&self, account: AccountId) {
    debug!(%account, "evicting changes with drafts");
    self.entries.evict(&account);
  }
}

// ─── Write path ──────────────────────────────────────────────────────────────

/// Draft mutations supplied by the comment store.
pub trait DraftWriter: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store a new draft and return its id.
  fn create_draft(
    &self,
    account: AccountId,
    change: ChangeId,
    message: &str,
  ) -> std::result::Result<String, Self::Error>;

  /// `false` if no such draft belongs to `account`.
  fn update_draft(
    &self,
    account: AccountId,
    draft_id: &str,
    message: &str,
  ) -> std::result::Result<bool, Self::Error>;

  /// `false` if no such draft belongs to `account`.
  fn delete_draft(
    &self,
    account: AccountId,
    draft_id: &str,
  ) -> std::result::Result<bool, Self::Error>;

  /// Turn every draft of `account` on `change` into a published comment.
  /// Returns the number published.
  fn publish_drafts(
    &self,
    account: AccountId,
    change: ChangeId,
  ) -> std::result::Result<usize, Self::Error>;
}

/// Applies draft mutations and evicts the author's cache entry before
/// returning.
pub struct DraftsUpdate<W, S> {
  writer: W,
  cache:  Arc<DraftCommentsCache<S>>,
}

impl<W: DraftWriter, S: DraftSource> DraftsUpdate<W, S> {
  pub fn new(writer: W, cache: Arc<DraftCommentsCache<S>>) -> Self {
    Self { writer, cache }
  }

  pub fn create_draft(
    &self,
    account: AccountId,
    change: ChangeId,
    message: &str,
  ) -> Result<String> {
    let id = self
      .writer
      .create_draft(account, change, message)
      .map_err(Error::backend)?;
    self.cache.evict(account);
    Ok(id)
  }

  pub fn update_draft(
    &self,
    account: AccountId,
    draft_id: &str,
    message: &str,
  ) -> Result<bool> {
    let updated = self
      .writer
      .update_draft(account, draft_id, message)
      .map_err(Error::backend)?;
    self.cache.evict(account);
    Ok(updated)
  }

  pub fn delete_draft(&self, account: AccountId, draft_id: &str) -> Result<bool> {
    let deleted = self
      .writer
      .delete_draft(account, draft_id)
      .map_err(Error::backend)?;
    self.cache.evict(account);
    Ok(deleted)
  }

  pub fn publish_drafts(&self, account: AccountId, change: ChangeId) -> Result<usize> {
    let published = self
      .writer
      .publish_drafts(account, change)
      .map_err(Error::backend)?;
    self.cache.evict(account);
    Ok(published)
  }
}
