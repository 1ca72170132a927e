//! Deferred batch loading of account attributes.
//!
//! Rendering a response typically touches the same few accounts many times
//! from many places. Each site asks the loader for a placeholder, and once
//! the unit of work is done a single [`AccountLoader::fill`] resolves all of
//! them in one directory call.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::{
  account::{AccountAttribute, AccountId},
  directory::AccountDirectory,
  fill::FillOptions,
};

/// Collects the accounts requested during one unit of work.
///
/// A loader is created per request and dropped afterwards. `get` may be
/// called from many threads at once; `fill` is expected after the last
/// `get`. Calling `get` and `fill` concurrently on the same loader is not
/// supported: accounts added while a fill is running may or may not be part
/// of that fill.
pub struct AccountLoader<'a, D: AccountDirectory + ?Sized> {
  directory: &'a D,
  options:   FillOptions,
  created:   DashMap<AccountId, Arc<AccountAttribute>>,
}

impl<'a, D: AccountDirectory + ?Sized> AccountLoader<'a, D> {
  pub fn new(directory: &'a D, options: FillOptions) -> Self {
    Self { directory, options, created: DashMap::new() }
  }

  pub fn options(&self) -> FillOptions { self.options }

  /// The placeholder for `id`, created on first request.
  ///
  /// Every call with the same id returns the same `Arc`, so a later
  /// [`fill`](Self::fill) is visible to all holders.
  pub fn get(&self, id: Option<AccountId>) -> Option<Arc<AccountAttribute>> {
    let id = id?;
    let attr = self
      .created
      .entry(id)
      .or_insert_with(|| Arc::new(AccountAttribute::new(id)));
    Some(Arc::clone(attr.value()))
  }

  /// Number of distinct accounts requested so far.
  pub fn len(&self) -> usize { self.created.len() }

  pub fn is_empty(&self) -> bool { self.created.is_empty() }

  /// Populate every placeholder handed out so far with one directory call.
  ///
  /// The directory is called even when nothing was requested. A second call
  /// fills every accumulated placeholder again.
  pub fn fill(&self) -> Result<(), D::Error> { self.fill_with(&[]) }

  /// Like [`fill`](Self::fill), but also fills `extra` in the same
  /// directory call.
  pub fn fill_with(&self, extra: &[Arc<AccountAttribute>]) -> Result<(), D::Error> {
    let mut batch = self.snapshot();
    batch.extend(extra.iter().cloned());
    debug!(accounts = batch.len(), options = ?self.options, "filling account batch");
    self.directory.fill_account_info(&batch, self.options)
  }

  /// Fill one caller-supplied attribute with this loader's options.
  pub fn fill_one(&self, attr: &Arc<AccountAttribute>) -> Result<(), D::Error> {
    self.fill_all(std::slice::from_ref(attr))
  }

  /// Fill caller-supplied attributes with this loader's options. The
  /// loader's own placeholders are not included.
  pub fn fill_all(&self, attrs: &[Arc<AccountAttribute>]) -> Result<(), D::Error> {
    self.directory.fill_account_info(attrs, self.options)
  }

  fn snapshot(&self) -> Vec<Arc<AccountAttribute>> {
    let mut batch: Vec<Arc<AccountAttribute>> =
      self.created.iter().map(|e| Arc::clone(e.value())).collect();
    batch.sort_by_key(|a| a.id());
    batch
  }
}

// ─── Factory ─────────────────────────────────────────────────────────────────

/// Owns the directory and hands out one [`AccountLoader`] per unit of work.
pub struct AccountLoaderFactory<D> {
  directory:        D,
  detailed_default: bool,
}

impl<D: AccountDirectory> AccountLoaderFactory<D> {
  /// `detailed_default` picks the preset used by
  /// [`create_default`](Self::create_default).
  pub fn new(directory: D, detailed_default: bool) -> Self {
    Self { directory, detailed_default }
  }

  pub fn directory(&self) -> &D { &self.directory }

  /// A loader using [`FillOptions::detailed`] or [`FillOptions::id_only`].
  pub fn create(&self, detailed: bool) -> AccountLoader<'_, D> {
    let options = if detailed {
      FillOptions::detailed()
    } else {
      FillOptions::id_only()
    };
    self.create_with(options)
  }

  pub fn create_default(&self) -> AccountLoader<'_, D> {
    self.create(self.detailed_default)
  }

  pub fn create_with(&self, options: FillOptions) -> AccountLoader<'_, D> {
    AccountLoader::new(&self.directory, options)
  }
}
