//! Account identity and the per-account attribute record filled in batches.

use std::fmt;

use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Opaque, immutable identifier of a registered account.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(pub u32);

impl AccountId {
  pub const fn get(self) -> u32 { self.0 }
}

impl fmt::Display for AccountId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<u32> for AccountId {
  fn from(id: u32) -> Self { Self(id) }
}

/// The user a group membership or email query is answered for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifiedUser {
  pub account_id: AccountId,
  /// Login name, when the account has one.
  pub username:   Option<String>,
}

impl IdentifiedUser {
  pub fn new(account_id: AccountId) -> Self {
    Self { account_id, username: None }
  }

  pub fn with_username(mut self, username: impl Into<String>) -> Self {
    self.username = Some(username.into());
    self
  }
}

// ─── AccountInfo ─────────────────────────────────────────────────────────────

/// A single avatar image at a given pixel height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarInfo {
  pub url:    String,
  pub height: u32,
}

/// The renderable attributes of an account. Every field is optional: a
/// directory populates only the fields that were requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
  #[serde(rename = "_account_id", skip_serializing_if = "Option::is_none")]
  pub account_id:       Option<AccountId>,
  /// Full name.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name:             Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub display_name:     Option<String>,
  /// Preferred email address.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email:            Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub secondary_emails: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub username:         Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status:           Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub avatars:          Option<Vec<AvatarInfo>>,
  /// `Some(true)` for inactive accounts; absent otherwise.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub inactive:         Option<bool>,
}

// ─── AccountAttribute ────────────────────────────────────────────────────────

/// A shared placeholder for one account's [`AccountInfo`].
///
/// Handed out by [`crate::loader::AccountLoader::get`] before anything is
/// known about the account, populated in place by a
/// [`crate::directory::AccountDirectory`], and read by every holder
/// afterwards.
#[derive(Debug)]
pub struct AccountAttribute {
  id:   AccountId,
  info: RwLock<AccountInfo>,
}

impl AccountAttribute {
  pub fn new(id: AccountId) -> Self {
    Self { id, info: RwLock::new(AccountInfo::default()) }
  }

  pub fn id(&self) -> AccountId { self.id }

  pub fn read(&self) -> RwLockReadGuard<'_, AccountInfo> { self.info.read() }

  /// A copy of the current contents.
  pub fn snapshot(&self) -> AccountInfo { self.info.read().clone() }

  /// Mutate the record in place. Intended for directory implementations.
  pub fn populate(&self, f: impl FnOnce(&mut AccountInfo)) {
    f(&mut self.info.write());
  }
}

impl Serialize for AccountAttribute {
  fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    self.info.read().serialize(s)
  }
}
