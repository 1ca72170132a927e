//! The field-selection set passed to account directories.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

/// One account attribute a caller can ask a directory to populate.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter,
  strum::Display, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FillOption {
  Name,
  Email,
  SecondaryEmails,
  Avatars,
  Username,
  Id,
  Status,
  State,
  DisplayName,
}

impl FillOption {
  const fn bit(self) -> u16 { 1 << self as u16 }
}

/// A set of [`FillOption`]s, stored as a bit-set.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FillOptions(u16);

impl FillOptions {
  pub const fn empty() -> Self { Self(0) }

  pub fn all() -> Self { FillOption::iter().collect() }

  /// Only the account id; what a non-detailed loader requests.
  pub fn id_only() -> Self { Self::empty().with(FillOption::Id) }

  /// The attributes a detailed account rendering needs.
  pub fn detailed() -> Self {
    [
      FillOption::Id,
      FillOption::Name,
      FillOption::Email,
      FillOption::Username,
      FillOption::Status,
      FillOption::Avatars,
    ]
    .into_iter()
    .collect()
  }

  pub const fn with(self, option: FillOption) -> Self {
    Self(self.0 | option.bit())
  }

  pub fn insert(&mut self, option: FillOption) { self.0 |= option.bit(); }

  pub fn remove(&mut self, option: FillOption) { self.0 &= !option.bit(); }

  pub const fn contains(self, option: FillOption) -> bool {
    self.0 & option.bit() != 0
  }

  pub const fn len(self) -> usize { self.0.count_ones() as usize }

  pub const fn is_empty(self) -> bool { self.0 == 0 }

  pub fn iter(self) -> impl Iterator<Item = FillOption> {
    FillOption::iter().filter(move |o| self.contains(*o))
  }
}

impl FromIterator<FillOption> for FillOptions {
  fn from_iter<I: IntoIterator<Item = FillOption>>(iter: I) -> Self {
    iter.into_iter().fold(Self::empty(), Self::with)
  }
}

impl fmt::Debug for FillOptions {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_set().entries(self.iter()).finish()
  }
}
