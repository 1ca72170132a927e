//! Group identifiers, descriptions and the membership capability.

use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};

// ─── GroupUuid ───────────────────────────────────────────────────────────────

/// Globally unique group identifier.
///
/// Internally created groups use the 64-character lowercase hex form minted
/// by [`crate::group_uuid::make`]. External backends choose their own form
/// and must not collide with any other backend's namespace.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GroupUuid(String);

/// Length of an internal group uuid in hex characters.
pub const INTERNAL_UUID_LEN: usize = 64;

impl GroupUuid {
  pub fn new(uuid: impl Into<String>) -> Self { Self(uuid.into()) }

  pub fn as_str(&self) -> &str { &self.0 }

  /// `true` for uuids of the form minted for internally created groups.
  pub fn is_internal(&self) -> bool {
    self.0.len() == INTERNAL_UUID_LEN
      && self.0.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
  }
}

impl fmt::Display for GroupUuid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for GroupUuid {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for GroupUuid {
  fn from(s: String) -> Self { Self(s) }
}

// ─── Descriptions ────────────────────────────────────────────────────────────

/// A `(uuid, name)` pair, as returned by suggestions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupReference {
  pub uuid: GroupUuid,
  pub name: String,
}

/// What a backend knows about one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDescription {
  pub uuid:           GroupUuid,
  pub name:           String,
  pub url:            Option<String>,
  pub email:          Option<String>,
  pub visible_to_all: bool,
  /// The group whose members administer this one.
  pub owner:          Option<GroupUuid>,
}

impl GroupDescription {
  pub fn new(uuid: GroupUuid, name: impl Into<String>) -> Self {
    Self {
      uuid,
      name: name.into(),
      url: None,
      email: None,
      visible_to_all: false,
      owner: None,
    }
  }

  pub fn reference(&self) -> GroupReference {
    GroupReference { uuid: self.uuid.clone(), name: self.name.clone() }
  }
}

/// Order references by display name, then uuid, so equal inputs always
/// produce the same sequence.
pub(crate) fn sort_references(refs: &mut [GroupReference]) {
  refs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.uuid.cmp(&b.uuid)));
}

// ─── Membership ──────────────────────────────────────────────────────────────

/// The groups one identified user belongs to, transitively.
///
/// A membership is obtained fresh from a backend for each query and is not
/// cached by callers.
pub trait GroupMembership: Send + Sync {
  fn contains(&self, group: &GroupUuid) -> bool;

  fn contains_any_of(&self, groups: &[GroupUuid]) -> bool {
    groups.iter().any(|g| self.contains(g))
  }

  /// The subset of `groups` this user belongs to.
  fn intersection(&self, groups: &[GroupUuid]) -> HashSet<GroupUuid> {
    groups.iter().filter(|g| self.contains(g)).cloned().collect()
  }

  /// Every group the backend can enumerate for this user. May be a subset of
  /// the groups [`contains`](Self::contains) answers `true` for.
  fn known_groups(&self) -> HashSet<GroupUuid>;
}

/// A membership over a fixed set of groups.
#[derive(Debug, Clone, Default)]
pub struct ListGroupMembership {
  groups: HashSet<GroupUuid>,
}

impl ListGroupMembership {
  pub fn new(groups: impl IntoIterator<Item = GroupUuid>) -> Self {
    Self { groups: groups.into_iter().collect() }
  }

  pub fn empty() -> Self { Self::default() }
}

impl GroupMembership for ListGroupMembership {
  fn contains(&self, group: &GroupUuid) -> bool { self.groups.contains(group) }

  fn known_groups(&self) -> HashSet<GroupUuid> { self.groups.clone() }
}
