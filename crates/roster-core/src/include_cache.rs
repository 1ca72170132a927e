//! Cache of direct membership and subgroup edges.
//!
//! Two key spaces: an account maps to the groups it is a direct member of,
//! and a group maps to the groups that include it as a subgroup. Entries live
//! until evicted. Any write path that adds or removes an edge must evict the
//! affected key before it reports success.

use std::{collections::HashSet, sync::Arc};

use tracing::debug;

use crate::{account::AccountId, cache::ReadThrough, group::GroupUuid};

/// The store the cache reads through to.
pub trait GroupIncludeSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Groups that `account` is a direct member of.
  fn groups_with_member(
    &self,
    account: AccountId,
  ) -> Result<HashSet<GroupUuid>, Self::Error>;

  /// Groups that include `group` as a direct subgroup.
  fn parent_groups_of(
    &self,
    group: &GroupUuid,
  ) -> Result<HashSet<GroupUuid>, Self::Error>;

  /// Every subgroup uuid that is not owned by the internal backend.
  fn all_external_members(&self) -> Result<HashSet<GroupUuid>, Self::Error>;
}

pub type GroupSet = Arc<HashSet<GroupUuid>>;

pub struct GroupIncludeCache<S> {
  source:           S,
  groups_by_member: ReadThrough<AccountId, GroupSet>,
  parents_by_group: ReadThrough<GroupUuid, GroupSet>,
  external_members: ReadThrough<(), GroupSet>,
}

impl<S: GroupIncludeSource> GroupIncludeCache<S> {
  pub fn new(source: S) -> Self {
    Self {
      source,
      groups_by_member: ReadThrough::new(),
      parents_by_group: ReadThrough::new(),
      external_members: ReadThrough::new(),
    }
  }

  pub fn source(&self) -> &S { &self.source }

  pub fn groups_with_member(&self, account: AccountId) -> Result<GroupSet, S::Error> {
    self.groups_by_member.get_or_load(&account, || {
      debug!(%account, "loading groups with member");
      self.source.groups_with_member(account).map(Arc::new)
    })
  }

  pub fn parent_groups_of(&self, group: &GroupUuid) -> Result<GroupSet, S::Error> {
    self.parents_by_group.get_or_load(group, || {
      debug!(%group, "loading parent groups");
      self.source.parent_groups_of(group).map(Arc::new)
    })
  }

  pub fn all_external_members(&self) -> Result<GroupSet, S::Error> {
    self.external_members.get_or_load(&(), || {
      debug!("loading external group members");
      self.source.all_external_members().map(Arc::new)
    })
  }

  pub fn evict_groups_with_member(&self, account: AccountId) {
    debug!(%account, "evicting groups with member");
    self.groups_by_member.evict(&account);
  }

  pub fn evict_parent_groups_of(&self, group: &GroupUuid) {
    debug!(%group, "evicting parent groups");
    self.parents_by_group.evict(group);
  }

  pub fn evict_all_external_members(&self) {
    debug!("evicting external group members");
    self.external_members.evict(&());
  }
}

#[cfg(test)]
mod tests {
  use std::thread;

  use super::*;
  use crate::testing::MemoryGroups;

  fn set(uuids: &[&str]) -> HashSet<GroupUuid> {
    uuids.iter().map(|u| GroupUuid::from(*u)).collect()
  }

  #[test]
  fn hit_does_not_touch_source() {
    let groups = MemoryGroups::default();
    groups.add_member("g1", AccountId(1));
    let cache = GroupIncludeCache::new(groups.clone());

    assert_eq!(*cache.groups_with_member(AccountId(1)).unwrap(), set(&["g1"]));
    assert_eq!(*cache.groups_with_member(AccountId(1)).unwrap(), set(&["g1"]));
    assert_eq!(groups.member_reads(), 1);
  }

  #[test]
  fn cached_value_survives_store_change_until_evicted() {
    let groups = MemoryGroups::default();
    groups.add_member("g1", AccountId(1));
    let cache = GroupIncludeCache::new(groups.clone());
    cache.groups_with_member(AccountId(1)).unwrap();

    groups.add_member("g2", AccountId(1));
    assert_eq!(*cache.groups_with_member(AccountId(1)).unwrap(), set(&["g1"]));

    cache.evict_groups_with_member(AccountId(1));
    assert_eq!(
      *cache.groups_with_member(AccountId(1)).unwrap(),
      set(&["g1", "g2"])
    );
    assert_eq!(groups.member_reads(), 2);
  }

  #[test]
  fn eviction_is_per_key() {
    let groups = MemoryGroups::default();
    groups.add_member("g1", AccountId(1));
    groups.add_member("g1", AccountId(2));
    let cache = GroupIncludeCache::new(groups.clone());
    cache.groups_with_member(AccountId(1)).unwrap();
    cache.groups_with_member(AccountId(2)).unwrap();

    cache.evict_groups_with_member(AccountId(1));
    cache.groups_with_member(AccountId(2)).unwrap();
    assert_eq!(groups.member_reads(), 2);
    cache.groups_with_member(AccountId(1)).unwrap();
    assert_eq!(groups.member_reads(), 3);
  }

  #[test]
  fn parent_groups_read_through_and_evict() {
    let groups = MemoryGroups::default();
    groups.add_subgroup("parent", "child");
    let cache = GroupIncludeCache::new(groups.clone());
    let child = GroupUuid::from("child");

    assert_eq!(*cache.parent_groups_of(&child).unwrap(), set(&["parent"]));
    groups.remove_subgroup("parent", "child");
    assert_eq!(*cache.parent_groups_of(&child).unwrap(), set(&["parent"]));

    cache.evict_parent_groups_of(&child);
    assert!(cache.parent_groups_of(&child).unwrap().is_empty());
  }

  #[test]
  fn external_members_exclude_internal_subgroups() {
    let groups = MemoryGroups::default();
    let internal = "f".repeat(64);
    groups.add_subgroup("parent", &internal);
    groups.add_subgroup("parent", "ldap:cn=ops");
    let cache = GroupIncludeCache::new(groups.clone());

    assert_eq!(*cache.all_external_members().unwrap(), set(&["ldap:cn=ops"]));

    groups.add_subgroup("parent", "ldap:cn=qa");
    cache.evict_all_external_members();
    assert_eq!(
      *cache.all_external_members().unwrap(),
      set(&["ldap:cn=ops", "ldap:cn=qa"])
    );
  }

  #[test]
  fn source_errors_propagate_and_are_not_cached() {
    let groups = MemoryGroups::default();
    groups.add_member("g1", AccountId(1));
    let cache = GroupIncludeCache::new(groups.clone());

    groups.set_offline(true);
    assert!(cache.groups_with_member(AccountId(1)).is_err());

    groups.set_offline(false);
    assert_eq!(*cache.groups_with_member(AccountId(1)).unwrap(), set(&["g1"]));
  }

  #[test]
  fn read_started_before_eviction_does_not_stick() {
    let groups = MemoryGroups::default();
    groups.add_member("g1", AccountId(1));
    let cache = GroupIncludeCache::new(groups.clone());

    let gate = groups.pause_next_member_read();
    thread::scope(|s| {
      let reader = s.spawn(|| cache.groups_with_member(AccountId(1)).unwrap());

      // The reader has read the old edges and is about to publish.
      gate.entered.wait();
      groups.remove_member("g1", AccountId(1));
      cache.evict_groups_with_member(AccountId(1));
      gate.release.wait();

      assert_eq!(*reader.join().unwrap(), set(&["g1"]));
    });

    assert!(cache.groups_with_member(AccountId(1)).unwrap().is_empty());
    assert_eq!(groups.member_reads(), 2);
  }
}
