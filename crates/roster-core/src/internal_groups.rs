//! The backend for groups stored by this deployment.
//!
//! Descriptions come from a [`GroupStore`]; membership is the transitive
//! closure of the direct edges held in the [`GroupIncludeCache`].

use std::{
  collections::{HashSet, VecDeque},
  sync::{Arc, OnceLock},
};

use tracing::{debug, warn};

use crate::{
  account::{AccountId, IdentifiedUser},
  group::{GroupDescription, GroupMembership, GroupReference, GroupUuid, sort_references},
  group_backend::GroupBackend,
  include_cache::{GroupIncludeCache, GroupIncludeSource},
};

/// Read access to stored group descriptions.
pub trait GroupStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn group(&self, uuid: &GroupUuid) -> Result<Option<GroupDescription>, Self::Error>;

  /// Groups whose name starts with `prefix`, ignoring case.
  fn groups_with_prefix(&self, prefix: &str)
  -> Result<Vec<GroupDescription>, Self::Error>;
}

pub struct InternalGroupBackend<G, S> {
  groups:        G,
  include_cache: Arc<GroupIncludeCache<S>>,
}

impl<G: GroupStore, S: GroupIncludeSource> InternalGroupBackend<G, S> {
  pub fn new(groups: G, include_cache: Arc<GroupIncludeCache<S>>) -> Self {
    Self { groups, include_cache }
  }

  fn lookup(&self, uuid: &GroupUuid) -> Option<GroupDescription> {
    match self.groups.group(uuid) {
      Ok(group) => group,
      Err(e) => {
        warn!(%uuid, error = %e, "failed to read group");
        None
      }
    }
  }
}

impl<G, S> GroupBackend for InternalGroupBackend<G, S>
where
  G: GroupStore,
  S: GroupIncludeSource + 'static,
{
  fn handles(&self, uuid: &GroupUuid) -> bool { uuid.is_internal() }

  fn get(&self, uuid: &GroupUuid) -> Option<GroupDescription> {
    if !self.handles(uuid) {
      return None;
    }
    self.lookup(uuid)
  }

  fn suggest(&self, name_prefix: &str, _project: Option<&str>) -> Vec<GroupReference> {
    let groups = match self.groups.groups_with_prefix(name_prefix) {
      Ok(groups) => groups,
      Err(e) => {
        warn!(prefix = name_prefix, error = %e, "failed to suggest groups");
        return Vec::new();
      }
    };
    let mut refs: Vec<GroupReference> =
      groups.iter().map(GroupDescription::reference).collect();
    sort_references(&mut refs);
    refs
  }

  fn memberships_of(&self, user: &IdentifiedUser) -> Box<dyn GroupMembership> {
    Box::new(IncludingGroupMembership::new(
      Arc::clone(&self.include_cache),
      user.account_id,
    ))
  }

  fn is_visible_to_all(&self, uuid: &GroupUuid) -> bool {
    self.get(uuid).is_some_and(|g| g.visible_to_all)
  }
}

// ─── IncludingGroupMembership ────────────────────────────────────────────────

/// Transitive membership of one account over internal groups.
///
/// The closure is computed on first use: the account's direct groups, then
/// their parents breadth-first. Each group is expanded at most once, so
/// cycles in subgroup edges terminate. If the cache cannot be read the walk
/// stops and only the groups already proven are reported.
pub struct IncludingGroupMembership<S> {
  cache:   Arc<GroupIncludeCache<S>>,
  account: AccountId,
  closure: OnceLock<HashSet<GroupUuid>>,
}

impl<S: GroupIncludeSource> IncludingGroupMembership<S> {
  pub fn new(cache: Arc<GroupIncludeCache<S>>, account: AccountId) -> Self {
    Self { cache, account, closure: OnceLock::new() }
  }

  fn closure(&self) -> &HashSet<GroupUuid> {
    self.closure.get_or_init(|| self.walk())
  }

  fn walk(&self) -> HashSet<GroupUuid> {
    let direct = match self.cache.groups_with_member(self.account) {
      Ok(direct) => direct,
      Err(e) => {
        warn!(account = %self.account, error = %e, "failed to read direct groups");
        return HashSet::new();
      }
    };

    let mut seen: HashSet<GroupUuid> = direct.iter().cloned().collect();
    let mut queue: VecDeque<GroupUuid> = direct.iter().cloned().collect();
    while let Some(group) = queue.pop_front() {
      let parents = match self.cache.parent_groups_of(&group) {
        Ok(parents) => parents,
        Err(e) => {
          warn!(%group, error = %e, "failed to read parent groups");
          break;
        }
      };
      for parent in parents.iter() {
        if seen.insert(parent.clone()) {
          queue.push_back(parent.clone());
        }
      }
    }
    debug!(account = %self.account, groups = seen.len(), "resolved group membership");
    seen
  }
}

impl<S: GroupIncludeSource> GroupMembership for IncludingGroupMembership<S> {
  fn contains(&self, group: &GroupUuid) -> bool { self.closure().contains(group) }

  fn known_groups(&self) -> HashSet<GroupUuid> { self.closure().clone() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::MemoryGroups;

  fn uuid(c: char) -> GroupUuid { GroupUuid::new(c.to_string().repeat(64)) }

  fn backend(groups: &MemoryGroups) -> InternalGroupBackend<MemoryGroups, MemoryGroups> {
    InternalGroupBackend::new(
      groups.clone(),
      Arc::new(GroupIncludeCache::new(groups.clone())),
    )
  }

  #[test]
  fn handles_only_internal_uuids() {
    let b = backend(&MemoryGroups::default());
    assert!(b.handles(&uuid('a')));
    assert!(!b.handles(&"global:Registered-Users".into()));
    assert!(b.get(&"ldap:x".into()).is_none());
  }

  #[test]
  fn get_and_visibility_read_the_store() {
    let groups = MemoryGroups::default();
    groups.add_group(GroupDescription {
      visible_to_all: true,
      ..GroupDescription::new(uuid('a'), "Admins")
    });
    groups.add_group(GroupDescription::new(uuid('b'), "Builders"));
    let b = backend(&groups);

    assert_eq!(b.get(&uuid('a')).unwrap().name, "Admins");
    assert!(b.is_visible_to_all(&uuid('a')));
    assert!(!b.is_visible_to_all(&uuid('b')));
    assert!(!b.is_visible_to_all(&uuid('c')));
  }

  #[test]
  fn suggest_sorts_by_name() {
    let groups = MemoryGroups::default();
    groups.add_group(GroupDescription::new(uuid('b'), "Devs"));
    groups.add_group(GroupDescription::new(uuid('a'), "Designers"));
    groups.add_group(GroupDescription::new(uuid('c'), "Admins"));
    let b = backend(&groups);

    let names: Vec<String> =
      b.suggest("d", None).into_iter().map(|r| r.name).collect();
    assert_eq!(names, ["Designers", "Devs"]);
  }

  #[test]
  fn membership_is_transitive() {
    let groups = MemoryGroups::default();
    let (team, dept, org, other) = (uuid('1'), uuid('2'), uuid('3'), uuid('4'));
    groups.add_member(team.as_str(), AccountId(1));
    groups.add_subgroup(dept.as_str(), team.as_str());
    groups.add_subgroup(org.as_str(), dept.as_str());
    let b = backend(&groups);

    let m = b.memberships_of(&IdentifiedUser::new(AccountId(1)));
    assert!(m.contains(&team));
    assert!(m.contains(&dept));
    assert!(m.contains(&org));
    assert!(!m.contains(&other));
    assert_eq!(m.known_groups(), HashSet::from([team, dept, org]));
  }

  #[test]
  fn cycles_terminate() {
    let groups = MemoryGroups::default();
    let (a, b_) = (uuid('a'), uuid('b'));
    groups.add_member(a.as_str(), AccountId(1));
    groups.add_subgroup(a.as_str(), b_.as_str());
    groups.add_subgroup(b_.as_str(), a.as_str());
    let b = backend(&groups);

    let m = b.memberships_of(&IdentifiedUser::new(AccountId(1)));
    assert_eq!(m.known_groups(), HashSet::from([a, b_]));
  }

  #[test]
  fn closure_is_computed_once_per_membership() {
    let groups = MemoryGroups::default();
    groups.add_member(uuid('a').as_str(), AccountId(1));
    let b = backend(&groups);

    let m = b.memberships_of(&IdentifiedUser::new(AccountId(1)));
    m.contains(&uuid('a'));
    m.contains(&uuid('b'));
    m.known_groups();
    assert_eq!(groups.member_reads(), 1);
  }

  #[test]
  fn unreachable_store_fails_closed() {
    let groups = MemoryGroups::default();
    groups.add_member(uuid('a').as_str(), AccountId(1));
    let b = backend(&groups);
    groups.set_offline(true);

    let m = b.memberships_of(&IdentifiedUser::new(AccountId(1)));
    assert!(!m.contains(&uuid('a')));
    assert!(b.get(&uuid('a')).is_none());
    assert!(b.suggest("", None).is_empty());
  }
}
