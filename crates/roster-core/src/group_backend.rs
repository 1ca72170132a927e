//! The pluggable group backend contract and the composite that routes by
//! uuid namespace.

use std::{collections::HashSet, sync::Arc};

use tracing::debug;

use crate::{
  account::IdentifiedUser,
  group::{
    GroupDescription, GroupMembership, GroupReference, GroupUuid, sort_references,
  },
};

// ─── Contract ────────────────────────────────────────────────────────────────

/// A source of groups and membership answers.
///
/// Each backend owns a namespace of uuids, declared through
/// [`handles`](Self::handles). Namespaces of registered backends must not
/// overlap; a uuid claimed by two backends is a configuration error.
pub trait GroupBackend: Send + Sync {
  fn handles(&self, uuid: &GroupUuid) -> bool;

  /// `None` if the backend does not currently know `uuid`.
  fn get(&self, uuid: &GroupUuid) -> Option<GroupDescription>;

  /// Groups whose name starts with `name_prefix`, sorted by name. `project`
  /// narrows the suggestion to groups relevant to that project, for backends
  /// that can tell.
  fn suggest(&self, name_prefix: &str, project: Option<&str>) -> Vec<GroupReference>;

  /// A fresh membership capability for `user`.
  fn memberships_of(&self, user: &IdentifiedUser) -> Box<dyn GroupMembership>;

  fn is_visible_to_all(&self, uuid: &GroupUuid) -> bool;
}

// ─── UniversalGroupBackend ───────────────────────────────────────────────────

/// Dispatches every call to the first registered backend that handles the
/// uuid, in registration order.
#[derive(Clone, Default)]
pub struct UniversalGroupBackend {
  backends: Vec<Arc<dyn GroupBackend>>,
}

impl UniversalGroupBackend {
  pub fn new(backends: Vec<Arc<dyn GroupBackend>>) -> Self { Self { backends } }

  pub fn register(&mut self, backend: Arc<dyn GroupBackend>) {
    self.backends.push(backend);
  }

  fn backend_for(&self, uuid: &GroupUuid) -> Option<&Arc<dyn GroupBackend>> {
    let found = self.backends.iter().find(|b| b.handles(uuid));
    if found.is_none() {
      debug!(%uuid, "no group backend handles uuid");
    }
    found
  }
}

impl GroupBackend for UniversalGroupBackend {
  fn handles(&self, uuid: &GroupUuid) -> bool { self.backend_for(uuid).is_some() }

  fn get(&self, uuid: &GroupUuid) -> Option<GroupDescription> {
    self.backend_for(uuid)?.get(uuid)
  }

  fn suggest(&self, name_prefix: &str, project: Option<&str>) -> Vec<GroupReference> {
    let mut refs: Vec<GroupReference> = self
      .backends
      .iter()
      .flat_map(|b| b.suggest(name_prefix, project))
      .collect();
    sort_references(&mut refs);
    refs.dedup();
    refs
  }

  fn memberships_of(&self, user: &IdentifiedUser) -> Box<dyn GroupMembership> {
    Box::new(UniversalGroupMembership {
      memberships: self
        .backends
        .iter()
        .map(|b| (Arc::clone(b), b.memberships_of(user)))
        .collect(),
    })
  }

  fn is_visible_to_all(&self, uuid: &GroupUuid) -> bool {
    self.backend_for(uuid).is_some_and(|b| b.is_visible_to_all(uuid))
  }
}

/// Routes each membership question to the membership of the backend that
/// handles the asked uuid.
pub struct UniversalGroupMembership {
  memberships: Vec<(Arc<dyn GroupBackend>, Box<dyn GroupMembership>)>,
}

impl UniversalGroupMembership {
  fn membership_for(&self, uuid: &GroupUuid) -> Option<&dyn GroupMembership> {
    self
      .memberships
      .iter()
      .find(|(backend, _)| backend.handles(uuid))
      .map(|(_, m)| m.as_ref())
  }
}

impl GroupMembership for UniversalGroupMembership {
  fn contains(&self, group: &GroupUuid) -> bool {
    self.membership_for(group).is_some_and(|m| m.contains(group))
  }

  fn known_groups(&self) -> HashSet<GroupUuid> {
    self
      .memberships
      .iter()
      .flat_map(|(_, m)| m.known_groups())
      .collect()
  }
}
