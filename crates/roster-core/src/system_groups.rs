//! Synthetic groups every deployment has, independent of any store.

use crate::{
  account::IdentifiedUser,
  group::{
    GroupDescription, GroupMembership, GroupReference, GroupUuid, ListGroupMembership,
    sort_references,
  },
  group_backend::GroupBackend,
};

/// Namespace prefix of system group uuids.
pub const SYSTEM_GROUP_PREFIX: &str = "global:";

/// Everyone, signed in or not.
pub const ANONYMOUS_USERS: &str = "global:Anonymous-Users";

/// Every identified user.
pub const REGISTERED_USERS: &str = "global:Registered-Users";

/// Backend for the `global:` namespace.
#[derive(Debug, Clone)]
pub struct SystemGroupBackend {
  groups: Vec<GroupDescription>,
}

impl Default for SystemGroupBackend {
  fn default() -> Self {
    let groups = [(ANONYMOUS_USERS, "Anonymous Users"), (REGISTERED_USERS, "Registered Users")]
      .into_iter()
      .map(|(uuid, name)| GroupDescription {
        visible_to_all: true,
        ..GroupDescription::new(uuid.into(), name)
      })
      .collect();
    Self { groups }
  }
}

impl SystemGroupBackend {
  pub fn new() -> Self { Self::default() }
}

impl GroupBackend for SystemGroupBackend {
  fn handles(&self, uuid: &GroupUuid) -> bool {
    uuid.as_str().starts_with(SYSTEM_GROUP_PREFIX)
  }

  fn get(&self, uuid: &GroupUuid) -> Option<GroupDescription> {
    self.groups.iter().find(|g| &g.uuid == uuid).cloned()
  }

  fn suggest(&self, name_prefix: &str, _project: Option<&str>) -> Vec<GroupReference> {
    let prefix = name_prefix.to_lowercase();
    let mut refs: Vec<GroupReference> = self
      .groups
      .iter()
      .filter(|g| g.name.to_lowercase().starts_with(&prefix))
      .map(GroupDescription::reference)
      .collect();
    sort_references(&mut refs);
    refs
  }

  fn memberships_of(&self, _user: &IdentifiedUser) -> Box<dyn GroupMembership> {
    Box::new(ListGroupMembership::new([
      ANONYMOUS_USERS.into(),
      REGISTERED_USERS.into(),
    ]))
  }

  fn is_visible_to_all(&self, uuid: &GroupUuid) -> bool { self.handles(uuid) }
}
