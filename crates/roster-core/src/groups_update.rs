//! Group write path: store mutations followed by the cache evictions they
//! require.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
  Error, Result,
  account::AccountId,
  group::{GroupDescription, GroupUuid},
  group_uuid::{self, PersonIdent},
  include_cache::{GroupIncludeCache, GroupIncludeSource},
};

/// Group mutations supplied by the group store.
pub trait GroupWriter: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store a new group with its initial edges. `false` if a group with the
  /// same uuid already exists; nothing is written in that case.
  fn insert_group(
    &self,
    group: &GroupDescription,
    members: &[AccountId],
    subgroups: &[GroupUuid],
  ) -> std::result::Result<bool, Self::Error>;

  fn add_members(
    &self,
    group: &GroupUuid,
    members: &[AccountId],
  ) -> std::result::Result<(), Self::Error>;

  fn remove_members(
    &self,
    group: &GroupUuid,
    members: &[AccountId],
  ) -> std::result::Result<(), Self::Error>;

  fn add_subgroups(
    &self,
    group: &GroupUuid,
    subgroups: &[GroupUuid],
  ) -> std::result::Result<(), Self::Error>;

  fn remove_subgroups(
    &self,
    group: &GroupUuid,
    subgroups: &[GroupUuid],
  ) -> std::result::Result<(), Self::Error>;

  /// Apply `update` to the stored description and return the result, or
  /// `None` if no group has that uuid.
  fn update_group(
    &self,
    group: &GroupUuid,
    update: &GroupUpdate,
  ) -> std::result::Result<Option<GroupDescription>, Self::Error>;
}

/// Everything needed to create a group except its uuid, which is derived.
#[derive(Debug, Clone, Default)]
pub struct NewGroup {
  pub name:           String,
  pub url:            Option<String>,
  pub email:          Option<String>,
  pub visible_to_all: bool,
  pub owner:          Option<GroupUuid>,
  pub members:        Vec<AccountId>,
  pub subgroups:      Vec<GroupUuid>,
}

impl NewGroup {
  pub fn named(name: impl Into<String>) -> Self {
    Self { name: name.into(), ..Self::default() }
  }
}

/// Changes to a group's description. `None` leaves a field as it is; the
/// nested options of clearable fields set or clear them. The uuid never
/// changes, so a rename keeps every edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupUpdate {
  pub name:           Option<String>,
  pub url:            Option<Option<String>>,
  pub email:          Option<Option<String>>,
  pub visible_to_all: Option<bool>,
  pub owner:          Option<Option<GroupUuid>>,
}

impl GroupUpdate {
  pub fn apply(&self, group: &mut GroupDescription) {
    if let Some(name) = &self.name {
      group.name.clone_from(name);
    }
    if let Some(url) = &self.url {
      group.url.clone_from(url);
    }
    if let Some(email) = &self.email {
      group.email.clone_from(email);
    }
    if let Some(visible) = self.visible_to_all {
      group.visible_to_all = visible;
    }
    if let Some(owner) = &self.owner {
      group.owner.clone_from(owner);
    }
  }
}

/// Applies group mutations on behalf of one creator and evicts every
/// include-cache key the mutation touched before returning.
///
/// Evictions happen only after the store reports success. A failed write
/// leaves the cache as it was.
pub struct GroupsUpdate<W, S> {
  writer:        W,
  include_cache: Arc<GroupIncludeCache<S>>,
  creator:       PersonIdent,
}

impl<W: GroupWriter, S: GroupIncludeSource> GroupsUpdate<W, S> {
  pub fn new(
    writer: W,
    include_cache: Arc<GroupIncludeCache<S>>,
    creator: PersonIdent,
  ) -> Self {
    Self { writer, include_cache, creator }
  }

  /// Create a group. Its uuid is derived from the name and the creator.
  pub fn create_group(&self, group: NewGroup) -> Result<GroupDescription> {
    let name = group.name.trim();
    if name.is_empty() {
      return Err(Error::InvalidGroupName(group.name));
    }

    let uuid = group_uuid::make(name, &self.creator);
    let description = GroupDescription {
      uuid:           uuid.clone(),
      name:           name.to_owned(),
      url:            group.url,
      email:          group.email,
      visible_to_all: group.visible_to_all,
      owner:          group.owner,
    };

    let inserted = self
      .writer
      .insert_group(&description, &group.members, &group.subgroups)
      .map_err(Error::backend)?;
    if !inserted {
      return Err(Error::DuplicateGroup(uuid.to_string()));
    }

    info!(%uuid, group_name = name, creator = %self.creator, "created group");
    self.evict_members(&group.members);
    self.evict_subgroups(&group.subgroups);
    Ok(description)
  }

  pub fn add_members(&self, group: &GroupUuid, members: &[AccountId]) -> Result<()> {
    self
      .writer
      .add_members(group, members)
      .map_err(Error::backend)?;
    debug!(%group, count = members.len(), "added members");
    self.evict_members(members);
    Ok(())
  }

  pub fn remove_members(&self, group: &GroupUuid, members: &[AccountId]) -> Result<()> {
    self
      .writer
      .remove_members(group, members)
      .map_err(Error::backend)?;
    debug!(%group, count = members.len(), "removed members");
    self.evict_members(members);
    Ok(())
  }

  pub fn add_subgroups(&self, group: &GroupUuid, subgroups: &[GroupUuid]) -> Result<()> {
    self
      .writer
      .add_subgroups(group, subgroups)
      .map_err(Error::backend)?;
    debug!(%group, count = subgroups.len(), "added subgroups");
    self.evict_subgroups(subgroups);
    Ok(())
  }

  pub fn remove_subgroups(
    &self,
    group: &GroupUuid,
    subgroups: &[GroupUuid],
  ) -> Result<()> {
    self
      .writer
      .remove_subgroups(group, subgroups)
      .map_err(Error::backend)?;
    debug!(%group, count = subgroups.len(), "removed subgroups");
    self.evict_subgroups(subgroups);
    Ok(())
  }

  /// Edit a group's description. Unknown groups are `Ok(None)`. Edges are
  /// untouched, so no include-cache key changes.
  pub fn update_group(
    &self,
    group: &GroupUuid,
    mut update: GroupUpdate,
  ) -> Result<Option<GroupDescription>> {
    if let Some(name) = update.name.take() {
      let trimmed = name.trim();
      if trimmed.is_empty() {
        return Err(Error::InvalidGroupName(name));
      }
      update.name = Some(trimmed.to_owned());
    }

    let updated = self
      .writer
      .update_group(group, &update)
      .map_err(Error::backend)?;
    match &updated {
      Some(description) => {
        info!(%group, group_name = %description.name, editor = %self.creator, "updated group")
      }
      None => debug!(%group, "update of unknown group ignored"),
    }
    Ok(updated)
  }

  fn evict_members(&self, members: &[AccountId]) {
    for member in members {
      self.include_cache.evict_groups_with_member(*member);
    }
  }

  fn evict_subgroups(&self, subgroups: &[GroupUuid]) {
    for subgroup in subgroups {
      self.include_cache.evict_parent_groups_of(subgroup);
    }
    if subgroups.iter().any(|s| !s.is_internal()) {
      self.include_cache.evict_all_external_members();
    }
  }
}
