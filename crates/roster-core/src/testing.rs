//! In-memory stores shared by the unit tests of this crate.
//!
//! Every mock is `Clone`; clones share state, so a test can keep a handle to
//! inspect read counters after handing the store to the code under test.

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Arc, Barrier,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use parking_lot::Mutex;
use thiserror::Error;

use crate::{
  account::{AccountId, IdentifiedUser},
  directory::{AccountRecord, AccountRecordSource},
  drafts::{ChangeId, DraftSource, DraftWriter},
  group::{GroupDescription, GroupMembership, GroupReference, GroupUuid, ListGroupMembership},
  group_backend::GroupBackend,
  groups_update::{GroupUpdate, GroupWriter},
  include_cache::GroupIncludeSource,
  internal_groups::GroupStore,
  realm::{AccountLookup, CredentialStore, Credentials},
};

#[derive(Debug, Error)]
#[error("store offline")]
pub struct Offline;

// ─── Accounts ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct AccountsState {
  records:   HashMap<AccountId, AccountRecord>,
  passwords: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct MemoryAccounts {
  state:      Arc<Mutex<AccountsState>>,
  offline:    Arc<AtomicBool>,
  bulk_reads: Arc<AtomicUsize>,
}

impl MemoryAccounts {
  /// Alice (1) with two emails, Bob (2), and Carol (3) who is inactive.
  pub fn sample() -> Self {
    let store = Self::default();
    store.insert(AccountRecord {
      full_name: Some("Alice Liddell".into()),
      display_name: Some("Alice".into()),
      preferred_email: Some("alice@example.com".into()),
      emails: vec!["alice@wonderland.example".into(), "alice@example.com".into()],
      username: Some("alice".into()),
      status: Some("down the rabbit hole".into()),
      ..AccountRecord::new(AccountId(1))
    });
    store.insert(AccountRecord {
      full_name: Some("Bob Builder".into()),
      preferred_email: Some("bob@example.com".into()),
      emails: vec!["bob@example.com".into()],
      username: Some("bob".into()),
      ..AccountRecord::new(AccountId(2))
    });
    store.insert(AccountRecord {
      full_name: Some("Carol Danvers".into()),
      username: Some("carol".into()),
      active: false,
      ..AccountRecord::new(AccountId(3))
    });
    store
  }

  pub fn insert(&self, record: AccountRecord) {
    self.state.lock().records.insert(record.account_id, record);
  }

  pub fn remove(&self, account: AccountId) { self.state.lock().records.remove(&account); }

  pub fn set_password(&self, username: &str, hash: &str) {
    self
      .state
      .lock()
      .passwords
      .insert(username.to_owned(), hash.to_owned());
  }

  pub fn set_offline(&self, offline: bool) { self.offline.store(offline, Ordering::SeqCst); }

  pub fn bulk_reads(&self) -> usize { self.bulk_reads.load(Ordering::SeqCst) }

  fn check(&self) -> Result<(), Offline> {
    if self.offline.load(Ordering::SeqCst) { Err(Offline) } else { Ok(()) }
  }
}

impl AccountRecordSource for MemoryAccounts {
  type Error = Offline;

  fn accounts(
    &self,
    ids: &[AccountId],
  ) -> Result<HashMap<AccountId, AccountRecord>, Offline> {
    self.check()?;
    self.bulk_reads.fetch_add(1, Ordering::SeqCst);
    let state = self.state.lock();
    Ok(
      ids
        .iter()
        .filter_map(|id| state.records.get(id).map(|r| (*id, r.clone())))
        .collect(),
    )
  }
}

impl AccountLookup for MemoryAccounts {
  type Error = Offline;

  fn account_by_username(&self, username: &str) -> Result<Option<AccountId>, Offline> {
    self.check()?;
    Ok(
      self
        .state
        .lock()
        .records
        .values()
        .find(|r| r.username.as_deref() == Some(username))
        .map(|r| r.account_id),
    )
  }

  fn emails_of(&self, account: AccountId) -> Result<Vec<String>, Offline> {
    self.check()?;
    Ok(
      self
        .state
        .lock()
        .records
        .get(&account)
        .map(|r| r.emails.clone())
        .unwrap_or_default(),
    )
  }
}

impl CredentialStore for MemoryAccounts {
  fn credentials(&self, username: &str) -> Result<Option<Credentials>, Offline> {
    self.check()?;
    let state = self.state.lock();
    let Some(record) = state
      .records
      .values()
      .find(|r| r.username.as_deref() == Some(username))
    else {
      return Ok(None);
    };
    Ok(state.passwords.get(username).map(|hash| Credentials {
      account_id:    record.account_id,
      password_hash: hash.clone(),
      active:        record.active,
    }))
  }
}

// ─── Groups ──────────────────────────────────────────────────────────────────

/// Pauses one `groups_with_member` read after it has read the store and
/// before it returns.
pub struct ReadGate {
  pub entered: Barrier,
  pub release: Barrier,
}

#[derive(Default)]
struct GroupsState {
  groups:    HashMap<GroupUuid, GroupDescription>,
  members:   HashMap<GroupUuid, HashSet<AccountId>>,
  subgroups: HashMap<GroupUuid, HashSet<GroupUuid>>,
  gate:      Option<Arc<ReadGate>>,
}

#[derive(Clone, Default)]
pub struct MemoryGroups {
  state:        Arc<Mutex<GroupsState>>,
  offline:      Arc<AtomicBool>,
  member_reads: Arc<AtomicUsize>,
}

impl MemoryGroups {
  pub fn add_group(&self, group: GroupDescription) {
    self.state.lock().groups.insert(group.uuid.clone(), group);
  }

  pub fn add_member(&self, group: &str, account: AccountId) {
    self
      .state
      .lock()
      .members
      .entry(group.into())
      .or_default()
      .insert(account);
  }

  pub fn remove_member(&self, group: &str, account: AccountId) {
    if let Some(members) = self.state.lock().members.get_mut(&GroupUuid::from(group)) {
      members.remove(&account);
    }
  }

  pub fn add_subgroup(&self, parent: &str, child: &str) {
    self
      .state
      .lock()
      .subgroups
      .entry(parent.into())
      .or_default()
      .insert(child.into());
  }

  pub fn remove_subgroup(&self, parent: &str, child: &str) {
    if let Some(children) = self.state.lock().subgroups.get_mut(&GroupUuid::from(parent)) {
      children.remove(&GroupUuid::from(child));
    }
  }

  pub fn set_offline(&self, offline: bool) { self.offline.store(offline, Ordering::SeqCst); }

  pub fn member_reads(&self) -> usize { self.member_reads.load(Ordering::SeqCst) }

  pub fn pause_next_member_read(&self) -> Arc<ReadGate> {
    let gate = Arc::new(ReadGate { entered: Barrier::new(2), release: Barrier::new(2) });
    self.state.lock().gate = Some(Arc::clone(&gate));
    gate
  }

  fn check(&self) -> Result<(), Offline> {
    if self.offline.load(Ordering::SeqCst) { Err(Offline) } else { Ok(()) }
  }
}

impl GroupIncludeSource for MemoryGroups {
  type Error = Offline;

  fn groups_with_member(&self, account: AccountId) -> Result<HashSet<GroupUuid>, Offline> {
    self.check()?;
    self.member_reads.fetch_add(1, Ordering::SeqCst);
    let (found, gate) = {
      let mut state = self.state.lock();
      let found: HashSet<GroupUuid> = state
        .members
        .iter()
        .filter(|(_, members)| members.contains(&account))
        .map(|(group, _)| group.clone())
        .collect();
      (found, state.gate.take())
    };
    if let Some(gate) = gate {
      gate.entered.wait();
      gate.release.wait();
    }
    Ok(found)
  }

  fn parent_groups_of(&self, group: &GroupUuid) -> Result<HashSet<GroupUuid>, Offline> {
    self.check()?;
    Ok(
      self
        .state
        .lock()
        .subgroups
        .iter()
        .filter(|(_, children)| children.contains(group))
        .map(|(parent, _)| parent.clone())
        .collect(),
    )
  }

  fn all_external_members(&self) -> Result<HashSet<GroupUuid>, Offline> {
    self.check()?;
    Ok(
      self
        .state
        .lock()
        .subgroups
        .values()
        .flatten()
        .filter(|child| !child.is_internal())
        .cloned()
        .collect(),
    )
  }
}

impl GroupStore for MemoryGroups {
  type Error = Offline;

  fn group(&self, uuid: &GroupUuid) -> Result<Option<GroupDescription>, Offline> {
    self.check()?;
    Ok(self.state.lock().groups.get(uuid).cloned())
  }

  fn groups_with_prefix(&self, prefix: &str) -> Result<Vec<GroupDescription>, Offline> {
    self.check()?;
    let prefix = prefix.to_lowercase();
    Ok(
      self
        .state
        .lock()
        .groups
        .values()
        .filter(|g| g.name.to_lowercase().starts_with(&prefix))
        .cloned()
        .collect(),
    )
  }
}

impl GroupWriter for MemoryGroups {
  type Error = Offline;

  fn insert_group(
    &self,
    group: &GroupDescription,
    members: &[AccountId],
    subgroups: &[GroupUuid],
  ) -> Result<bool, Offline> {
    self.check()?;
    let mut state = self.state.lock();
    if state.groups.contains_key(&group.uuid) {
      return Ok(false);
    }
    state.groups.insert(group.uuid.clone(), group.clone());
    state
      .members
      .insert(group.uuid.clone(), members.iter().copied().collect());
    state
      .subgroups
      .insert(group.uuid.clone(), subgroups.iter().cloned().collect());
    Ok(true)
  }

  fn add_members(&self, group: &GroupUuid, members: &[AccountId]) -> Result<(), Offline> {
    self.check()?;
    self
      .state
      .lock()
      .members
      .entry(group.clone())
      .or_default()
      .extend(members.iter().copied());
    Ok(())
  }

  fn remove_members(&self, group: &GroupUuid, members: &[AccountId]) -> Result<(), Offline> {
    self.check()?;
    if let Some(existing) = self.state.lock().members.get_mut(group) {
      for member in members {
        existing.remove(member);
      }
    }
    Ok(())
  }

  fn add_subgroups(&self, group: &GroupUuid, subgroups: &[GroupUuid]) -> Result<(), Offline> {
    self.check()?;
    self
      .state
      .lock()
      .subgroups
      .entry(group.clone())
      .or_default()
      .extend(subgroups.iter().cloned());
    Ok(())
  }

  fn remove_subgroups(
    &self,
    group: &GroupUuid,
    subgroups: &[GroupUuid],
  ) -> Result<(), Offline> {
    self.check()?;
    if let Some(existing) = self.state.lock().subgroups.get_mut(group) {
      for subgroup in subgroups {
        existing.remove(subgroup);
      }
    }
    Ok(())
  }

  fn update_group(
    &self,
    group: &GroupUuid,
    update: &GroupUpdate,
  ) -> Result<Option<GroupDescription>, Offline> {
    self.check()?;
    Ok(self.state.lock().groups.get_mut(group).map(|description| {
      update.apply(description);
      description.clone()
    }))
  }
}

// ─── Drafts ──────────────────────────────────────────────────────────────────

struct Draft {
  account: AccountId,
  change:  ChangeId,
  message: String,
}

#[derive(Default)]
struct DraftsState {
  drafts:  HashMap<String, Draft>,
  next_id: u32,
}

#[derive(Clone, Default)]
pub struct MemoryDrafts {
  state: Arc<Mutex<DraftsState>>,
  reads: Arc<AtomicUsize>,
}

impl MemoryDrafts {
  pub fn reads(&self) -> usize { self.reads.load(Ordering::SeqCst) }
}

impl DraftSource for MemoryDrafts {
  type Error = Offline;

  fn changes_with_drafts(&self, account: AccountId) -> Result<HashSet<ChangeId>, Offline> {
    self.reads.fetch_add(1, Ordering::SeqCst);
    Ok(
      self
        .state
        .lock()
        .drafts
        .values()
        .filter(|d| d.account == account)
        .map(|d| d.change)
        .collect(),
    )
  }
}

impl DraftWriter for MemoryDrafts {
  type Error = Offline;

  fn create_draft(
    &self,
    account: AccountId,
    change: ChangeId,
    message: &str,
  ) -> Result<String, Offline> {
    let mut state = self.state.lock();
    state.next_id += 1;
    let id = format!("draft-{}", state.next_id);
    state
      .drafts
      .insert(id.clone(), Draft { account, change, message: message.to_owned() });
    Ok(id)
  }

  fn update_draft(
    &self,
    account: AccountId,
    draft_id: &str,
    message: &str,
  ) -> Result<bool, Offline> {
    let mut state = self.state.lock();
    match state.drafts.get_mut(draft_id) {
      Some(draft) if draft.account == account => {
        draft.message = message.to_owned();
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  fn delete_draft(&self, account: AccountId, draft_id: &str) -> Result<bool, Offline> {
    let mut state = self.state.lock();
    if state.drafts.get(draft_id).is_some_and(|d| d.account == account) {
      state.drafts.remove(draft_id);
      Ok(true)
    } else {
      Ok(false)
    }
  }

  fn publish_drafts(&self, account: AccountId, change: ChangeId) -> Result<usize, Offline> {
    let mut state = self.state.lock();
    let before = state.drafts.len();
    state
      .drafts
      .retain(|_, d| !(d.account == account && d.change == change));
    Ok(before - state.drafts.len())
  }
}

// ─── Group backend ───────────────────────────────────────────────────────────

#[derive(Default)]
struct StaticState {
  groups:  Vec<GroupDescription>,
  members: HashMap<GroupUuid, HashSet<AccountId>>,
}

/// A fixed backend owning every uuid with a given prefix.
#[derive(Clone)]
pub struct StaticBackend {
  prefix:    String,
  state:     Arc<Mutex<StaticState>>,
  get_calls: Arc<AtomicUsize>,
}

impl StaticBackend {
  pub fn new(prefix: &str) -> Self {
    Self {
      prefix:    prefix.to_owned(),
      state:     Arc::default(),
      get_calls: Arc::default(),
    }
  }

  pub fn with_group(self, uuid: &str, name: &str) -> Self {
    self
      .state
      .lock()
      .groups
      .push(GroupDescription::new(uuid.into(), name));
    self
  }

  pub fn with_visible(self, uuid: &str) -> Self {
    if let Some(group) = self
      .state
      .lock()
      .groups
      .iter_mut()
      .find(|g| g.uuid.as_str() == uuid)
    {
      group.visible_to_all = true;
    }
    self
  }

  pub fn with_member(self, uuid: &str, account: AccountId) -> Self {
    self
      .state
      .lock()
      .members
      .entry(uuid.into())
      .or_default()
      .insert(account);
    self
  }

  pub fn get_calls(&self) -> usize { self.get_calls.load(Ordering::SeqCst) }
}

impl GroupBackend for StaticBackend {
  fn handles(&self, uuid: &GroupUuid) -> bool { uuid.as_str().starts_with(&self.prefix) }

  fn get(&self, uuid: &GroupUuid) -> Option<GroupDescription> {
    self.get_calls.fetch_add(1, Ordering::SeqCst);
    self.state.lock().groups.iter().find(|g| &g.uuid == uuid).cloned()
  }

  fn suggest(&self, name_prefix: &str, _project: Option<&str>) -> Vec<GroupReference> {
    let mut refs: Vec<GroupReference> = self
      .state
      .lock()
      .groups
      .iter()
      .filter(|g| g.name.starts_with(name_prefix))
      .map(GroupDescription::reference)
      .collect();
    refs.sort_by(|a, b| a.name.cmp(&b.name));
    refs
  }

  fn memberships_of(&self, user: &IdentifiedUser) -> Box<dyn GroupMembership> {
    let groups: Vec<GroupUuid> = self
      .state
      .lock()
      .members
      .iter()
      .filter(|(_, members)| members.contains(&user.account_id))
      .map(|(uuid, _)| uuid.clone())
      .collect();
    Box::new(ListGroupMembership::new(groups))
  }

  fn is_visible_to_all(&self, uuid: &GroupUuid) -> bool {
    self
      .state
      .lock()
      .groups
      .iter()
      .any(|g| &g.uuid == uuid && g.visible_to_all)
  }
}
