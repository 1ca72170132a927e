//! [`SqliteStore`]: the SQLite implementation of the `roster-core` source
//! and writer traits.

use std::{
  collections::{HashMap, HashSet},
  path::Path,
  sync::Arc,
};

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension as _, params, params_from_iter};
use tracing::debug;
use uuid::Uuid;

use roster_core::{
  account::AccountId,
  directory::{AccountRecord, AccountRecordSource},
  drafts::{ChangeId, DraftSource, DraftWriter},
  group::{GroupDescription, GroupUuid},
  groups_update::{GroupUpdate, GroupWriter},
  include_cache::GroupIncludeSource,
  internal_groups::GroupStore,
  realm::{AccountLookup, CredentialStore, Credentials},
};

use crate::{
  Error, Result,
  encode::{
    ACCOUNT_COLUMNS, GROUP_COLUMNS, RawAccount, RawGroup, encode_dt, encode_uuid,
    like_prefix, placeholders,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Ids bound per `IN (…)` query, well under SQLite's bound-variable limit.
const IN_LIST_CHUNK: usize = 500;

/// A Roster store backed by a single SQLite file.
///
/// Cloning is cheap; clones share one connection. Calls block the current
/// thread for the duration of the query.
#[derive(Clone)]
pub struct SqliteStore {
  conn: Arc<Mutex<Connection>>,
}

/// The profile of an account to register.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
  pub username:        Option<String>,
  pub full_name:       Option<String>,
  pub display_name:    Option<String>,
  /// Also registered as one of the account's emails.
  pub preferred_email: Option<String>,
  pub status:          Option<String>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::init(Connection::open(path)?)
  }

  /// Open an in-memory store, useful for testing.
  pub fn open_in_memory() -> Result<Self> { Self::init(Connection::open_in_memory()?) }

  fn init(conn: Connection) -> Result<Self> {
    conn.execute_batch(SCHEMA)?;
    Ok(Self { conn: Arc::new(Mutex::new(conn)) })
  }

  // ── Account writes ────────────────────────────────────────────────────────

  pub fn add_account(&self, account: NewAccount) -> Result<AccountId> {
    let mut conn = self.conn.lock();
    let tx = conn.transaction()?;

    if let Some(username) = &account.username {
      let taken = tx
        .query_row(
          "SELECT 1 FROM accounts WHERE username = ?1",
          params![username],
          |_| Ok(()),
        )
        .optional()?
        .is_some();
      if taken {
        return Err(Error::UsernameTaken(username.clone()));
      }
    }

    let id: u32 = tx.query_row(
      "INSERT INTO accounts (
         username, full_name, display_name, preferred_email, status, registered_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
       RETURNING account_id",
      params![
        account.username,
        account.full_name,
        account.display_name,
        account.preferred_email,
        account.status,
        encode_dt(Utc::now()),
      ],
      |row| row.get(0),
    )?;

    if let Some(email) = &account.preferred_email {
      tx.execute(
        "INSERT OR IGNORE INTO account_emails (account_id, email) VALUES (?1, ?2)",
        params![id, email],
      )?;
    }
    tx.commit()?;

    debug!(account = id, username = ?account.username, "registered account");
    Ok(AccountId(id))
  }

  pub fn add_email(&self, account: AccountId, email: &str) -> Result<()> {
    let conn = self.conn.lock();
    ensure_account(&conn, account)?;
    conn.execute(
      "INSERT OR IGNORE INTO account_emails (account_id, email) VALUES (?1, ?2)",
      params![account.get(), email],
    )?;
    Ok(())
  }

  /// Store an argon2 PHC string for the account.
  pub fn set_password_hash(&self, account: AccountId, hash: &str) -> Result<()> {
    self.update_account(
      account,
      "UPDATE accounts SET password_hash = ?2 WHERE account_id = ?1",
      hash,
    )
  }

  pub fn set_active(&self, account: AccountId, active: bool) -> Result<()> {
    self.update_account(
      account,
      "UPDATE accounts SET active = ?2 WHERE account_id = ?1",
      active,
    )
  }

  fn update_account(
    &self,
    account: AccountId,
    sql: &str,
    value: impl rusqlite::ToSql,
  ) -> Result<()> {
    let changed = self.conn.lock().execute(sql, params![account.get(), value])?;
    if changed == 0 {
      return Err(Error::AccountNotFound(account));
    }
    Ok(())
  }
}

fn ensure_account(conn: &Connection, account: AccountId) -> Result<()> {
  conn
    .query_row(
      "SELECT 1 FROM accounts WHERE account_id = ?1",
      params![account.get()],
      |_| Ok(()),
    )
    .optional()?
    .ok_or(Error::AccountNotFound(account))
}

fn query_uuids(
  conn: &Connection,
  sql: &str,
  param: impl rusqlite::ToSql,
) -> Result<Vec<GroupUuid>> {
  let mut stmt = conn.prepare(sql)?;
  let uuids = stmt
    .query_map(params![param], |row| row.get::<_, String>(0))?
    .map(|r| r.map(GroupUuid::new))
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(uuids)
}

fn insert_members(conn: &Connection, group: &GroupUuid, members: &[AccountId]) -> Result<()> {
  let mut stmt = conn.prepare(
    "INSERT OR IGNORE INTO group_members (group_uuid, account_id) VALUES (?1, ?2)",
  )?;
  for member in members {
    stmt.execute(params![group.as_str(), member.get()])?;
  }
  Ok(())
}

fn insert_subgroups(
  conn: &Connection,
  group: &GroupUuid,
  subgroups: &[GroupUuid],
) -> Result<()> {
  let mut stmt = conn.prepare(
    "INSERT OR IGNORE INTO group_subgroups (group_uuid, subgroup_uuid) VALUES (?1, ?2)",
  )?;
  for subgroup in subgroups {
    stmt.execute(params![group.as_str(), subgroup.as_str()])?;
  }
  Ok(())
}

// ─── Accounts ────────────────────────────────────────────────────────────────

impl AccountRecordSource for SqliteStore {
  type Error = Error;

  fn accounts(&self, ids: &[AccountId]) -> Result<HashMap<AccountId, AccountRecord>> {
    if ids.is_empty() {
      return Ok(HashMap::new());
    }
    let conn = self.conn.lock();
    let mut raws = Vec::with_capacity(ids.len());
    let mut emails: HashMap<u32, Vec<String>> = HashMap::new();

    for chunk in ids.chunks(IN_LIST_CHUNK) {
      let list = placeholders(chunk.len());
      let id_params = || params_from_iter(chunk.iter().map(|id| id.get()));

      let mut stmt = conn.prepare_cached(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id IN ({list})"
      ))?;
      for raw in stmt.query_map(id_params(), RawAccount::from_row)? {
        raws.push(raw?);
      }

      let mut stmt = conn.prepare_cached(&format!(
        "SELECT account_id, email FROM account_emails WHERE account_id IN ({list})"
      ))?;
      let rows = stmt.query_map(id_params(), |row| {
        Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?))
      })?;
      for row in rows {
        let (id, email) = row?;
        emails.entry(id).or_default().push(email);
      }
    }

    debug!(requested = ids.len(), found = raws.len(), "read account records");
    Ok(
      raws
        .into_iter()
        .map(|raw| {
          let found = emails.remove(&raw.account_id).unwrap_or_default();
          let record = raw.into_record(found);
          (record.account_id, record)
        })
        .collect(),
    )
  }
}

impl AccountLookup for SqliteStore {
  type Error = Error;

  fn account_by_username(&self, username: &str) -> Result<Option<AccountId>> {
    let id: Option<u32> = self
      .conn
      .lock()
      .query_row(
        "SELECT account_id FROM accounts WHERE username = ?1",
        params![username],
        |row| row.get(0),
      )
      .optional()?;
    Ok(id.map(AccountId))
  }

  fn emails_of(&self, account: AccountId) -> Result<Vec<String>> {
    let conn = self.conn.lock();
    let mut stmt = conn
      .prepare("SELECT email FROM account_emails WHERE account_id = ?1 ORDER BY email")?;
    let emails = stmt
      .query_map(params![account.get()], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(emails)
  }
}

impl CredentialStore for SqliteStore {
  fn credentials(&self, username: &str) -> Result<Option<Credentials>> {
    let row: Option<(u32, String, bool)> = self
      .conn
      .lock()
      .query_row(
        "SELECT account_id, password_hash, active FROM accounts
         WHERE username = ?1 AND password_hash IS NOT NULL",
        params![username],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()?;
    Ok(row.map(|(id, password_hash, active)| Credentials {
      account_id: AccountId(id),
      password_hash,
      active,
    }))
  }
}

// ─── Groups ──────────────────────────────────────────────────────────────────

impl GroupStore for SqliteStore {
  type Error = Error;

  fn group(&self, uuid: &GroupUuid) -> Result<Option<GroupDescription>> {
    let raw = self
      .conn
      .lock()
      .query_row(
        &format!("SELECT {GROUP_COLUMNS} FROM groups WHERE group_uuid = ?1"),
        params![uuid.as_str()],
        RawGroup::from_row,
      )
      .optional()?;
    Ok(raw.map(RawGroup::into_description))
  }

  fn groups_with_prefix(&self, prefix: &str) -> Result<Vec<GroupDescription>> {
    let conn = self.conn.lock();
    let mut stmt = conn.prepare(&format!(
      "SELECT {GROUP_COLUMNS} FROM groups WHERE name LIKE ?1 ESCAPE '\\' ORDER BY name"
    ))?;
    let groups = stmt
      .query_map(params![like_prefix(prefix)], RawGroup::from_row)?
      .map(|r| r.map(RawGroup::into_description))
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(groups)
  }
}

impl GroupIncludeSource for SqliteStore {
  type Error = Error;

  fn groups_with_member(&self, account: AccountId) -> Result<HashSet<GroupUuid>> {
    let conn = self.conn.lock();
    let uuids = query_uuids(
      &conn,
      "SELECT group_uuid FROM group_members WHERE account_id = ?1",
      account.get(),
    )?;
    Ok(uuids.into_iter().collect())
  }

  fn parent_groups_of(&self, group: &GroupUuid) -> Result<HashSet<GroupUuid>> {
    let conn = self.conn.lock();
    let uuids = query_uuids(
      &conn,
      "SELECT group_uuid FROM group_subgroups WHERE subgroup_uuid = ?1",
      group.as_str(),
    )?;
    Ok(uuids.into_iter().collect())
  }

  fn all_external_members(&self) -> Result<HashSet<GroupUuid>> {
    let conn = self.conn.lock();
    let mut stmt = conn.prepare("SELECT DISTINCT subgroup_uuid FROM group_subgroups")?;
    let uuids = stmt
      .query_map([], |row| row.get::<_, String>(0))?
      .map(|r| r.map(GroupUuid::new))
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(uuids.into_iter().filter(|u| !u.is_internal()).collect())
  }
}

impl GroupWriter for SqliteStore {
  type Error = Error;

  fn insert_group(
    &self,
    group: &GroupDescription,
    members: &[AccountId],
    subgroups: &[GroupUuid],
  ) -> Result<bool> {
    let mut conn = self.conn.lock();
    let tx = conn.transaction()?;
    let inserted = tx.execute(
      "INSERT OR IGNORE INTO groups (
         group_uuid, name, url, email, visible_to_all, owner_uuid, created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      params![
        group.uuid.as_str(),
        group.name,
        group.url,
        group.email,
        group.visible_to_all,
        group.owner.as_ref().map(GroupUuid::as_str),
        encode_dt(Utc::now()),
      ],
    )?;
    if inserted == 0 {
      return Ok(false);
    }
    insert_members(&tx, &group.uuid, members)?;
    insert_subgroups(&tx, &group.uuid, subgroups)?;
    tx.commit()?;
    Ok(true)
  }

  fn add_members(&self, group: &GroupUuid, members: &[AccountId]) -> Result<()> {
    let mut conn = self.conn.lock();
    let tx = conn.transaction()?;
    insert_members(&tx, group, members)?;
    tx.commit()?;
    Ok(())
  }

  fn remove_members(&self, group: &GroupUuid, members: &[AccountId]) -> Result<()> {
    let mut conn = self.conn.lock();
    let tx = conn.transaction()?;
    {
      let mut stmt = tx.prepare(
        "DELETE FROM group_members WHERE group_uuid = ?1 AND account_id = ?2",
      )?;
      for member in members {
        stmt.execute(params![group.as_str(), member.get()])?;
      }
    }
    tx.commit()?;
    Ok(())
  }

  fn add_subgroups(&self, group: &GroupUuid, subgroups: &[GroupUuid]) -> Result<()> {
    let mut conn = self.conn.lock();
    let tx = conn.transaction()?;
    insert_subgroups(&tx, group, subgroups)?;
    tx.commit()?;
    Ok(())
  }

  fn remove_subgroups(&self, group: &GroupUuid, subgroups: &[GroupUuid]) -> Result<()> {
    let mut conn = self.conn.lock();
    let tx = conn.transaction()?;
    {
      let mut stmt = tx.prepare(
        "DELETE FROM group_subgroups WHERE group_uuid = ?1 AND subgroup_uuid = ?2",
      )?;
      for subgroup in subgroups {
        stmt.execute(params![group.as_str(), subgroup.as_str()])?;
      }
    }
    tx.commit()?;
    Ok(())
  }

  fn update_group(
    &self,
    group: &GroupUuid,
    update: &GroupUpdate,
  ) -> Result<Option<GroupDescription>> {
    let mut conn = self.conn.lock();
    let tx = conn.transaction()?;
    let Some(raw) = tx
      .query_row(
        &format!("SELECT {GROUP_COLUMNS} FROM groups WHERE group_uuid = ?1"),
        params![group.as_str()],
        RawGroup::from_row,
      )
      .optional()?
    else {
      return Ok(None);
    };

    let mut description = raw.into_description();
    update.apply(&mut description);
    tx.execute(
      "UPDATE groups SET name = ?2, url = ?3, email = ?4, visible_to_all = ?5, owner_uuid = ?6
       WHERE group_uuid = ?1",
      params![
        group.as_str(),
        description.name,
        description.url,
        description.email,
        description.visible_to_all,
        description.owner.as_ref().map(GroupUuid::as_str),
      ],
    )?;
    tx.commit()?;
    Ok(Some(description))
  }
}

// ─── Drafts ──────────────────────────────────────────────────────────────────

impl DraftSource for SqliteStore {
  type Error = Error;

  fn changes_with_drafts(
    &self,
    account: AccountId,
  ) -> Result<HashSet<ChangeId>> {
    let conn = self.conn.lock();
    let mut stmt = conn
      .prepare("SELECT DISTINCT change_id FROM draft_comments WHERE account_id = ?1")?;
    let changes = stmt
      .query_map(params![account.get()], |row| row.get::<_, u32>(0))?
      .map(|r| r.map(ChangeId))
      .collect::<rusqlite::Result<_>>()?;
    Ok(changes)
  }
}

impl DraftWriter for SqliteStore {
  type Error = Error;

  fn create_draft(&self, account: AccountId, change: ChangeId, message: &str) -> Result<String> {
    let draft_id = encode_uuid(Uuid::new_v4());
    self.conn.lock().execute(
      "INSERT INTO draft_comments (draft_id, account_id, change_id, message, updated_at)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      params![draft_id, account.get(), change.0, message, encode_dt(Utc::now())],
    )?;
    Ok(draft_id)
  }

  fn update_draft(&self, account: AccountId, draft_id: &str, message: &str) -> Result<bool> {
    let changed = self.conn.lock().execute(
      "UPDATE draft_comments SET message = ?3, updated_at = ?4
       WHERE draft_id = ?1 AND account_id = ?2",
      params![draft_id, account.get(), message, encode_dt(Utc::now())],
    )?;
    Ok(changed > 0)
  }

  fn delete_draft(&self, account: AccountId, draft_id: &str) -> Result<bool> {
    let changed = self.conn.lock().execute(
      "DELETE FROM draft_comments WHERE draft_id = ?1 AND account_id = ?2",
      params![draft_id, account.get()],
    )?;
    Ok(changed > 0)
  }

  fn publish_drafts(&self, account: AccountId, change: ChangeId) -> Result<usize> {
    let mut conn = self.conn.lock();
    let tx = conn.transaction()?;
    let messages: Vec<String> = {
      let mut stmt = tx.prepare(
        "SELECT message FROM draft_comments
         WHERE account_id = ?1 AND change_id = ?2 ORDER BY updated_at",
      )?;
      stmt
        .query_map(params![account.get(), change.0], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?
    };
    let now = encode_dt(Utc::now());
    for message in &messages {
      tx.execute(
        "INSERT INTO published_comments (comment_id, account_id, change_id, message, published_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![encode_uuid(Uuid::new_v4()), account.get(), change.0, message, now],
      )?;
    }
    tx.execute(
      "DELETE FROM draft_comments WHERE account_id = ?1 AND change_id = ?2",
      params![account.get(), change.0],
    )?;
    tx.commit()?;
    debug!(%account, %change, published = messages.len(), "published drafts");
    Ok(messages.len())
  }
}
