//! Conversions between `roster-core` types and the plain values stored in
//! SQLite columns.
//!
//! Timestamps are RFC 3339 strings, draft ids hyphenated lowercase UUIDs and
//! booleans `0`/`1` integers.

use chrono::{DateTime, Utc};
use roster_core::{
  account::AccountId,
  directory::AccountRecord,
  group::{GroupDescription, GroupUuid},
};
use uuid::Uuid;

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

/// `?1, ?2, …, ?n` for an `IN (…)` list.
pub fn placeholders(n: usize) -> String {
  (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

/// A `LIKE` pattern matching values that start with `prefix`, with `\` as
/// the escape character.
pub fn like_prefix(prefix: &str) -> String {
  let mut pattern = String::with_capacity(prefix.len() + 1);
  for c in prefix.chars() {
    if matches!(c, '%' | '_' | '\\') {
      pattern.push('\\');
    }
    pattern.push(c);
  }
  pattern.push('%');
  pattern
}

// ─── Accounts ────────────────────────────────────────────────────────────────

pub const ACCOUNT_COLUMNS: &str =
  "account_id, username, full_name, display_name, preferred_email, status, active";

/// One `accounts` row as read from SQLite.
pub struct RawAccount {
  pub account_id:      u32,
  pub username:        Option<String>,
  pub full_name:       Option<String>,
  pub display_name:    Option<String>,
  pub preferred_email: Option<String>,
  pub status:          Option<String>,
  pub active:          bool,
}

impl RawAccount {
  /// Read the columns listed in [`ACCOUNT_COLUMNS`], in order.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      account_id:      row.get(0)?,
      username:        row.get(1)?,
      full_name:       row.get(2)?,
      display_name:    row.get(3)?,
      preferred_email: row.get(4)?,
      status:          row.get(5)?,
      active:          row.get(6)?,
    })
  }

  pub fn into_record(self, mut emails: Vec<String>) -> AccountRecord {
    emails.sort();
    AccountRecord {
      account_id: AccountId(self.account_id),
      full_name: self.full_name,
      display_name: self.display_name,
      preferred_email: self.preferred_email,
      emails,
      username: self.username,
      status: self.status,
      active: self.active,
    }
  }
}

// ─── Groups ──────────────────────────────────────────────────────────────────

pub const GROUP_COLUMNS: &str =
  "group_uuid, name, url, email, visible_to_all, owner_uuid";

pub struct RawGroup {
  pub group_uuid:     String,
  pub name:           String,
  pub url:            Option<String>,
  pub email:          Option<String>,
  pub visible_to_all: bool,
  pub owner_uuid:     Option<String>,
}

impl RawGroup {
  /// Read the columns listed in [`GROUP_COLUMNS`], in order.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      group_uuid:     row.get(0)?,
      name:           row.get(1)?,
      url:            row.get(2)?,
      email:          row.get(3)?,
      visible_to_all: row.get(4)?,
      owner_uuid:     row.get(5)?,
    })
  }

  pub fn into_description(self) -> GroupDescription {
    GroupDescription {
      uuid:           GroupUuid::new(self.group_uuid),
      name:           self.name,
      url:            self.url,
      email:          self.email,
      visible_to_all: self.visible_to_all,
      owner:          self.owner_uuid.map(GroupUuid::new),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn like_prefix_escapes_wildcards() {
    assert_eq!(like_prefix("Dev"), "Dev%");
    assert_eq!(like_prefix("100%_a\\b"), "100\\%\\_a\\\\b%");
  }

  #[test]
  fn placeholders_are_numbered() {
    assert_eq!(placeholders(3), "?1, ?2, ?3");
    assert_eq!(placeholders(0), "");
  }
}
