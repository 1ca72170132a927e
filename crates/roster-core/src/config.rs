//! Deserialisable settings for the pieces of this crate that are chosen at
//! configuration time.

use std::{collections::HashSet, sync::Arc};

use serde::Deserialize;
use strum::IntoEnumIterator;

use crate::{
  email::{EmailExpander, email_expander_from_format},
  group::GroupUuid,
  realm::AccountFieldName,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
  /// Template for inferred email addresses, e.g. `{0}@example.com`.
  pub email_format:    Option<String>,
  /// Fields users may edit. All fields when unset.
  pub editable_fields: Option<Vec<AccountFieldName>>,
  /// Verify passwords against stored argon2 hashes instead of accepting
  /// every login.
  pub password_realm:  bool,
}

impl AuthSettings {
  pub fn email_expander(&self) -> Arc<dyn EmailExpander> {
    email_expander_from_format(self.email_format.as_deref())
  }

  pub fn editable_fields(&self) -> HashSet<AccountFieldName> {
    match &self.editable_fields {
      Some(fields) => fields.iter().copied().collect(),
      None => AccountFieldName::iter().collect(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccountSettings {
  /// Preset for loaders created without an explicit choice.
  pub detailed: bool,
}

impl Default for AccountSettings {
  fn default() -> Self { Self { detailed: true } }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroupSettings {
  /// Members of this group are classified as service users.
  pub service_users: Option<GroupUuid>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let auth = AuthSettings::default();
    assert_eq!(auth.editable_fields().len(), 3);
    assert!(!auth.email_expander().can_expand("bob"));
    assert!(!auth.password_realm);
    assert!(AccountSettings::default().detailed);
    assert!(GroupSettings::default().service_users.is_none());
  }

  #[test]
  fn deserialises_partial_sections() {
    let auth: AuthSettings = serde_json::from_value(serde_json::json!({
      "email_format": "{0}@example.com",
      "editable_fields": ["full_name"],
    }))
    .unwrap();
    assert_eq!(
      auth.editable_fields(),
      HashSet::from([AccountFieldName::FullName])
    );
    assert_eq!(
      auth.email_expander().expand("bob").as_deref(),
      Some("bob@example.com")
    );

    let accounts: AccountSettings =
      serde_json::from_value(serde_json::json!({})).unwrap();
    assert!(accounts.detailed);

    let groups: GroupSettings =
      serde_json::from_value(serde_json::json!({ "service_users": "global:Bots" }))
        .unwrap();
    assert_eq!(groups.service_users, Some(GroupUuid::from("global:Bots")));
  }
}
