//! Deterministic identifiers for newly created groups.
//!
//! The uuid is the SHA-256 digest of two newline-terminated lines, the
//! group's name and its creator's identity, hex-encoded.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::group::GroupUuid;

/// A timestamp-independent creator identity, rendered as `Name <email>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PersonIdent {
  pub name:  String,
  pub email: String,
}

impl PersonIdent {
  pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
    Self { name: name.into(), email: email.into() }
  }
}

impl fmt::Display for PersonIdent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} <{}>", self.name, self.email)
  }
}

/// Mint the uuid for a group called `group_name` created by `creator`.
pub fn make(group_name: &str, creator: &PersonIdent) -> GroupUuid {
  let mut hasher = Sha256::new();
  hasher.update(format!("group {group_name}\n").as_bytes());
  hasher.update(format!("creator {creator}\n").as_bytes());
  GroupUuid::new(hex::encode(hasher.finalize()))
}
