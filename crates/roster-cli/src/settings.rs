//! Layered configuration: an optional TOML file, then `ROSTER_*` environment
//! variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use roster_core::config::{AccountSettings, AuthSettings, GroupSettings};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  #[serde(default)]
  pub auth:       AuthSettings,
  #[serde(default)]
  pub accounts:   AccountSettings,
  #[serde(default)]
  pub groups:     GroupSettings,
}

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/roster/roster.db") }

impl Settings {
  /// Read `path` if it exists, then apply environment overrides such as
  /// `ROSTER_STORE_PATH` or `ROSTER_AUTH__EMAIL_FORMAT`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("ROSTER")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  /// The store path with a leading `~/` expanded.
  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
