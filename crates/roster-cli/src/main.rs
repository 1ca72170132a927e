//! `roster` — operator commands for the Roster identity store.
//!
//! Reads `roster.toml` (or the path given with `--config`), layers `ROSTER_*`
//! environment variables on top, and opens the SQLite store named by
//! `store_path`.
//!
//! ```
//! roster add-account alice --name "Alice Liddell" --email alice@example.com
//! echo secret | roster set-password alice
//! roster create-group Developers --creator-name Admin --creator-email admin@example.com --member 1
//! roster groups-of 1
//! roster accounts 1 2 3
//! ```

mod app;
mod settings;

use std::{io, path::PathBuf, sync::Arc};

use anyhow::{Context as _, bail};
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::{Parser, Subcommand};
use rand_core::OsRng;
use roster_core::{
  account::{AccountId, IdentifiedUser},
  drafts::{ChangeId, DraftsUpdate},
  group::{GroupMembership as _, GroupUuid},
  group_backend::GroupBackend,
  group_uuid::{self, PersonIdent},
  groups_update::{GroupUpdate, NewGroup},
  realm::{AuthRequest, notify_account_created},
};
use roster_store_sqlite::NewAccount;
use serde_json::json;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

use crate::{app::App, settings::Settings};

#[derive(Parser)]
#[command(name = "roster", author, version, about = "Roster identity and group store")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "roster.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Print the argon2 hash for a password entered on stdin.
  HashPassword,

  /// Print the uuid a group would be given.
  GroupUuid {
    #[arg(long)]
    name:          String,
    #[arg(long)]
    creator_name:  String,
    #[arg(long)]
    creator_email: String,
  },

  /// Print the inferred email address for a username.
  ExpandEmail { username: String },

  #[command(flatten)]
  Store(StoreCommand),
}

/// Commands that open the store.
#[derive(Subcommand)]
enum StoreCommand {
  /// Register an account.
  AddAccount {
    username: String,
    #[arg(long)]
    name:     Option<String>,
    #[arg(long)]
    email:    Option<String>,
  },

  /// Set an account's password from stdin.
  SetPassword { username: String },

  /// Authenticate with a password from stdin, registering the account on
  /// first login when the realm allows it.
  Login { username: String },

  /// Print account details as JSON.
  Accounts {
    ids:     Vec<u32>,
    /// Override the configured preset.
    #[arg(long, conflicts_with = "id_only")]
    detailed: bool,
    #[arg(long)]
    id_only:  bool,
  },

  /// Create a group owned by this deployment.
  CreateGroup {
    name:          String,
    #[arg(long)]
    creator_name:  String,
    #[arg(long)]
    creator_email: String,
    #[arg(long = "member")]
    members:       Vec<u32>,
    #[arg(long = "subgroup")]
    subgroups:     Vec<String>,
    #[arg(long)]
    visible:       bool,
  },

  /// Add accounts to a group.
  AddMembers { group: String, ids: Vec<u32> },

  /// Include other groups in a group.
  AddSubgroups { group: String, subgroups: Vec<String> },

  /// Rename a group or change its visibility.
  UpdateGroup {
    group:   String,
    #[arg(long)]
    name:    Option<String>,
    #[arg(long)]
    url:     Option<String>,
    #[arg(long, conflicts_with = "hidden")]
    visible: bool,
    #[arg(long)]
    hidden:  bool,
  },

  /// List the groups an account belongs to.
  GroupsOf { account: u32 },

  /// Suggest groups by name prefix.
  Suggest {
    prefix:  String,
    #[arg(long)]
    project: Option<String>,
  },

  /// Resolve a username to an account id.
  Lookup { username: String },

  /// List the changes an account has draft comments on.
  Drafts { account: u32 },

  /// Start a draft comment on a change.
  AddDraft {
    account: u32,
    change:  u32,
    message: String,
  },
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  match cli.command {
    Command::HashPassword => println!("{}", hash_password(&read_password()?)?),
    Command::GroupUuid { name, creator_name, creator_email } => {
      let creator = PersonIdent::new(creator_name, creator_email);
      println!("{}", group_uuid::make(&name, &creator));
    }
    Command::ExpandEmail { username } => {
      let settings = Settings::load(&cli.config)?;
      match settings.auth.email_expander().expand(&username) {
        Some(email) => println!("{email}"),
        None => bail!("no email can be inferred for {username:?}"),
      }
    }
    Command::Store(command) => {
      let settings = Settings::load(&cli.config)?;
      let app = App::open(&settings)?;
      run(&app, command)?;
    }
  }
  Ok(())
}

fn run(app: &App, command: StoreCommand) -> anyhow::Result<()> {
  match command {
    StoreCommand::AddAccount { username, name, email } => {
      let id = app.store.add_account(NewAccount {
        username: Some(username),
        full_name: name,
        preferred_email: email,
        ..NewAccount::default()
      })?;
      println!("{id}");
    }

    StoreCommand::SetPassword { username } => {
      let id = resolve(app, &username)?;
      app.store.set_password_hash(id, &hash_password(&read_password()?)?)?;
      info!(account = %id, "password updated");
    }

    StoreCommand::Login { username } => {
      let request = AuthRequest::for_user(username).with_password(read_password()?);
      let request = app.realm.authenticate(request).context("login failed")?;
      let id = match app.realm.lookup(&request.username)? {
        Some(id) => id,
        None => {
          let id = app.store.add_account(NewAccount {
            username: Some(request.username.clone()),
            full_name: request.display_name.clone(),
            preferred_email: request.email_address.clone(),
            ..NewAccount::default()
          })?;
          notify_account_created(app.realm.as_ref(), &request, id);
          info!(account = %id, "registered account on first login");
          id
        }
      };
      let mut editable: Vec<String> =
        app.realm.editable_fields().iter().map(ToString::to_string).collect();
      editable.sort();
      print_json(&json!({
        "_account_id": id,
        "username": request.username,
        "email": request.email_address,
        "editable_fields": editable,
      }))?;
    }

    StoreCommand::Accounts { ids, detailed, id_only } => {
      let loader = if detailed {
        app.loaders.create(true)
      } else if id_only {
        app.loaders.create(false)
      } else {
        app.loaders.create_default()
      };
      let attrs: Vec<_> = ids
        .into_iter()
        .filter_map(|id| loader.get(Some(AccountId(id))))
        .collect();
      loader.fill()?;
      let out: Vec<_> = attrs
        .iter()
        .map(|attr| {
          json!({
            "account": attr.snapshot(),
            "service_user": app.service_users.is_service_user(attr.id()),
          })
        })
        .collect();
      print_json(&out)?;
    }

    StoreCommand::CreateGroup {
      name,
      creator_name,
      creator_email,
      members,
      subgroups,
      visible,
    } => {
      let update = app.groups_update(PersonIdent::new(creator_name, creator_email));
      let group = update.create_group(NewGroup {
        visible_to_all: visible,
        members: members.into_iter().map(AccountId).collect(),
        subgroups: subgroups.into_iter().map(GroupUuid::from).collect(),
        ..NewGroup::named(name)
      })?;
      print_json(&group)?;
    }

    StoreCommand::AddMembers { group, ids } => {
      let update = app.groups_update(operator());
      let ids: Vec<AccountId> = ids.into_iter().map(AccountId).collect();
      update.add_members(&GroupUuid::from(group), &ids)?;
    }

    StoreCommand::AddSubgroups { group, subgroups } => {
      let update = app.groups_update(operator());
      let subgroups: Vec<GroupUuid> = subgroups.into_iter().map(GroupUuid::from).collect();
      update.add_subgroups(&GroupUuid::from(group), &subgroups)?;
    }

    StoreCommand::UpdateGroup { group, name, url, visible, hidden } => {
      let update = app.groups_update(operator());
      let changes = GroupUpdate {
        name,
        url: url.map(Some),
        visible_to_all: (visible || hidden).then_some(visible),
        ..GroupUpdate::default()
      };
      match update.update_group(&GroupUuid::from(group.as_str()), changes)? {
        Some(description) => print_json(&description)?,
        None => bail!("no group {group}"),
      }
    }

    StoreCommand::GroupsOf { account } => {
      let membership = app.groups.memberships_of(&IdentifiedUser::new(AccountId(account)));
      let mut groups: Vec<_> = membership
        .known_groups()
        .into_iter()
        .map(|uuid| {
          let name = app.groups.get(&uuid).map(|g| g.name);
          json!({ "uuid": uuid, "name": name })
        })
        .collect();
      groups.sort_by(|a, b| a["uuid"].as_str().cmp(&b["uuid"].as_str()));
      print_json(&groups)?;
    }

    StoreCommand::Suggest { prefix, project } => {
      print_json(&app.groups.suggest(&prefix, project.as_deref()))?;
    }

    StoreCommand::Lookup { username } => match app.realm.lookup(&username)? {
      Some(id) => println!("{id}"),
      None => bail!("no account named {username:?}"),
    },

    StoreCommand::Drafts { account } => {
      let mut changes: Vec<ChangeId> =
        app.drafts.get(AccountId(account))?.iter().copied().collect();
      changes.sort();
      print_json(&changes)?;
    }

    StoreCommand::AddDraft { account, change, message } => {
      let drafts = DraftsUpdate::new(app.store.clone(), Arc::clone(&app.drafts));
      println!("{}", drafts.create_draft(AccountId(account), ChangeId(change), &message)?);
    }
  }
  Ok(())
}

fn resolve(app: &App, username: &str) -> anyhow::Result<AccountId> {
  app
    .realm
    .lookup(username)?
    .with_context(|| format!("no account named {username:?}"))
}

/// The identity recorded for group edits that do not mint a uuid.
fn operator() -> PersonIdent { PersonIdent::new("roster", "roster@localhost") }

fn hash_password(password: &str) -> anyhow::Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string(),
  )
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{BufRead, Write};
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
