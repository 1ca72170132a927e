//! Wires the store, caches, backends and realm together from [`Settings`].

use std::sync::Arc;

use anyhow::Context as _;
use roster_core::{
  classifier::{GroupServiceUserClassifier, NoOpServiceUserClassifier, ServiceUserClassifier},
  config::AuthSettings,
  directory::InternalAccountDirectory,
  drafts::DraftCommentsCache,
  group_backend::{GroupBackend, UniversalGroupBackend},
  group_uuid::PersonIdent,
  groups_update::GroupsUpdate,
  include_cache::GroupIncludeCache,
  internal_groups::InternalGroupBackend,
  loader::AccountLoaderFactory,
  realm::{DefaultRealm, PasswordRealm, Realm},
  system_groups::SystemGroupBackend,
};
use roster_store_sqlite::SqliteStore;
use tracing::info;

use crate::settings::Settings;

pub struct App {
  pub store:         SqliteStore,
  pub include_cache: Arc<GroupIncludeCache<SqliteStore>>,
  pub drafts:        Arc<DraftCommentsCache<SqliteStore>>,
  pub groups:        Arc<UniversalGroupBackend>,
  pub realm:         Box<dyn Realm>,
  pub loaders:       AccountLoaderFactory<InternalAccountDirectory<SqliteStore>>,
  pub service_users: Box<dyn ServiceUserClassifier>,
}

impl App {
  pub fn open(settings: &Settings) -> anyhow::Result<Self> {
    let store_path = settings.store_path();
    if let Some(parent) = store_path.parent() {
      std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {parent:?}"))?;
    }
    let store = SqliteStore::open(&store_path)
      .with_context(|| format!("failed to open store at {store_path:?}"))?;
    info!(path = %store_path.display(), "opened store");

    let include_cache = Arc::new(GroupIncludeCache::new(store.clone()));
    let groups = Arc::new(UniversalGroupBackend::new(vec![
      Arc::new(SystemGroupBackend::new()),
      Arc::new(InternalGroupBackend::new(store.clone(), Arc::clone(&include_cache))),
    ]));

    let realm = realm_for(&settings.auth, store.clone());

    let service_users: Box<dyn ServiceUserClassifier> = match &settings.groups.service_users {
      Some(group) => Box::new(GroupServiceUserClassifier::new(
        Arc::clone(&groups) as Arc<dyn GroupBackend>,
        group.clone(),
      )),
      None => Box::new(NoOpServiceUserClassifier),
    };

    let loaders = AccountLoaderFactory::new(
      InternalAccountDirectory::new(store.clone()),
      settings.accounts.detailed,
    );

    Ok(Self {
      drafts: Arc::new(DraftCommentsCache::new(store.clone())),
      store,
      include_cache,
      groups,
      realm,
      loaders,
      service_users,
    })
  }

  pub fn groups_update(&self, creator: PersonIdent) -> GroupsUpdate<SqliteStore, SqliteStore> {
    GroupsUpdate::new(self.store.clone(), Arc::clone(&self.include_cache), creator)
  }
}

/// The configured realm. Configured editable fields apply to either kind.
fn realm_for(auth: &AuthSettings, store: SqliteStore) -> Box<dyn Realm> {
  let expander = auth.email_expander();
  if !auth.password_realm {
    return Box::new(DefaultRealm::new(store, expander).with_editable_fields(auth.editable_fields()));
  }
  let realm = PasswordRealm::new(store, expander);
  match &auth.editable_fields {
    Some(fields) => Box::new(realm.with_editable_fields(fields.iter().copied())),
    None => Box::new(realm),
  }
}
