//! Pluggable authentication and identity backends.

use std::{collections::HashSet, fmt, sync::Arc};

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};
use tracing::{debug, warn};

use crate::{
  AuthError, Error, Result,
  account::{AccountId, IdentifiedUser},
  email::EmailExpander,
};

/// Profile fields a realm may or may not let users edit.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, strum::Display, Serialize,
  Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccountFieldName {
  FullName,
  UserName,
  RegisterNewEmail,
}

/// A login attempt, enriched by the realm as it is authenticated.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthRequest {
  pub username:      String,
  pub password:      Option<String>,
  pub display_name:  Option<String>,
  pub email_address: Option<String>,
  pub active:        bool,
}

impl AuthRequest {
  pub fn for_user(username: impl Into<String>) -> Self {
    Self { username: username.into(), active: true, ..Self::default() }
  }

  pub fn with_password(mut self, password: impl Into<String>) -> Self {
    self.password = Some(password.into());
    self
  }
}

impl fmt::Debug for AuthRequest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AuthRequest")
      .field("username", &self.username)
      .field("password", &self.password.as_ref().map(|_| "<redacted>"))
      .field("display_name", &self.display_name)
      .field("email_address", &self.email_address)
      .field("active", &self.active)
      .finish()
  }
}

// ─── Contract ────────────────────────────────────────────────────────────────

pub trait Realm: Send + Sync {
  fn editable_fields(&self) -> HashSet<AccountFieldName>;

  fn allows_edit(&self, field: AccountFieldName) -> bool {
    self.editable_fields().contains(&field)
  }

  /// Check the request and fill in whatever the realm knows about the user.
  fn authenticate(&self, request: AuthRequest) -> Result<AuthRequest, AuthError>;

  /// Called once after an account has been created for `request`.
  fn on_create_account(&self, request: &AuthRequest, account: AccountId) -> Result<()>;

  fn has_email_address(&self, user: &IdentifiedUser, email: &str) -> bool {
    self.email_addresses(user).contains(email)
  }

  fn email_addresses(&self, user: &IdentifiedUser) -> HashSet<String>;

  /// Resolve a login name. Unknown names are `Ok(None)`.
  fn lookup(&self, name: &str) -> Result<Option<AccountId>>;
}

/// Run the realm's account-creation hook. A failing hook is logged and does
/// not undo the account creation.
pub fn notify_account_created(
  realm: &dyn Realm,
  request: &AuthRequest,
  account: AccountId,
) {
  if let Err(e) = realm.on_create_account(request, account) {
    warn!(%account, username = %request.username, error = %e, "account creation hook failed");
  }
}

// ─── Sources ─────────────────────────────────────────────────────────────────

pub trait AccountLookup: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn account_by_username(
    &self,
    username: &str,
  ) -> std::result::Result<Option<AccountId>, Self::Error>;

  /// Every registered address of `account`, in no particular order.
  fn emails_of(&self, account: AccountId) -> std::result::Result<Vec<String>, Self::Error>;
}

/// What a [`CredentialStore`] holds for one login name.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
  pub account_id:    AccountId,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub active:        bool,
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("account_id", &self.account_id)
      .field("active", &self.active)
      .finish_non_exhaustive()
  }
}

pub trait CredentialStore: AccountLookup {
  /// `None` if the user is unknown or has no password set.
  fn credentials(
    &self,
    username: &str,
  ) -> std::result::Result<Option<Credentials>, Self::Error>;
}

// ─── DefaultRealm ────────────────────────────────────────────────────────────

/// Accepts every request; identity comes from the account store and missing
/// emails from the [`EmailExpander`].
pub struct DefaultRealm<S> {
  store:    S,
  expander: Arc<dyn EmailExpander>,
  editable: HashSet<AccountFieldName>,
}

impl<S: AccountLookup> DefaultRealm<S> {
  /// Every field is editable until narrowed with
  /// [`with_editable_fields`](Self::with_editable_fields).
  pub fn new(store: S, expander: Arc<dyn EmailExpander>) -> Self {
    Self { store, expander, editable: AccountFieldName::iter().collect() }
  }

  pub fn with_editable_fields(
    mut self,
    fields: impl IntoIterator<Item = AccountFieldName>,
  ) -> Self {
    self.editable = fields.into_iter().collect();
    self
  }

  pub fn store(&self) -> &S { &self.store }

  fn expand_email(&self, mut request: AuthRequest) -> AuthRequest {
    if request.email_address.is_none() && self.expander.can_expand(&request.username) {
      request.email_address = self.expander.expand(&request.username);
    }
    request
  }
}

impl<S: AccountLookup> Realm for DefaultRealm<S> {
  fn editable_fields(&self) -> HashSet<AccountFieldName> { self.editable.clone() }

  fn authenticate(&self, request: AuthRequest) -> Result<AuthRequest, AuthError> {
    Ok(self.expand_email(request))
  }

  fn on_create_account(&self, request: &AuthRequest, account: AccountId) -> Result<()> {
    debug!(%account, username = %request.username, "account created");
    Ok(())
  }

  fn email_addresses(&self, user: &IdentifiedUser) -> HashSet<String> {
    let registered = match self.store.emails_of(user.account_id) {
      Ok(emails) => emails,
      Err(e) => {
        warn!(account = %user.account_id, error = %e, "failed to read emails");
        return HashSet::new();
      }
    };
    if !registered.is_empty() {
      return registered.into_iter().collect();
    }
    user
      .username
      .as_deref()
      .and_then(|name| self.expander.expand(name))
      .into_iter()
      .collect()
  }

  fn lookup(&self, name: &str) -> Result<Option<AccountId>> {
    self.store.account_by_username(name).map_err(Error::backend)
  }
}

// ─── PasswordRealm ───────────────────────────────────────────────────────────

/// Verifies passwords against argon2 hashes held by a [`CredentialStore`].
pub struct PasswordRealm<S> {
  inner: DefaultRealm<S>,
}

impl<S: CredentialStore> PasswordRealm<S> {
  pub fn new(store: S, expander: Arc<dyn EmailExpander>) -> Self {
    let inner = DefaultRealm::new(store, expander).with_editable_fields([
      AccountFieldName::FullName,
      AccountFieldName::RegisterNewEmail,
    ]);
    Self { inner }
  }

  pub fn with_editable_fields(
    self,
    fields: impl IntoIterator<Item = AccountFieldName>,
  ) -> Self {
    Self { inner: self.inner.with_editable_fields(fields) }
  }
}

impl<S: CredentialStore> Realm for PasswordRealm<S> {
  fn editable_fields(&self) -> HashSet<AccountFieldName> { self.inner.editable_fields() }

  fn authenticate(&self, request: AuthRequest) -> Result<AuthRequest, AuthError> {
    let credentials = self
      .inner
      .store
      .credentials(&request.username)
      .map_err(AuthError::unavailable)?
      .ok_or(AuthError::InvalidCredentials)?;
    let password = request
      .password
      .as_deref()
      .ok_or(AuthError::InvalidCredentials)?;

    let parsed = PasswordHash::new(&credentials.password_hash).map_err(|e| {
      warn!(username = %request.username, error = %e, "stored password hash is malformed");
      AuthError::InvalidCredentials
    })?;
    Argon2::default()
      .verify_password(password.as_bytes(), &parsed)
      .map_err(|_| AuthError::InvalidCredentials)?;

    if !credentials.active {
      return Err(AuthError::Inactive(request.username));
    }

    debug!(username = %request.username, account = %credentials.account_id, "authenticated");
    let mut request = self.inner.expand_email(request);
    request.active = true;
    Ok(request)
  }

  fn on_create_account(&self, request: &AuthRequest, account: AccountId) -> Result<()> {
    self.inner.on_create_account(request, account)
  }

  fn email_addresses(&self, user: &IdentifiedUser) -> HashSet<String> {
    self.inner.email_addresses(user)
  }

  fn lookup(&self, name: &str) -> Result<Option<AccountId>> { self.inner.lookup(name) }
}
