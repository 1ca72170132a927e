//! The bulk account-fill contract and its stock implementation.

use std::{
  collections::{BTreeSet, HashMap},
  sync::Arc,
};

use tracing::debug;

use crate::{
  Error, Result,
  account::{AccountAttribute, AccountId, AccountInfo, AvatarInfo},
  fill::{FillOption, FillOptions},
};

// ─── Contract ────────────────────────────────────────────────────────────────

/// Populates a batch of [`AccountAttribute`] placeholders in place.
///
/// Implementations must populate only the fields named in `options`, and must
/// leave accounts that no longer exist unpopulated instead of failing the
/// batch. No caching happens at this layer.
pub trait AccountDirectory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn fill_account_info(
    &self,
    accounts: &[Arc<AccountAttribute>],
    options: FillOptions,
  ) -> std::result::Result<(), Self::Error>;
}

// ─── Sources ─────────────────────────────────────────────────────────────────

/// The stored state of one account, as read by [`InternalAccountDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
  pub account_id:      AccountId,
  pub full_name:       Option<String>,
  pub display_name:    Option<String>,
  pub preferred_email: Option<String>,
  /// Every registered address, including the preferred one.
  pub emails:          Vec<String>,
  pub username:        Option<String>,
  pub status:          Option<String>,
  pub active:          bool,
}

impl AccountRecord {
  pub fn new(account_id: AccountId) -> Self {
    Self {
      account_id,
      full_name: None,
      display_name: None,
      preferred_email: None,
      emails: Vec::new(),
      username: None,
      status: None,
      active: true,
    }
  }
}

/// Bulk read access to account records. Ids with no account are simply
/// missing from the returned map.
pub trait AccountRecordSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn accounts(
    &self,
    ids: &[AccountId],
  ) -> std::result::Result<HashMap<AccountId, AccountRecord>, Self::Error>;
}

/// Resolves avatar image URLs.
pub trait AvatarProvider: Send + Sync {
  fn url(&self, account: &AccountRecord, size_px: u32) -> Option<String>;
}

/// An [`AvatarProvider`] that never has an avatar.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAvatars;

impl AvatarProvider for NoAvatars {
  fn url(&self, _: &AccountRecord, _: u32) -> Option<String> { None }
}

/// Decides whether the caller may see non-preferred email addresses.
pub trait SecondaryEmailPolicy: Send + Sync {
  fn can_see_secondary_emails(&self) -> Result<bool>;
}

/// A fixed answer, for deployments without a permission backend.
#[derive(Debug, Clone, Copy)]
pub struct StaticEmailPolicy(pub bool);

impl SecondaryEmailPolicy for StaticEmailPolicy {
  fn can_see_secondary_emails(&self) -> Result<bool> { Ok(self.0) }
}

// ─── InternalAccountDirectory ────────────────────────────────────────────────

/// Pixel heights requested from the [`AvatarProvider`].
pub const AVATAR_SIZES: [u32; 3] = [16, 32, 100];

/// The default [`AccountDirectory`]: one bulk read from an
/// [`AccountRecordSource`] per batch.
pub struct InternalAccountDirectory<S, A = NoAvatars, P = StaticEmailPolicy> {
  source:  S,
  avatars: A,
  policy:  P,
}

impl<S: AccountRecordSource> InternalAccountDirectory<S> {
  pub fn new(source: S) -> Self {
    Self { source, avatars: NoAvatars, policy: StaticEmailPolicy(false) }
  }
}

impl<S, A, P> InternalAccountDirectory<S, A, P> {
  pub fn with_avatars<A2: AvatarProvider>(
    self,
    avatars: A2,
  ) -> InternalAccountDirectory<S, A2, P> {
    InternalAccountDirectory { source: self.source, avatars, policy: self.policy }
  }

  pub fn with_email_policy<P2: SecondaryEmailPolicy>(
    self,
    policy: P2,
  ) -> InternalAccountDirectory<S, A, P2> {
    InternalAccountDirectory { source: self.source, avatars: self.avatars, policy }
  }
}

impl<S, A, P> AccountDirectory for InternalAccountDirectory<S, A, P>
where
  S: AccountRecordSource,
  A: AvatarProvider,
  P: SecondaryEmailPolicy,
{
  type Error = Error;

  fn fill_account_info(
    &self,
    accounts: &[Arc<AccountAttribute>],
    options: FillOptions,
  ) -> Result<()> {
    let ids: Vec<AccountId> = accounts
      .iter()
      .map(|a| a.id())
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect();

    let records = if ids.is_empty() {
      HashMap::new()
    } else {
      self.source.accounts(&ids).map_err(Error::backend)?
    };

    let secondary_visible = options.contains(FillOption::SecondaryEmails)
      && self.policy.can_see_secondary_emails()?;

    debug!(
      requested = ids.len(),
      found = records.len(),
      ?options,
      "filling account info"
    );

    for attr in accounts {
      let record = records.get(&attr.id());
      attr.populate(|info| self.fill_one(info, attr.id(), record, options, secondary_visible));
    }
    Ok(())
  }
}

impl<S, A: AvatarProvider, P> InternalAccountDirectory<S, A, P> {
  /// Overwrite every requested field, clearing those the record no longer
  /// provides.
  fn fill_one(
    &self,
    info: &mut AccountInfo,
    id: AccountId,
    record: Option<&AccountRecord>,
    options: FillOptions,
    secondary_visible: bool,
  ) {
    for option in options.iter() {
      match option {
        FillOption::Id => info.account_id = Some(id),
        FillOption::Name => info.name = record.and_then(|r| r.full_name.clone()),
        FillOption::DisplayName => {
          info.display_name = record.and_then(|r| r.display_name.clone())
        }
        FillOption::Email => info.email = record.and_then(|r| r.preferred_email.clone()),
        FillOption::SecondaryEmails => {
          info.secondary_emails = record
            .filter(|_| secondary_visible)
            .map(secondary_emails)
        }
        FillOption::Username => info.username = record.and_then(|r| r.username.clone()),
        FillOption::Status => info.status = record.and_then(|r| r.status.clone()),
        FillOption::State => {
          info.inactive = record.and_then(|r| (!r.active).then_some(true))
        }
        FillOption::Avatars => info.avatars = record.and_then(|r| self.avatars_of(r)),
      }
    }
  }

  fn avatars_of(&self, record: &AccountRecord) -> Option<Vec<AvatarInfo>> {
    let avatars: Vec<AvatarInfo> = AVATAR_SIZES
      .iter()
      .filter_map(|&height| {
        self
          .avatars
          .url(record, height)
          .map(|url| AvatarInfo { url, height })
      })
      .collect();
    (!avatars.is_empty()).then_some(avatars)
  }
}

fn secondary_emails(record: &AccountRecord) -> Vec<String> {
  record
    .emails
    .iter()
    .filter(|e| Some(*e) != record.preferred_email.as_ref())
    .cloned()
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect()
}
