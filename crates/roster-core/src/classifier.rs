//! Predicates that tag automation accounts.

use std::sync::Arc;

use crate::{
  account::{AccountId, IdentifiedUser},
  group::GroupUuid,
  group_backend::GroupBackend,
};

pub trait RobotClassifier: Send + Sync {
  fn is_robot(&self, account: AccountId) -> bool;
}

pub trait ServiceUserClassifier: Send + Sync {
  fn is_service_user(&self, account: AccountId) -> bool;
}

/// Treats every account as human.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpRobotClassifier;

impl RobotClassifier for NoOpRobotClassifier {
  fn is_robot(&self, _: AccountId) -> bool { false }
}

/// Treats every account as a regular user.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpServiceUserClassifier;

impl ServiceUserClassifier for NoOpServiceUserClassifier {
  fn is_service_user(&self, _: AccountId) -> bool { false }
}

/// Service users are the (transitive) members of one configured group.
pub struct GroupServiceUserClassifier {
  backend: Arc<dyn GroupBackend>,
  group:   GroupUuid,
}

impl GroupServiceUserClassifier {
  pub fn new(backend: Arc<dyn GroupBackend>, group: GroupUuid) -> Self {
    Self { backend, group }
  }
}

impl ServiceUserClassifier for GroupServiceUserClassifier {
  fn is_service_user(&self, account: AccountId) -> bool {
    self
      .backend
      .memberships_of(&IdentifiedUser::new(account))
      .contains(&self.group)
  }
}
