//! Username → email inference for realms without an email directory.

use std::sync::Arc;

/// Infers an email address from a login name.
pub trait EmailExpander: Send + Sync {
  fn can_expand(&self, username: &str) -> bool;

  /// The inferred address, or `None` when [`can_expand`](Self::can_expand)
  /// would refuse `username`.
  fn expand(&self, username: &str) -> Option<String>;
}

/// Never infers an address.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEmailExpander;

impl EmailExpander for NoEmailExpander {
  fn can_expand(&self, _: &str) -> bool { false }

  fn expand(&self, _: &str) -> Option<String> { None }
}

/// Token replaced by the username in a [`SimpleEmailExpander`] template.
pub const USERNAME_TOKEN: &str = "{0}";

/// Substitutes the username into a template such as `{0}@example.com`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleEmailExpander {
  prefix: String,
  suffix: String,
}

impl SimpleEmailExpander {
  /// `None` if `template` has no [`USERNAME_TOKEN`].
  pub fn new(template: &str) -> Option<Self> {
    let (prefix, suffix) = template.split_once(USERNAME_TOKEN)?;
    Some(Self { prefix: prefix.to_owned(), suffix: suffix.to_owned() })
  }
}

impl EmailExpander for SimpleEmailExpander {
  fn can_expand(&self, username: &str) -> bool {
    !username.chars().any(char::is_whitespace)
  }

  fn expand(&self, username: &str) -> Option<String> {
    self
      .can_expand(username)
      .then(|| format!("{}{username}{}", self.prefix, self.suffix))
  }
}

/// Pick the expander for a configured email format: simple substitution when
/// the format carries the username token, otherwise none.
pub fn email_expander_from_format(format: Option<&str>) -> Arc<dyn EmailExpander> {
  match format.and_then(SimpleEmailExpander::new) {
    Some(simple) => Arc::new(simple),
    None => Arc::new(NoEmailExpander),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn simple_substitutes_username() {
    let e = SimpleEmailExpander::new("{0}@example.com").unwrap();
    assert!(e.can_expand("bob"));
    assert_eq!(e.expand("bob").as_deref(), Some("bob@example.com"));
  }

  #[test]
  fn simple_keeps_text_around_token() {
    let e = SimpleEmailExpander::new("dev+{0}@lists.example.com").unwrap();
    assert_eq!(e.expand("bob").as_deref(), Some("dev+bob@lists.example.com"));
  }

  #[test]
  fn simple_refuses_whitespace() {
    let e = SimpleEmailExpander::new("{0}@example.com").unwrap();
    assert!(!e.can_expand("bob smith"));
    assert!(!e.can_expand("bob\tsmith"));
    assert_eq!(e.expand("bob smith"), None);
  }

  #[test]
  fn template_without_token_is_rejected() {
    assert!(SimpleEmailExpander::new("root@example.com").is_none());
  }

  #[test]
  fn none_always_declines() {
    for user in ["bob", "", "bob smith"] {
      assert!(!NoEmailExpander.can_expand(user));
      assert_eq!(NoEmailExpander.expand(user), None);
    }
  }

  #[test]
  fn from_format_selects_expander() {
    let simple = email_expander_from_format(Some("{0}@example.com"));
    assert_eq!(simple.expand("bob").as_deref(), Some("bob@example.com"));

    assert!(!email_expander_from_format(Some("nobody@example.com")).can_expand("bob"));
    assert!(!email_expander_from_format(None).can_expand("bob"));
  }
}
