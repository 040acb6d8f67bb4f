//! Syntax classification at a document position.

use crate::{
  Tendril,
  document::DocumentSurface,
};

/// Identifier of the syntax active at some position, e.g. `html` or `jsx`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SyntaxId(Tendril);

impl SyntaxId {
  pub fn new(name: impl Into<Tendril>) -> Self {
    Self(name.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&str> for SyntaxId {
  fn from(value: &str) -> Self {
    Self::new(value)
  }
}

pub trait SyntaxClassifier {
  fn syntax_at(&self, doc: &dyn DocumentSurface, pos: usize) -> SyntaxId;

  /// Whether abbreviations in this syntax need the JSX prefix marker.
  fn is_jsx(&self, syntax: &SyntaxId) -> bool;

  /// Whether `pos` is in a scope where abbreviations may be typed.
  fn in_activation_scope(&self, doc: &dyn DocumentSurface, pos: usize) -> bool;
}

/// Classifier that reports the same syntax everywhere.
///
/// Hosts without scope information use it, and so do the tests.
#[derive(Debug, Clone)]
pub struct FixedSyntax {
  syntax: SyntaxId,
  jsx:    bool,
  active: bool,
}

impl FixedSyntax {
  pub fn new(syntax: impl Into<SyntaxId>) -> Self {
    let syntax = syntax.into();
    let jsx = matches!(syntax.as_str(), "jsx" | "tsx");
    Self {
      syntax,
      jsx,
      active: true,
    }
  }

  #[must_use]
  pub fn with_activation(mut self, active: bool) -> Self {
    self.active = active;
    self
  }
}

impl SyntaxClassifier for FixedSyntax {
  fn syntax_at(&self, _doc: &dyn DocumentSurface, _pos: usize) -> SyntaxId {
    self.syntax.clone()
  }

  fn is_jsx(&self, syntax: &SyntaxId) -> bool {
    self.jsx && syntax == &self.syntax
  }

  fn in_activation_scope(&self, _doc: &dyn DocumentSurface, _pos: usize) -> bool {
    self.active
  }
}
