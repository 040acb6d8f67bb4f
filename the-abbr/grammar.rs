//! Boundary with the abbreviation grammar library.
//!
//! The tracker never interprets abbreviation syntax. Everything it needs from
//! the grammar goes through [`Grammar`]: extracting an abbreviation left of
//! the caret, parsing candidate text, expanding a parsed abbreviation and
//! capturing the surrounding document context that expansion may depend on.

use std::fmt::Debug;

use ropey::Rope;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
  Tendril,
  syntax::SyntaxId,
};

/// The grammar rejected a candidate abbreviation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} at {pos}")]
pub struct ParseError {
  pub message: Tendril,
  /// Char offset inside the abbreviation text.
  pub pos:     usize,
}

impl ParseError {
  pub fn new(message: impl Into<Tendril>, pos: usize) -> Self {
    Self {
      message: message.into(),
      pos,
    }
  }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExpandError {
  #[error("abbreviation produced no output")]
  Empty,
  #[error("expansion failed: {0}")]
  Failed(Tendril),
}

/// Element enclosing the abbreviation, used to tailor the expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
  pub name:       Tendril,
  pub attributes: SmallVec<[(Tendril, Option<Tendril>); 2]>,
}

/// Options attached to a tracker when it is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
  pub syntax:  SyntaxId,
  /// Marker that must precede abbreviations, e.g. `<` in JSX.
  pub prefix:  Option<Tendril>,
  /// Captured lazily before expansion when skipped on large documents.
  pub context: Option<Context>,
}

impl Options {
  pub fn prefix_len(&self) -> usize {
    self
      .prefix
      .as_ref()
      .map_or(0, |prefix| prefix.chars().count())
  }
}

/// Abbreviation located by [`Grammar::extract`].
///
/// All offsets are char offsets into the text given to `extract`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
  pub abbreviation: Tendril,
  pub start:        usize,
  pub end:          usize,
  /// Where the abbreviation itself starts, after any prefix.
  pub location:     usize,
}

pub trait Grammar {
  type Ast: Clone + Debug;

  /// Finds an abbreviation in `line` that ends at `pos`.
  fn extract(&self, line: &str, pos: usize, options: &Options) -> Option<Extracted>;

  fn parse(&self, abbreviation: &str, options: &Options) -> Result<Self::Ast, ParseError>;

  fn expand(&self, ast: &Self::Ast, options: &Options) -> Result<Tendril, ExpandError>;

  /// Looks up the element around `pos`, if the syntax has one.
  fn capture_context(&self, text: &Rope, pos: usize, syntax: &SyntaxId) -> Option<Context>;
}
