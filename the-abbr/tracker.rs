//! The live state of one tracked abbreviation.
//!
//! A [`RegionTracker`] remembers where the candidate abbreviation is, what
//! the grammar made of it last time and whether its preview is showing. It
//! knows nothing about registries or documents; [`crate::registry`] owns
//! trackers and [`crate::service`] wires them to documents.
//!
//! # Modes
//!
//! - **Auto** trackers are started by typing and are dropped as soon as the
//!   text stops looking like an abbreviation.
//! - **Forced** trackers are started on request and only end when the user
//!   expands or clears them.

use std::fmt::Debug;

use ropey::Rope;

use crate::{
  Tendril,
  edit::EditDelta,
  grammar::{
    Grammar,
    Options,
    ParseError,
  },
  span::Span,
};

/// What the grammar made of the tracked text.
#[derive(Debug, Clone, PartialEq)]
pub enum Abbreviation<A> {
  Empty,
  Valid { abbr: Tendril, ast: A },
  Invalid { abbr: Tendril, error: ParseError },
}

impl<A> Abbreviation<A> {
  /// Raw abbreviation text, without the prefix.
  pub fn abbr(&self) -> Option<&str> {
    match self {
      Self::Empty => None,
      Self::Valid { abbr, .. } | Self::Invalid { abbr, .. } => Some(abbr.as_str()),
    }
  }

  pub fn is_empty(&self) -> bool {
    matches!(self, Self::Empty)
  }

  pub fn is_valid(&self) -> bool {
    matches!(self, Self::Valid { .. })
  }

  pub fn ast(&self) -> Option<&A> {
    match self {
      Self::Valid { ast, .. } => Some(ast),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ParseError> {
    match self {
      Self::Invalid { error, .. } => Some(error),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
  Auto,
  Forced,
}

#[derive(Debug, Clone)]
pub struct RegionTracker<A> {
  region:          Span,
  abbreviation:    Abbreviation<A>,
  mode:            TrackingMode,
  /// Leading chars of the region that belong to a prefix marker.
  offset:          usize,
  options:         Options,
  preview_visible: bool,
}

impl<A: Clone + Debug> RegionTracker<A> {
  pub fn new(region: Span, mode: TrackingMode, offset: usize, options: Options) -> Self {
    Self {
      region,
      abbreviation: Abbreviation::Empty,
      mode,
      offset,
      options,
      preview_visible: false,
    }
  }

  pub fn region(&self) -> Span {
    self.region
  }

  pub fn abbreviation(&self) -> &Abbreviation<A> {
    &self.abbreviation
  }

  pub fn mode(&self) -> TrackingMode {
    self.mode
  }

  pub fn forced(&self) -> bool {
    self.mode == TrackingMode::Forced
  }

  pub fn offset(&self) -> usize {
    self.offset
  }

  pub fn options(&self) -> &Options {
    &self.options
  }

  pub fn options_mut(&mut self) -> &mut Options {
    &mut self.options
  }

  pub fn preview_visible(&self) -> bool {
    self.preview_visible
  }

  pub fn show_preview(&mut self) {
    self.preview_visible = true;
  }

  pub fn hide_preview(&mut self) {
    self.preview_visible = false;
  }

  /// Whether a caret at `pos` is inside the tracked region.
  pub fn contains(&self, pos: usize) -> bool {
    self.region.contains(pos)
  }

  /// Span of the abbreviation text proper, prefix excluded.
  pub fn abbreviation_span(&self) -> Span {
    let begin = (self.region.begin + self.offset).min(self.region.end);
    Span::new(begin, self.region.end)
  }

  /// Moves the region through a host edit.
  pub fn map(&mut self, delta: &EditDelta) {
    self.region = delta.map_span(self.region);
  }

  pub fn set_region(&mut self, region: Span) {
    self.region = region;
  }

  /// Re-reads the region from `text` and runs it through the grammar.
  pub fn revalidate<G>(&mut self, text: &Rope, grammar: &G) -> &Abbreviation<A>
  where
    G: Grammar<Ast = A>,
  {
    let span = self.abbreviation_span().clamp(text.len_chars());
    let abbr = Tendril::from(text.slice(span.range()).to_string());

    self.abbreviation = if abbr.is_empty() {
      Abbreviation::Empty
    } else {
      match grammar.parse(&abbr, &self.options) {
        Ok(ast) => Abbreviation::Valid { abbr, ast },
        Err(error) => Abbreviation::Invalid { abbr, error },
      }
    };

    tracing::trace!(region = %self.region, abbreviation = ?self.abbreviation, "revalidated abbreviation");
    &self.abbreviation
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::TagGrammar;

  fn tracker(region: Span, offset: usize) -> RegionTracker<<TagGrammar as Grammar>::Ast> {
    RegionTracker::new(region, TrackingMode::Auto, offset, Options::default())
  }

  #[test]
  fn revalidate_strips_prefix() {
    let text = Rope::from("x <ul>li y");
    let mut trk = tracker(Span::new(2, 8), 1);
    let abbreviation = trk.revalidate(&text, &TagGrammar);
    assert!(abbreviation.is_valid());
    assert_eq!(abbreviation.abbr(), Some("ul>li"));
  }

  #[test]
  fn revalidate_records_parse_errors() {
    let text = Rope::from("div+");
    let mut trk = tracker(Span::new(0, 4), 0);
    trk.revalidate(&text, &TagGrammar);
    assert_eq!(trk.abbreviation().abbr(), Some("div+"));
    assert!(trk.abbreviation().error().is_some());
  }

  #[test]
  fn empty_region_is_empty_abbreviation() {
    let text = Rope::from("abc");
    let mut trk = tracker(Span::point(1), 0);
    assert!(trk.revalidate(&text, &TagGrammar).is_empty());

    // offset larger than the region never underflows
    let mut trk = tracker(Span::new(1, 2), 3);
    assert_eq!(trk.abbreviation_span(), Span::point(2));
    assert!(trk.revalidate(&text, &TagGrammar).is_empty());
  }

  #[test]
  fn map_follows_typing() {
    let mut trk = tracker(Span::new(0, 3), 0);
    trk.map(&EditDelta::insert(3, 3, "x").unwrap());
    assert_eq!(trk.region(), Span::new(0, 4));
    assert_eq!(trk.abbreviation(), &Abbreviation::Empty);
  }

  #[test]
  fn preview_flag_is_independent() {
    let mut trk = tracker(Span::new(0, 3), 0);
    assert!(!trk.preview_visible());
    trk.show_preview();
    assert!(trk.preview_visible());
    trk.hide_preview();
    assert!(!trk.preview_visible());
    assert!(!trk.forced());
  }
}
