//! One tracker per document.
//!
//! [`TrackerRegistry`] is the only owner of [`RegionTracker`]s. Starting a
//! tracker for a document that already has one replaces it, so there is never
//! more than one abbreviation tracked per document.

use std::{
  collections::HashMap,
  fmt::Debug,
};

use ropey::Rope;

use crate::{
  document::DocumentId,
  edit::EditDelta,
  grammar::Grammar,
  span::Span,
  tracker::RegionTracker,
};

#[derive(Debug)]
pub struct TrackerRegistry<A> {
  trackers: HashMap<DocumentId, RegionTracker<A>>,
}

impl<A> Default for TrackerRegistry<A> {
  fn default() -> Self {
    Self {
      trackers: HashMap::new(),
    }
  }
}

impl<A: Clone + Debug> TrackerRegistry<A> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `tracker` for `doc`, replacing any tracker it already had.
  pub fn start(&mut self, doc: DocumentId, tracker: RegionTracker<A>) -> &mut RegionTracker<A> {
    if let Some(previous) = self.trackers.remove(&doc) {
      tracing::debug!(?doc, region = %previous.region(), "replacing abbreviation tracker");
    }
    self.trackers.entry(doc).or_insert(tracker)
  }

  /// Drops the tracker of `doc`, if any.
  pub fn stop(&mut self, doc: DocumentId) -> Option<RegionTracker<A>> {
    self.trackers.remove(&doc)
  }

  pub fn get(&self, doc: DocumentId) -> Option<&RegionTracker<A>> {
    self.trackers.get(&doc)
  }

  pub fn get_mut(&mut self, doc: DocumentId) -> Option<&mut RegionTracker<A>> {
    self.trackers.get_mut(&doc)
  }

  pub fn contains(&self, doc: DocumentId) -> bool {
    self.trackers.contains_key(&doc)
  }

  pub fn len(&self) -> usize {
    self.trackers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.trackers.is_empty()
  }

  pub fn documents(&self) -> impl Iterator<Item = DocumentId> + '_ {
    self.trackers.keys().copied()
  }

  /// Drops every tracker, returning the documents that had one.
  pub fn clear(&mut self) -> Vec<DocumentId> {
    self.trackers.drain().map(|(doc, _)| doc).collect()
  }

  /// Shows the preview when the caret is inside a non-empty abbreviation and
  /// hides it otherwise. Trackers are never dropped here.
  pub fn update_on_selection_change(
    &mut self,
    doc: DocumentId,
    caret: usize,
  ) -> Option<&RegionTracker<A>> {
    let tracker = self.trackers.get_mut(&doc)?;
    if tracker.contains(caret) && !tracker.abbreviation().is_empty() {
      tracker.show_preview();
    } else {
      tracker.hide_preview();
    }
    Some(&*tracker)
  }

  /// Maps the tracked region through `delta` and revalidates it against the
  /// edited `text`.
  ///
  /// An auto tracker whose region collapsed is dropped and `None` returned.
  pub fn update_on_edit<G>(
    &mut self,
    doc: DocumentId,
    delta: &EditDelta,
    text: &Rope,
    grammar: &G,
  ) -> Option<&RegionTracker<A>>
  where
    G: Grammar<Ast = A>,
  {
    let tracker = self.trackers.get_mut(&doc)?;
    tracker.map(delta);
    if tracker.region().is_empty() && !tracker.forced() {
      tracing::debug!(?doc, "abbreviation region collapsed, stop tracking");
      self.trackers.remove(&doc);
      return None;
    }
    tracker.revalidate(text, grammar);
    self.trackers.get(&doc)
  }

  /// Moves the tracked region to `region`, e.g. a marker restored by undo,
  /// and revalidates it.
  pub fn resync<G>(
    &mut self,
    doc: DocumentId,
    region: Span,
    text: &Rope,
    grammar: &G,
  ) -> Option<&RegionTracker<A>>
  where
    G: Grammar<Ast = A>,
  {
    let tracker = self.trackers.get_mut(&doc)?;
    tracker.set_region(region.clamp(text.len_chars()));
    tracker.revalidate(text, grammar);
    Some(&*tracker)
  }
}
