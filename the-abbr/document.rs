//! Host documents as seen by the abbreviation service.
//!
//! Hosts implement [`DocumentSurface`] for whatever their buffers are. The
//! service only reads text, moves the primary selection, replaces text with
//! expanded snippets and keeps one named marker per document so a tracked
//! span survives undo.
//!
//! [`MemoryDocument`] is a rope-backed implementation with the bits of editor
//! behavior the tracker reacts to: bracket auto-pairing, marker mapping
//! through edits and snapshot undo that restores markers.
//!
//! ```ignore
//! let mut doc = MemoryDocument::new(DocumentId::new(NonZeroUsize::new(1).unwrap()), "");
//! let delta = doc.type_char('(')?;
//! assert_eq!(doc.text(), "()");
//! assert_eq!(doc.caret(), 1);
//! ```

use std::{
  collections::HashMap,
  num::NonZeroUsize,
};

use ropey::Rope;
use the_core::chars::{
  char_is_closer,
  closer_for,
};
use thiserror::Error;

use crate::{
  Tendril,
  edit::{
    Assoc,
    EditDelta,
    EditError,
  },
  span::Span,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(NonZeroUsize);

impl DocumentId {
  pub const fn new(id: NonZeroUsize) -> Self {
    Self(id)
  }

  pub const fn get(self) -> NonZeroUsize {
    self.0
  }
}

impl From<NonZeroUsize> for DocumentId {
  fn from(value: NonZeroUsize) -> Self {
    Self::new(value)
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DocumentError {
  #[error("document is readonly")]
  Readonly,
  #[error("position {pos} is out of bounds for document length {len}")]
  OutOfBounds { pos: usize, len: usize },
  #[error(transparent)]
  Edit(#[from] EditError),
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// Primary selection. `head` is where the caret is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
  pub anchor: usize,
  pub head:   usize,
}

impl Selection {
  pub fn new(anchor: usize, head: usize) -> Self {
    Self { anchor, head }
  }

  pub fn point(pos: usize) -> Self {
    Self::new(pos, pos)
  }

  pub fn span(&self) -> Span {
    Span::new(self.anchor, self.head)
  }

  pub fn is_empty(&self) -> bool {
    self.anchor == self.head
  }

  #[must_use]
  pub fn map(self, delta: &EditDelta) -> Self {
    Self {
      anchor: delta.map_pos(self.anchor, Assoc::After),
      head:   delta.map_pos(self.head, Assoc::After),
    }
  }
}

pub trait DocumentSurface {
  fn id(&self) -> DocumentId;

  /// Widgets (input panels, consoles) never track abbreviations.
  fn is_widget(&self) -> bool {
    false
  }

  fn text(&self) -> &Rope;

  fn selection(&self) -> Selection;

  fn set_selection(&mut self, selection: Selection);

  fn caret(&self) -> usize {
    self.selection().head
  }

  /// Replaces `span` with an expanded snippet, placing the caret at its first
  /// tab stop.
  fn replace_with_snippet(&mut self, span: Span, snippet: &str) -> Result<()>;

  fn marker(&self, name: &str) -> Option<Span>;

  fn set_marker(&mut self, name: &str, span: Span);

  fn clear_marker(&mut self, name: &str);
}

#[derive(Debug, Clone)]
struct Snapshot {
  text:      Rope,
  selection: Selection,
  markers:   HashMap<Tendril, Span>,
}

#[derive(Debug)]
pub struct MemoryDocument {
  id:         DocumentId,
  text:       Rope,
  selection:  Selection,
  markers:    HashMap<Tendril, Span>,
  history:    Vec<Snapshot>,
  /// Edits made through [`DocumentSurface`] that the host has not reported
  /// back as modifications yet.
  pending:    Vec<EditDelta>,
  auto_pairs: bool,
  widget:     bool,
  readonly:   bool,
  version:    u64,
}

impl MemoryDocument {
  pub fn new(id: DocumentId, text: &str) -> Self {
    Self {
      id,
      text: Rope::from(text),
      selection: Selection::point(0),
      markers: HashMap::new(),
      history: Vec::new(),
      pending: Vec::new(),
      auto_pairs: true,
      widget: false,
      readonly: false,
      version: 0,
    }
  }

  #[must_use]
  pub fn with_auto_pairs(mut self, auto_pairs: bool) -> Self {
    self.auto_pairs = auto_pairs;
    self
  }

  #[must_use]
  pub fn with_widget(mut self, widget: bool) -> Self {
    self.widget = widget;
    self
  }

  pub fn set_readonly(&mut self, readonly: bool) {
    self.readonly = readonly;
  }

  pub fn version(&self) -> u64 {
    self.version
  }

  pub fn len_chars(&self) -> usize {
    self.text.len_chars()
  }

  /// Moves the caret, collapsing the selection.
  pub fn move_to(&mut self, pos: usize) -> Result<()> {
    self.select(pos, pos)
  }

  pub fn select(&mut self, anchor: usize, head: usize) -> Result<()> {
    let len = self.len_chars();
    if let Some(pos) = [anchor, head].into_iter().find(|&pos| pos > len) {
      return Err(DocumentError::OutOfBounds { pos, len });
    }
    self.selection = Selection::new(anchor, head);
    Ok(())
  }

  /// Applies `delta`, mapping the selection and markers through it.
  pub fn apply(&mut self, delta: &EditDelta) -> Result<()> {
    if self.readonly {
      return Err(DocumentError::Readonly);
    }
    if delta.is_empty() {
      return Ok(());
    }

    let snapshot = Snapshot {
      text:      self.text.clone(),
      selection: self.selection,
      markers:   self.markers.clone(),
    };
    delta.apply(&mut self.text)?;
    self.history.push(snapshot);

    self.selection = self.selection.map(delta);
    for span in self.markers.values_mut() {
      *span = delta.map_span(*span);
    }
    self.version = self.version.saturating_add(1);
    Ok(())
  }

  /// Types a single character over the selection.
  ///
  /// With auto-pairs on, an opening bracket also inserts its closer, and a
  /// closer typed right before the same closer only moves the caret. The
  /// returned delta is empty in that case.
  pub fn type_char(&mut self, ch: char) -> Result<EditDelta> {
    let span = self.selection.span();
    let next = self.char_at(span.end);

    if self.auto_pairs && span.is_empty() && char_is_closer(ch) && next == Some(ch) {
      self.selection = Selection::point(span.end + 1);
      return Ok(EditDelta::empty(self.len_chars()));
    }

    let mut inserted = Tendril::new();
    inserted.push(ch);
    if self.auto_pairs {
      if let Some(close) = closer_for(ch) {
        if next.is_none_or(|c| !c.is_alphanumeric()) {
          inserted.push(close);
        }
      }
    }

    let delta = EditDelta::new(self.len_chars(), [(span.begin, span.end, Some(inserted))])?;
    self.apply(&delta)?;
    self.selection = Selection::point(span.begin + 1);
    Ok(delta)
  }

  /// Deletes the selection, or the character before the caret.
  ///
  /// Deleting an opener between an auto-paired bracket pair removes both.
  pub fn backspace(&mut self) -> Result<EditDelta> {
    let span = self.selection.span();
    let (from, to) = if !span.is_empty() {
      (span.begin, span.end)
    } else if span.begin == 0 {
      return Ok(EditDelta::empty(self.len_chars()));
    } else {
      let prev = self.char_at(span.begin - 1);
      let paired = self.auto_pairs
        && prev.and_then(closer_for).is_some()
        && prev.and_then(closer_for) == self.char_at(span.begin);
      (span.begin - 1, if paired { span.begin + 1 } else { span.begin })
    };

    let delta = EditDelta::delete(self.len_chars(), from, to)?;
    self.apply(&delta)?;
    self.selection = Selection::point(from);
    Ok(delta)
  }

  /// Restores the state before the last edit.
  pub fn undo(&mut self) -> bool {
    let Some(snapshot) = self.history.pop() else {
      return false;
    };
    self.text = snapshot.text;
    self.selection = snapshot.selection;
    self.markers = snapshot.markers;
    self.version = self.version.saturating_add(1);
    true
  }

  /// Takes the edits made through [`DocumentSurface`] since the last call.
  pub fn take_pending_edits(&mut self) -> Vec<EditDelta> {
    std::mem::take(&mut self.pending)
  }

  fn char_at(&self, pos: usize) -> Option<char> {
    (pos < self.len_chars()).then(|| self.text.char(pos))
  }
}

impl DocumentSurface for MemoryDocument {
  fn id(&self) -> DocumentId {
    self.id
  }

  fn is_widget(&self) -> bool {
    self.widget
  }

  fn text(&self) -> &Rope {
    &self.text
  }

  fn selection(&self) -> Selection {
    self.selection
  }

  fn set_selection(&mut self, selection: Selection) {
    let len = self.len_chars();
    self.selection = Selection::new(selection.anchor.min(len), selection.head.min(len));
  }

  fn replace_with_snippet(&mut self, span: Span, snippet: &str) -> Result<()> {
    let (text, caret) = flatten_snippet(snippet);
    let inserted = text.chars().count();
    let delta = EditDelta::new(self.len_chars(), [(span.begin, span.end, Some(text))])?;
    self.apply(&delta)?;
    self.selection = Selection::point(span.begin + caret.unwrap_or(inserted));
    self.pending.push(delta);
    Ok(())
  }

  fn marker(&self, name: &str) -> Option<Span> {
    self.markers.get(name).copied()
  }

  fn set_marker(&mut self, name: &str, span: Span) {
    self.markers.insert(name.into(), span);
  }

  fn clear_marker(&mut self, name: &str) {
    self.markers.remove(name);
  }
}

fn record_stop(first: &mut Option<(usize, usize)>, index: usize, at: usize) {
  let rank = if index == 0 { usize::MAX } else { index };
  if first.is_none_or(|(best, _)| rank < best) {
    *first = Some((rank, at));
  }
}

/// Appends a decimal digit to a tab stop index, saturating on overflow.
fn push_digit(index: usize, digit: u32) -> usize {
  index.saturating_mul(10).saturating_add(digit as usize)
}

/// Turns snippet text into plain text plus the offset of its first tab stop.
///
/// Understands `$1`, `${1}` and `${1:placeholder}`; `\$` escapes a dollar.
/// Stops are ordered by number with `$0` last.
pub fn flatten_snippet(snippet: &str) -> (Tendril, Option<usize>) {
  let mut out = Tendril::new();
  let mut len = 0;
  let mut first: Option<(usize, usize)> = None;
  let mut chars = snippet.chars().peekable();

  while let Some(ch) = chars.next() {
    match ch {
      '\\' if chars.peek() == Some(&'$') => {
        chars.next();
        out.push('$');
        len += 1;
      },
      '$' if chars.peek().is_some_and(|c| c.is_ascii_digit()) => {
        let mut index = 0;
        while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
          index = push_digit(index, digit);
          chars.next();
        }
        record_stop(&mut first, index, len);
      },
      '$' if chars.peek() == Some(&'{') => {
        chars.next();
        let mut index = 0;
        while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
          index = push_digit(index, digit);
          chars.next();
        }
        record_stop(&mut first, index, len);
        if chars.peek() == Some(&':') {
          chars.next();
        }
        let mut depth = 1;
        for c in chars.by_ref() {
          match c {
            '{' => depth += 1,
            '}' => {
              depth -= 1;
              if depth == 0 {
                break;
              }
            },
            _ => {},
          }
          out.push(c);
          len += 1;
        }
      },
      _ => {
        out.push(ch);
        len += 1;
      },
    }
  }

  (out, first.map(|(_, at)| at))
}
