//! Text edits as seen by the tracker.
//!
//! An [`EditDelta`] is the set of replacements a host applied to a document in
//! a single modification. Changes are expressed in char offsets of the
//! document *before* the edit, sorted and non-overlapping, the same way
//! editors batch multi-cursor typing.
//!
//! # Span Mapping
//!
//! [`EditDelta::map_span`] moves a tracked [`Span`] through the edit:
//!
//! - a change strictly before the span shifts both ends by its length delta
//! - a change strictly after the span leaves it alone
//! - a change touching or overlapping the span grows it to cover the inserted
//!   text (and shrinks it by whatever was removed)
//!
//! ```ignore
//! // "div" tracked at [0, 3), user types "p" at the end
//! let delta = EditDelta::insert(3, 3, "p")?;
//! assert_eq!(delta.map_span(Span::new(0, 3)), Span::new(0, 4));
//! ```
//!
//! Carets and selections use [`EditDelta::map_pos`] instead, which follows an
//! [`Assoc`] rule at insertion points.

use ropey::Rope;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
  Tendril,
  span::Span,
};

pub type Result<T> = std::result::Result<T, EditError>;

/// (from, to) replacement.
pub type Change = (usize, usize, Option<Tendril>);

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditError {
  #[error("invalid change range: start {from} is after end {to}")]
  InvalidRange { from: usize, to: usize },
  #[error("change range {from}..{to} is out of bounds for document length {len}")]
  RangeOutOfBounds {
    from: usize,
    to:   usize,
    len:  usize,
  },
  #[error("change range {from}..{to} overlaps previous end {prev_end}")]
  OverlappingRange {
    prev_end: usize,
    from:     usize,
    to:       usize,
  },
  #[error("edit length mismatch: expected document of {expected} chars, got {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Assoc {
  /// Stay before text inserted at this position.
  Before,
  /// Move after text inserted at this position.
  After,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDelta {
  changes:   SmallVec<[Change; 1]>,
  len:       usize,
  len_after: usize,
}

fn chars_of(text: &Option<Tendril>) -> usize {
  text.as_ref().map_or(0, |t| t.chars().count())
}

fn rebase(pos: usize, shift: isize) -> usize {
  pos.saturating_add_signed(shift)
}

impl EditDelta {
  /// Builds a delta for a document of `len` chars.
  pub fn new<I>(len: usize, changes: I) -> Result<Self>
  where
    I: IntoIterator<Item = Change>,
  {
    let mut len_after = len;
    let mut prev_end = 0;
    let mut collected = SmallVec::new();

    for (from, to, text) in changes {
      if from > to {
        return Err(EditError::InvalidRange { from, to });
      }
      if to > len {
        return Err(EditError::RangeOutOfBounds { from, to, len });
      }
      if from < prev_end {
        return Err(EditError::OverlappingRange { prev_end, from, to });
      }
      prev_end = to;

      let text = text.filter(|t| !t.is_empty());
      if from == to && text.is_none() {
        continue;
      }
      len_after = len_after - (to - from) + chars_of(&text);
      collected.push((from, to, text));
    }

    Ok(Self {
      changes: collected,
      len,
      len_after,
    })
  }

  /// A delta that leaves a document of `len` chars untouched.
  pub fn empty(len: usize) -> Self {
    Self {
      changes: SmallVec::new(),
      len,
      len_after: len,
    }
  }

  /// A single insertion of `text` at `pos`.
  pub fn insert(len: usize, pos: usize, text: impl Into<Tendril>) -> Result<Self> {
    Self::new(len, [(pos, pos, Some(text.into()))])
  }

  /// A single deletion of `[from, to)`.
  pub fn delete(len: usize, from: usize, to: usize) -> Result<Self> {
    Self::new(len, [(from, to, None)])
  }

  pub fn changes(&self) -> &[Change] {
    &self.changes
  }

  /// Document length the delta applies to.
  pub fn len(&self) -> usize {
    self.len
  }

  /// Document length after the delta is applied.
  pub fn len_after(&self) -> usize {
    self.len_after
  }

  pub fn is_empty(&self) -> bool {
    self.changes.is_empty()
  }

  /// Signed change in document length.
  pub fn length_delta(&self) -> isize {
    self.len_after as isize - self.len as isize
  }

  /// Iterates over the inserted fragments, in document order.
  pub fn inserted(&self) -> impl Iterator<Item = &str> {
    self
      .changes
      .iter()
      .filter_map(|(_, _, text)| text.as_deref())
  }

  /// Apply the delta in-place.
  pub fn apply(&self, text: &mut Rope) -> Result<()> {
    if text.len_chars() != self.len {
      return Err(EditError::LengthMismatch {
        expected: self.len,
        actual:   text.len_chars(),
      });
    }

    // Walk backwards so earlier offsets stay valid.
    for (from, to, fragment) in self.changes.iter().rev() {
      if from < to {
        text.remove(*from..*to);
      }
      if let Some(fragment) = fragment {
        text.insert(*from, fragment);
      }
    }

    Ok(())
  }

  /// Maps a tracked span through the delta.
  pub fn map_span(&self, span: Span) -> Span {
    let Span { mut begin, mut end } = span;
    let mut shift = 0isize;

    for (from, to, text) in &self.changes {
      let from = rebase(*from, shift);
      let to = rebase(*to, shift);
      let removed = to - from;
      let inserted = chars_of(text);

      if to < begin {
        begin = begin - removed + inserted;
        end = end - removed + inserted;
      } else if from <= end {
        begin = begin.min(from);
        end = end.max(to) - removed + inserted;
      }

      shift += inserted as isize - removed as isize;
    }

    Span { begin, end }
  }

  /// Maps a single position through the delta.
  pub fn map_pos(&self, pos: usize, assoc: Assoc) -> usize {
    let mut shift = 0isize;

    for (from, to, text) in &self.changes {
      if pos < *from || (pos == *from && pos == *to && assoc == Assoc::Before) {
        break;
      }
      let inserted = chars_of(text);
      if pos < *to || (pos == *to && *from == *to) {
        let base = rebase(*from, shift);
        return match assoc {
          Assoc::Before => base,
          Assoc::After => base + inserted,
        };
      }
      shift += inserted as isize - (to - from) as isize;
    }

    rebase(pos, shift)
  }
}
