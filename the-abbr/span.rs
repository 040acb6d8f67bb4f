//! Half-open character spans.
//!
//! A [`Span`] covers `[begin, end)` in char offsets of a document. Spans are
//! what the tracker follows through edits and what hosts persist as markers.
//!
//! ```text
//! begin=4, end=7: "<p> [div]</p>"
//! ```
//!
//! Caret containment is inclusive of `end`: a caret placed right after the
//! last typed character still sits inside the abbreviation. Use
//! [`Span::contains`] for carets and [`Span::covers`] for other spans.

use std::{
  fmt,
  ops,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
  pub begin: usize,
  pub end:   usize,
}

impl Span {
  /// Creates a span, swapping the bounds when given in reverse.
  #[must_use]
  pub fn new(a: usize, b: usize) -> Self {
    if a <= b {
      Self { begin: a, end: b }
    } else {
      Self { begin: b, end: a }
    }
  }

  #[must_use]
  pub fn point(pos: usize) -> Self {
    Self {
      begin: pos,
      end:   pos,
    }
  }

  /// Number of chars covered. The fields are public, so a hand-built span
  /// with `begin > end` is malformed and counts as empty.
  #[inline]
  pub fn len(&self) -> usize {
    self.end.saturating_sub(self.begin)
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.begin >= self.end
  }

  /// Whether a caret at `pos` is inside the span, `end` included.
  #[inline]
  pub fn contains(&self, pos: usize) -> bool {
    self.begin <= pos && pos <= self.end
  }

  /// Whether `other` lies entirely within this span.
  #[inline]
  pub fn covers(&self, other: Span) -> bool {
    self.begin <= other.begin && other.end <= self.end
  }

  /// Clamps both ends to a document of `len` chars.
  #[must_use]
  pub fn clamp(self, len: usize) -> Self {
    Self {
      begin: self.begin.min(len),
      end:   self.end.min(len),
    }
  }

  pub fn range(&self) -> ops::Range<usize> {
    self.begin..self.end
  }
}

impl From<ops::Range<usize>> for Span {
  fn from(range: ops::Range<usize>) -> Self {
    Self::new(range.start, range.end)
  }
}

impl fmt::Display for Span {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}, {})", self.begin, self.end)
  }
}
