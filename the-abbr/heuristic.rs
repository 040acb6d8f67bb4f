//! Whether the character just typed starts a new abbreviation.
//!
//! Tracking starts only when the user types the first character of an
//! abbreviation at a word boundary: the character before it must be
//! whitespace, `>`, `;`, a quote, or the start of the text. In JSX the
//! abbreviation must instead follow a prefix marker (`<` by default), which
//! becomes part of the region but is excluded from parsing.
//!
//! ```text
//! html: "<p> d|"    → tracks [4, 5)
//! html: "<p>xd|"    → nothing, `x` is not a boundary
//! jsx:  "return <d|" → tracks the `<d` with offset 1
//! ```

use ropey::Rope;
use the_core::chars::{
  char_is_abbreviation_start,
  char_is_jsx_abbreviation_start,
  char_is_word_bound,
  closer_for,
};

use crate::span::Span;

/// Where a new auto tracker should start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingStart {
  pub span:   Span,
  /// Length of the prefix marker at the start of `span`.
  pub offset: usize,
}

/// Checks the chars before `pos` for the start of an abbreviation.
///
/// `jsx_prefix` is the required prefix marker when the syntax at `pos` is a
/// JSX dialect, `None` otherwise.
pub fn tracking_start(text: &Rope, pos: usize, jsx_prefix: Option<&str>) -> Option<TrackingStart> {
  if pos == 0 || pos > text.len_chars() {
    return None;
  }

  let (start, offset) = match jsx_prefix {
    Some(marker) => {
      let marker_len = marker.chars().count();
      let start = pos.checked_sub(marker_len + 1)?;
      let window = text.slice(start..pos);
      let typed = window.char(marker_len);
      let prefixed = window.chars().take(marker_len).eq(marker.chars());
      if !prefixed || !char_is_jsx_abbreviation_start(typed) {
        return None;
      }
      (start, marker_len)
    },
    None => {
      let typed = text.char(pos - 1);
      let bounded = pos == 1 || char_is_word_bound(text.char(pos - 2));
      if !bounded || !char_is_abbreviation_start(typed) {
        return None;
      }
      (pos - 1, 0)
    },
  };

  // swallow the closer an editor auto-inserted after a typed opener
  let mut end = pos;
  let typed = text.char(pos - 1);
  if let Some(close) = closer_for(typed) {
    if pos < text.len_chars() && text.char(pos) == close {
      end += 1;
    }
  }

  Some(TrackingStart {
    span: Span::new(start, end),
    offset,
  })
}
