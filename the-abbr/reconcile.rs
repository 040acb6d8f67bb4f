//! Deciding when an auto-tracked abbreviation is no longer one.
//!
//! Editors auto-insert a closing bracket when an opener is typed, so an
//! abbreviation such as `a[` followed by the synthetic `]` may be briefly
//! invalid without the user having typed anything wrong. Tracking stops once
//! the user types an invalid character at the end of the abbreviation, or
//! right before the run of closers at its end.

use std::fmt::Debug;

use the_core::chars::{
  char_is_line_ending,
  trailing_closers,
};

use crate::tracker::{
  Abbreviation,
  RegionTracker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
  /// Nothing left to parse.
  Empty,
  /// Auto-tracked abbreviations never span lines.
  LineBreak,
  /// The character just typed at the end made the abbreviation invalid.
  InvalidEnd,
  /// The character just typed before the trailing closers made it invalid.
  InvalidBeforeClosers,
}

/// Why tracking should stop with the caret at `pos`, if it should.
pub fn stop_reason<A: Clone + Debug>(tracker: &RegionTracker<A>, pos: usize) -> Option<StopReason> {
  if tracker.forced() {
    return None;
  }

  let abbr = match tracker.abbreviation() {
    Abbreviation::Empty => return Some(StopReason::Empty),
    Abbreviation::Valid { abbr, .. } | Abbreviation::Invalid { abbr, .. } => abbr,
  };
  if abbr.chars().any(char_is_line_ending) {
    return Some(StopReason::LineBreak);
  }

  if tracker.abbreviation().error().is_none() {
    return None;
  }

  let region = tracker.region();
  if region.end == pos {
    return Some(StopReason::InvalidEnd);
  }

  let closers_start = region.end - trailing_closers(abbr);
  (closers_start == pos).then_some(StopReason::InvalidBeforeClosers)
}

pub fn should_stop_tracking<A: Clone + Debug>(tracker: &RegionTracker<A>, pos: usize) -> bool {
  stop_reason(tracker, pos).is_some()
}
