//! Character classes used when deciding where abbreviations start and end.

/// Bracket pairs an editor may auto-close while an abbreviation is typed.
pub const BRACKET_PAIRS: &[(char, char)] = &[('{', '}'), ('[', ']'), ('(', ')')];

#[derive(Debug, Eq, PartialEq)]
pub enum CharCategory {
  Eol,
  Boundary,
  AbbreviationStart,
  Closer,
  Unknown,
}

pub fn categorize_char(ch: char) -> CharCategory {
  match ch {
    c if char_is_line_ending(c) => CharCategory::Eol,
    c if char_is_word_bound(c) => CharCategory::Boundary,
    c if char_is_abbreviation_start(c) => CharCategory::AbbreviationStart,
    c if char_is_closer(c) => CharCategory::Closer,
    _ => CharCategory::Unknown,
  }
}

/// Returns the closing counterpart of an opening bracket.
#[inline]
pub fn closer_for(open: char) -> Option<char> {
  BRACKET_PAIRS
    .iter()
    .find(|(o, _)| *o == open)
    .map(|(_, close)| *close)
}

#[inline]
pub fn char_is_closer(ch: char) -> bool {
  BRACKET_PAIRS.iter().any(|(_, close)| *close == ch)
}

#[inline]
pub fn char_is_line_ending(ch: char) -> bool {
  matches!(ch, '\n' | '\r')
}

/// Characters allowed right before the first character of an abbreviation.
///
/// Start-of-text is a boundary too, callers handle that case by passing a
/// shorter prefix.
#[inline]
pub fn char_is_word_bound(ch: char) -> bool {
  ch.is_whitespace() || matches!(ch, '>' | ';' | '"' | '\'')
}

/// Characters that may open an abbreviation in markup and stylesheets.
#[inline]
pub fn char_is_abbreviation_start(ch: char) -> bool {
  ch.is_ascii_alphabetic() || matches!(ch, '.' | '#' | '!' | '@' | '[' | '(')
}

/// Characters that may open an abbreviation following a JSX prefix marker.
#[inline]
pub fn char_is_jsx_abbreviation_start(ch: char) -> bool {
  ch.is_ascii_alphabetic() || matches!(ch, '.' | '#' | '[' | '(')
}

/// Counts the run of closing brackets at the end of `text`.
pub fn trailing_closers(text: &str) -> usize {
  text.chars().rev().take_while(|&c| char_is_closer(c)).count()
}
