//! Events a host feeds into [`crate::service::AbbreviationService::dispatch`].
//!
//! Hosts deliver events for a document strictly in the order they happened.
//! A typed character is reported as [`EditorEvent::Modified`] followed by
//! [`EditorEvent::SelectionModified`].

use std::str::FromStr;

use crate::{
  Tendril,
  edit::EditDelta,
  grammar::ParseError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextCommand {
  AutoComplete,
  CommitCompletion,
  Undo,
  Other(Tendril),
}

impl From<&str> for TextCommand {
  fn from(name: &str) -> Self {
    match name {
      "auto_complete" => Self::AutoComplete,
      "commit_completion" => Self::CommitCompletion,
      "undo" | "soft_undo" => Self::Undo,
      other => Self::Other(other.into()),
    }
  }
}

/// Commands the plugin exposes to the host's UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  ExpandAbbreviation,
  ExtractAbbreviation,
  EnterAbbreviation,
  ClearAbbreviationMarker,
}

impl Command {
  pub const ALL: [Command; 4] = [
    Self::ExpandAbbreviation,
    Self::ExtractAbbreviation,
    Self::EnterAbbreviation,
    Self::ClearAbbreviationMarker,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Self::ExpandAbbreviation => "emmet_expand_abbreviation",
      Self::ExtractAbbreviation => "emmet_extract_abbreviation",
      Self::EnterAbbreviation => "emmet_enter_abbreviation",
      Self::ClearAbbreviationMarker => "emmet_clear_abbreviation_marker",
    }
  }
}

impl FromStr for Command {
  type Err = UnknownName;

  fn from_str(name: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|command| command.name() == name)
      .ok_or_else(|| UnknownName(name.into()))
  }
}

/// Keys the host's keybinding conditions may query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKey {
  /// Caret inside a valid or forced abbreviation.
  Abbreviation,
  TabExpand,
  HasMarker,
  HasForcedMarker,
}

impl ContextKey {
  pub const ALL: [ContextKey; 4] = [
    Self::Abbreviation,
    Self::TabExpand,
    Self::HasMarker,
    Self::HasForcedMarker,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Self::Abbreviation => "emmet_abbreviation",
      Self::TabExpand => "emmet_tab_expand",
      Self::HasMarker => "has_emmet_abbreviation_mark",
      Self::HasForcedMarker => "has_emmet_forced_abbreviation_mark",
    }
  }
}

impl FromStr for ContextKey {
  type Err = UnknownName;

  fn from_str(name: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|key| key.name() == name)
      .ok_or_else(|| UnknownName(name.into()))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown name: {0}")]
pub struct UnknownName(pub Tendril);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
  Activated,
  Close,
  SelectionModified,
  Modified(EditDelta),
  TextCommand(TextCommand),
  PostTextCommand(TextCommand),
  QueryContext(ContextKey),
  QueryCompletions { pos: usize },
  Command(Command),
}

/// A completion offered for the abbreviation at the caret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
  /// Label shown in the completion list, `abbr\tEmmet`.
  pub trigger: Tendril,
  pub snippet: Tendril,
}

/// What the UI layer should render next to a visible tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
  Expansion(Tendril),
  Error(ParseError),
}

/// Result of dispatching an event; most events produce nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
  None,
  Context(bool),
  Completions(Option<Completion>),
}
