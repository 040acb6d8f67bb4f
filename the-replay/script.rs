//! Session scripts.
//!
//! A script describes a starting document and the keystrokes and commands a
//! user performs on it:
//!
//! ```toml
//! text = "<ul>"
//! syntax = "html"
//!
//! [settings]
//! tab-expand = true
//!
//! [[step]]
//! action = "type"
//! text = ".item"
//!
//! [[step]]
//! action = "command"
//! name = "emmet_expand_abbreviation"
//! ```

use std::{
  fmt,
  fs,
  num::NonZeroUsize,
  path::Path,
};

use anyhow::{
  Context,
  Result,
  bail,
};
use serde::Deserialize;
use the_abbr::{
  config::Settings,
  document::{
    DocumentId,
    DocumentSurface,
    MemoryDocument,
  },
  event::{
    Command,
    ContextKey,
    EditorEvent,
    Reply,
    TextCommand,
  },
  service::AbbreviationService,
  syntax::FixedSyntax,
  testing::TagGrammar,
  tracker::Abbreviation,
};

fn default_syntax() -> String {
  "html".to_string()
}

fn one() -> usize {
  1
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
  #[serde(default)]
  pub text:     String,
  /// Initial caret, the end of `text` when missing.
  pub caret:    Option<usize>,
  #[serde(default = "default_syntax")]
  pub syntax:   String,
  /// Overrides for the settings loaded from `--config`.
  #[serde(default)]
  pub settings: toml::Table,
  #[serde(default, rename = "step")]
  pub steps:    Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
  Type {
    text: String,
  },
  Backspace {
    #[serde(default = "one")]
    count: usize,
  },
  Move {
    pos: usize,
  },
  Select {
    anchor: usize,
    head:   usize,
  },
  Command {
    name: String,
  },
  Undo,
  /// Opens the completion list, optionally committing the offered entry.
  Complete {
    #[serde(default)]
    commit: bool,
  },
  Query {
    key: String,
  },
  Close,
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Type { text } => write!(f, "type {text:?}"),
      Self::Backspace { count } => write!(f, "backspace x{count}"),
      Self::Move { pos } => write!(f, "move {pos}"),
      Self::Select { anchor, head } => write!(f, "select {anchor}..{head}"),
      Self::Command { name } => write!(f, "command {name}"),
      Self::Undo => write!(f, "undo"),
      Self::Complete { commit } => write!(f, "complete{}", if *commit { " + commit" } else { "" }),
      Self::Query { key } => write!(f, "query {key}"),
      Self::Close => write!(f, "close"),
    }
  }
}

impl Script {
  pub fn from_toml(source: &str) -> Result<Self> {
    toml::from_str(source).context("invalid session script")
  }

  pub fn load(path: &Path) -> Result<Self> {
    let source = fs::read_to_string(path)
      .with_context(|| format!("failed to read script {}", path.display()))?;
    Self::from_toml(&source).with_context(|| format!("in {}", path.display()))
  }

  /// Applies the script's `[settings]` table on top of `base`.
  pub fn settings(&self, base: Settings) -> Result<Settings> {
    if self.settings.is_empty() {
      return Ok(base);
    }
    let mut merged: toml::Table = toml::from_str(&toml::to_string(&base)?)?;
    for (key, value) in &self.settings {
      merged.insert(key.clone(), value.clone());
    }
    Settings::from_toml(&toml::to_string(&merged)?).context("invalid [settings] in script")
  }
}

/// One document driven through the abbreviation service.
pub struct Session {
  service: AbbreviationService<TagGrammar, FixedSyntax>,
  doc:     MemoryDocument,
}

impl Session {
  pub fn new(script: &Script, settings: Settings) -> Result<Self> {
    let id = DocumentId::new(NonZeroUsize::MIN);
    let mut doc = MemoryDocument::new(id, &script.text);
    doc.move_to(script.caret.unwrap_or(doc.len_chars()))?;

    let syntax = FixedSyntax::new(script.syntax.as_str());
    let mut service = AbbreviationService::new(TagGrammar, syntax, settings);
    service.dispatch(&mut doc, EditorEvent::Activated);
    Ok(Self { service, doc })
  }

  pub fn text(&self) -> String {
    self.doc.text().to_string()
  }

  pub fn caret(&self) -> usize {
    self.doc.caret()
  }

  fn send(&mut self, event: EditorEvent) -> Reply {
    self.service.dispatch(&mut self.doc, event)
  }

  /// Reports edits the service made to the document back to it.
  fn flush(&mut self) {
    for delta in self.doc.take_pending_edits() {
      self.send(EditorEvent::Modified(delta));
    }
    self.send(EditorEvent::SelectionModified);
  }

  /// Runs one step, returning what it produced for queries and completions.
  pub fn run_step(&mut self, step: &Step) -> Result<Option<String>> {
    match step {
      Step::Type { text } => {
        for ch in text.chars() {
          let delta = self.doc.type_char(ch)?;
          self.send(EditorEvent::Modified(delta));
          self.send(EditorEvent::SelectionModified);
        }
      },
      Step::Backspace { count } => {
        for _ in 0..*count {
          let delta = self.doc.backspace()?;
          self.send(EditorEvent::Modified(delta));
          self.send(EditorEvent::SelectionModified);
        }
      },
      Step::Move { pos } => {
        self.doc.move_to(*pos)?;
        self.send(EditorEvent::SelectionModified);
      },
      Step::Select { anchor, head } => {
        self.doc.select(*anchor, *head)?;
        self.send(EditorEvent::SelectionModified);
      },
      Step::Command { name } => {
        let command: Command = name.parse()?;
        self.send(EditorEvent::Command(command));
        self.flush();
      },
      Step::Undo => {
        self.send(EditorEvent::TextCommand(TextCommand::Undo));
        if !self.doc.undo() {
          log::info!("nothing to undo");
        }
        self.send(EditorEvent::PostTextCommand(TextCommand::Undo));
      },
      Step::Complete { commit } => return self.complete(*commit).map(Some),
      Step::Query { key } => {
        let key: ContextKey = key.parse()?;
        let Reply::Context(value) = self.send(EditorEvent::QueryContext(key)) else {
          bail!("no answer for {}", key.name());
        };
        return Ok(Some(format!("{} = {value}", key.name())));
      },
      Step::Close => {
        self.send(EditorEvent::Close);
      },
    }
    Ok(None)
  }

  fn complete(&mut self, commit: bool) -> Result<String> {
    let pos = self.doc.caret();
    self.send(EditorEvent::TextCommand(TextCommand::AutoComplete));
    let reply = self.send(EditorEvent::QueryCompletions { pos });
    self.send(EditorEvent::PostTextCommand(TextCommand::AutoComplete));

    let Reply::Completions(Some(completion)) = reply else {
      return Ok("no completion".to_string());
    };
    let line = format!(
      "{:?} -> {:?}",
      completion.trigger.as_str(),
      completion.snippet.as_str()
    );
    if !commit {
      return Ok(line);
    }

    let region = self
      .service
      .get(self.doc.id())
      .map(|tracker| tracker.region())
      .context("completion offered without a tracker")?;
    self.send(EditorEvent::TextCommand(TextCommand::CommitCompletion));
    self.doc.replace_with_snippet(region, &completion.snippet)?;
    self.flush();
    Ok(line)
  }

  /// Summary of the tracker, for printing after each step.
  pub fn describe(&self) -> String {
    let Some(tracker) = self.service.get(self.doc.id()) else {
      return "no tracker".to_string();
    };
    let state = match tracker.abbreviation() {
      Abbreviation::Empty => "empty".to_string(),
      Abbreviation::Valid { abbr, .. } => format!("valid {:?}", abbr.as_str()),
      Abbreviation::Invalid { abbr, error } => format!("invalid {:?} ({error})", abbr.as_str()),
    };
    let mode = if tracker.forced() { "forced" } else { "auto" };
    let preview = if tracker.preview_visible() { ", preview" } else { "" };
    format!("{mode} tracker {} {state}{preview}", tracker.region())
  }
}
