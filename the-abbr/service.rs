//! The abbreviation service a host talks to.
//!
//! [`AbbreviationService`] owns the tracker registry, the settings and the
//! grammar and syntax collaborators. Hosts call its handlers (or
//! [`AbbreviationService::dispatch`]) for every editor event, on the thread
//! that owns the documents. Handlers run to completion and never fail: host
//! errors are logged and leave the tracker cleared or untouched.
//!
//! # Event Flow
//!
//! ```text
//! Modified ──► registry.update_on_edit ──► no tracker? heuristic::tracking_start
//!                                       └► reconcile::stop_reason ──► stop
//! SelectionModified ──► show/hide preview
//! Command(Expand) ──► grammar.expand ──► replace_with_snippet ──► stop
//! PostTextCommand(Undo) ──► resync from marker / restore_tracker
//! ```
//!
//! Widgets (`DocumentSurface::is_widget`) are ignored by every event handler.

use std::collections::HashMap;

use crate::{
  ABBREVIATION_MARKER,
  Tendril,
  config::Settings,
  document::{
    DocumentId,
    DocumentSurface,
    Selection,
  },
  edit::EditDelta,
  event::{
    Command,
    Completion,
    ContextKey,
    EditorEvent,
    Preview,
    Reply,
    TextCommand,
  },
  grammar::{
    Grammar,
    Options,
  },
  heuristic,
  reconcile,
  registry::TrackerRegistry,
  span::Span,
  syntax::SyntaxClassifier,
  tracker::{
    Abbreviation,
    RegionTracker,
    TrackingMode,
  },
};

pub struct AbbreviationService<G: Grammar, S> {
  grammar:  G,
  syntax:   S,
  settings: Settings,
  registry: TrackerRegistry<G::Ast>,
  /// Caret position seen at the end of the previous event, per document.
  last_pos: HashMap<DocumentId, usize>,
  /// Set between `auto_complete` and its completion query.
  pending_completions_request: bool,
}

impl<G, S> AbbreviationService<G, S>
where
  G: Grammar,
  S: SyntaxClassifier,
{
  pub fn new(grammar: G, syntax: S, settings: Settings) -> Self {
    Self {
      grammar,
      syntax,
      settings,
      registry: TrackerRegistry::new(),
      last_pos: HashMap::new(),
      pending_completions_request: false,
    }
  }

  pub fn settings(&self) -> &Settings {
    &self.settings
  }

  pub fn set_settings(&mut self, settings: Settings) {
    self.settings = settings;
  }

  pub fn grammar(&self) -> &G {
    &self.grammar
  }

  pub fn registry(&self) -> &TrackerRegistry<G::Ast> {
    &self.registry
  }

  pub fn get(&self, doc: DocumentId) -> Option<&RegionTracker<G::Ast>> {
    self.registry.get(doc)
  }

  /// Whether abbreviations are tracked while typing.
  pub fn is_enabled(&self) -> bool {
    self.settings.auto_mark
  }

  pub fn allow_tracking(&self, doc: &dyn DocumentSurface, pos: usize) -> bool {
    self.is_enabled() && self.syntax.in_activation_scope(doc, pos)
  }

  /// Routes a host event to its handler.
  pub fn dispatch(&mut self, doc: &mut dyn DocumentSurface, event: EditorEvent) -> Reply {
    match event {
      EditorEvent::Activated => self.on_activated(doc),
      EditorEvent::Close => self.on_close(doc),
      EditorEvent::SelectionModified => self.on_selection_modified(doc),
      EditorEvent::Modified(delta) => self.on_modified(doc, &delta),
      EditorEvent::TextCommand(command) => self.on_text_command(doc, &command),
      EditorEvent::PostTextCommand(command) => self.on_post_text_command(doc, &command),
      EditorEvent::QueryContext(key) => return Reply::Context(self.on_query_context(doc, key)),
      EditorEvent::QueryCompletions { pos } => {
        return Reply::Completions(self.on_query_completions(doc, pos));
      },
      EditorEvent::Command(command) => self.run_command(doc, command),
    }
    Reply::None
  }

  pub fn run_command(&mut self, doc: &mut dyn DocumentSurface, command: Command) {
    match command {
      Command::ExpandAbbreviation => self.expand_abbreviation(doc),
      Command::ExtractAbbreviation => self.extract_abbreviation(doc),
      Command::EnterAbbreviation => self.enter_abbreviation(doc),
      Command::ClearAbbreviationMarker => self.clear_abbreviation_marker(doc),
    }
  }

  // Tracker lifecycle.

  /// Starts tracking `span` in `doc`, replacing any current tracker, and
  /// persists the span as the document's abbreviation marker.
  pub fn start_tracking(
    &mut self,
    doc: &mut dyn DocumentSurface,
    span: Span,
    mode: TrackingMode,
    offset: usize,
    options: Options,
  ) -> &mut RegionTracker<G::Ast> {
    let span = span.clamp(doc.text().len_chars());
    let mut tracker = RegionTracker::new(span, mode, offset, options);
    tracker.revalidate(doc.text(), &self.grammar);
    doc.set_marker(ABBREVIATION_MARKER, span);

    tracing::debug!(doc = ?doc.id(), region = %span, ?mode, offset, "start tracking abbreviation");
    self.registry.start(doc.id(), tracker)
  }

  /// Stops tracking in `doc` and clears its marker. No-op without a tracker.
  pub fn stop_tracking(&mut self, doc: &mut dyn DocumentSurface) {
    doc.clear_marker(ABBREVIATION_MARKER);
    if let Some(tracker) = self.registry.stop(doc.id()) {
      tracing::debug!(doc = ?doc.id(), region = %tracker.region(), "stop tracking abbreviation");
    }
  }

  /// Builds tracker options for `pos`, capturing context when asked to.
  pub fn options_for(&self, doc: &dyn DocumentSurface, pos: usize, with_context: bool) -> Options {
    let syntax = self.syntax.syntax_at(doc, pos);
    let prefix = self
      .syntax
      .is_jsx(&syntax)
      .then(|| Tendril::from(self.settings.jsx_prefix.as_str()));
    let context = if with_context {
      self.grammar.capture_context(doc.text(), pos, &syntax)
    } else {
      None
    };

    Options {
      syntax,
      prefix,
      context,
    }
  }

  /// Starts an auto tracker if the character just typed before `pos` opens
  /// an abbreviation.
  pub fn start_abbreviation_tracking(
    &mut self,
    doc: &mut dyn DocumentSurface,
    pos: usize,
  ) -> Option<&RegionTracker<G::Ast>> {
    let syntax = self.syntax.syntax_at(doc, pos);
    let jsx_prefix = self
      .syntax
      .is_jsx(&syntax)
      .then_some(self.settings.jsx_prefix.as_str());
    let start = heuristic::tracking_start(doc.text(), pos, jsx_prefix)?;

    // context capture is slow on large documents, expansion fetches it later
    let with_context = self.settings.capture_context(doc.text().len_chars());
    let options = self.options_for(doc, start.span.begin, with_context);
    let tracker = self.start_tracking(doc, start.span, TrackingMode::Auto, start.offset, options);
    Some(&*tracker)
  }

  /// Tracks the abbreviation at `pos`, extracting one from the caret line
  /// when nothing is tracked there yet.
  pub fn suggest_tracker(
    &mut self,
    doc: &mut dyn DocumentSurface,
    pos: usize,
  ) -> Option<&RegionTracker<G::Ast>> {
    if !self.allow_tracking(doc, pos) {
      return None;
    }

    let id = doc.id();
    match self.registry.get(id).map(|tracker| tracker.contains(pos)) {
      Some(true) => return self.registry.get(id),
      Some(false) => self.stop_tracking(doc),
      None => {},
    }

    let options = self.options_for(doc, pos, true);
    let text = doc.text();
    if pos > text.len_chars() {
      return None;
    }
    let line_start = text.line_to_char(text.char_to_line(pos));
    let line = text.slice(line_start..pos).to_string();
    let extracted = self.grammar.extract(&line, pos - line_start, &options)?;

    let span = Span::new(line_start + extracted.start, line_start + extracted.end);
    let offset = extracted.location.saturating_sub(extracted.start);
    tracing::debug!(abbreviation = %extracted.abbreviation, region = %span, "extracted abbreviation");
    let tracker = self.start_tracking(doc, span, TrackingMode::Auto, offset, options);
    Some(&*tracker)
  }

  /// Rebuilds a tracker from the persisted marker after an undo brought it
  /// back.
  pub fn restore_tracker(&mut self, doc: &mut dyn DocumentSurface) -> Option<&mut RegionTracker<G::Ast>> {
    let marker = doc.marker(ABBREVIATION_MARKER)?;
    if self.registry.contains(doc.id()) {
      return None;
    }

    let options = self.options_for(doc, marker.begin, true);
    let offset = options.prefix_len();
    tracing::debug!(doc = ?doc.id(), region = %marker, "restore abbreviation tracker");
    Some(self.start_tracking(doc, marker, TrackingMode::Auto, offset, options))
  }

  /// Expands the tracked abbreviation of `doc`, capturing the context first
  /// if tracking started without it.
  pub fn expand_tracker(&mut self, doc: &dyn DocumentSurface) -> Option<Tendril> {
    let tracker = self.registry.get_mut(doc.id())?;
    if tracker.options().context.is_none() {
      let begin = tracker.region().begin;
      let syntax = tracker.options().syntax.clone();
      tracker.options_mut().context = self.grammar.capture_context(doc.text(), begin, &syntax);
    }

    let ast = tracker.abbreviation().ast()?;
    match self.grammar.expand(ast, tracker.options()) {
      Ok(snippet) => Some(snippet),
      Err(err) => {
        tracing::debug!(%err, "abbreviation expansion failed");
        None
      },
    }
  }

  /// Preview content for the tracker of `doc`, if its preview is visible.
  pub fn preview(&self, doc: DocumentId) -> Option<Preview> {
    let tracker = self.registry.get(doc)?;
    if !tracker.preview_visible() {
      return None;
    }
    match tracker.abbreviation() {
      Abbreviation::Empty => None,
      Abbreviation::Invalid { error, .. } => Some(Preview::Error(error.clone())),
      Abbreviation::Valid { ast, .. } => {
        self
          .grammar
          .expand(ast, tracker.options())
          .ok()
          .map(Preview::Expansion)
      },
    }
  }

  /// Stops every tracker, e.g. when the plugin is unloaded.
  pub fn shutdown<'a, I>(&mut self, documents: I)
  where
    I: IntoIterator<Item = &'a mut dyn DocumentSurface>,
  {
    for doc in documents {
      self.stop_tracking(doc);
    }
    let leftover = self.registry.clear();
    if !leftover.is_empty() {
      tracing::debug!(?leftover, "dropped trackers of documents not open at shutdown");
    }
    self.last_pos.clear();
    self.pending_completions_request = false;
  }

  // Event handlers.

  pub fn on_close(&mut self, doc: &mut dyn DocumentSurface) {
    if doc.is_widget() {
      return;
    }
    self.stop_tracking(doc);
    self.last_pos.remove(&doc.id());
  }

  pub fn on_activated(&mut self, doc: &mut dyn DocumentSurface) {
    if doc.is_widget() {
      return;
    }
    let caret = doc.caret();
    self.registry.update_on_selection_change(doc.id(), caret);
    self.last_pos.insert(doc.id(), caret);
  }

  pub fn on_selection_modified(&mut self, doc: &mut dyn DocumentSurface) {
    if doc.is_widget() || !self.is_enabled() {
      return;
    }
    let caret = doc.caret();
    self.registry.update_on_selection_change(doc.id(), caret);
    self.last_pos.insert(doc.id(), caret);
  }

  pub fn on_modified(&mut self, doc: &mut dyn DocumentSurface, delta: &EditDelta) {
    if doc.is_widget() {
      return;
    }

    let id = doc.id();
    let pos = doc.caret();
    let last_pos = self.last_pos.get(&id).copied();

    let mut tracked = self.update_on_edit(doc, delta);
    if !tracked {
      if let Some(last_pos) = last_pos {
        if last_pos + 1 == pos && self.allow_tracking(doc, last_pos) {
          tracked = self.start_abbreviation_tracking(doc, pos).is_some();
        }
      }
    }

    if tracked {
      let reason = self
        .registry
        .get(id)
        .and_then(|tracker| reconcile::stop_reason(tracker, pos));
      if let Some(reason) = reason {
        tracing::debug!(doc = ?id, ?reason, "abbreviation invalidated");
        self.stop_tracking(doc);
      }
    }

    self.last_pos.insert(id, pos);
  }

  /// Maps the tracker through `delta`, returning whether one is still active.
  fn update_on_edit(&mut self, doc: &mut dyn DocumentSurface, delta: &EditDelta) -> bool {
    let id = doc.id();
    if !self.registry.contains(id) {
      return false;
    }
    if delta.len_after() != doc.text().len_chars() {
      tracing::warn!(
        doc = ?id,
        expected = delta.len_after(),
        actual = doc.text().len_chars(),
        "edit does not match document, stop tracking"
      );
      self.stop_tracking(doc);
      return false;
    }

    match self.registry.update_on_edit(id, delta, doc.text(), &self.grammar) {
      Some(tracker) => {
        let region = tracker.region();
        doc.set_marker(ABBREVIATION_MARKER, region);
        true
      },
      None => {
        doc.clear_marker(ABBREVIATION_MARKER);
        false
      },
    }
  }

  pub fn on_query_context(&self, doc: &dyn DocumentSurface, key: ContextKey) -> bool {
    let tracker = self.registry.get(doc.id());
    match key {
      ContextKey::Abbreviation => {
        tracker.is_some_and(|tracker| {
          tracker.region().covers(doc.selection().span())
            && (tracker.forced() || tracker.abbreviation().is_valid())
        })
      },
      ContextKey::TabExpand => self.settings.tab_expand,
      ContextKey::HasMarker => tracker.is_some(),
      ContextKey::HasForcedMarker => tracker.is_some_and(|tracker| tracker.forced()),
    }
  }

  /// Answers the completion query that follows an `auto_complete` command.
  pub fn on_query_completions(
    &mut self,
    doc: &mut dyn DocumentSurface,
    pos: usize,
  ) -> Option<Completion> {
    if !self.pending_completions_request {
      return None;
    }
    self.pending_completions_request = false;

    let region = self.suggest_tracker(doc, pos)?.region();
    let abbr = doc.text().slice(region.range()).to_string();
    let snippet = self.expand_tracker(doc)?;
    Some(Completion {
      trigger: format!("{abbr}\tEmmet").into(),
      snippet,
    })
  }

  pub fn on_text_command(&mut self, doc: &mut dyn DocumentSurface, command: &TextCommand) {
    match command {
      TextCommand::AutoComplete if self.is_enabled() => self.pending_completions_request = true,
      TextCommand::CommitCompletion => self.stop_tracking(doc),
      _ => {},
    }
  }

  pub fn on_post_text_command(&mut self, doc: &mut dyn DocumentSurface, command: &TextCommand) {
    match command {
      TextCommand::AutoComplete => self.pending_completions_request = false,
      TextCommand::Undo => self.after_undo(doc),
      _ => {},
    }
  }

  /// Undo may bring back a marker for a tracker that was stopped, or move
  /// the marker of one still running.
  fn after_undo(&mut self, doc: &mut dyn DocumentSurface) {
    let id = doc.id();
    if let Some(tracker) = self.registry.get(id) {
      match doc.marker(ABBREVIATION_MARKER) {
        Some(marker) => {
          self.registry.resync(id, marker, doc.text(), &self.grammar);
        },
        // The undone edit predates forced mode, which only ends on request.
        None if tracker.forced() => {
          let region = tracker.region();
          if let Some(tracker) = self.registry.resync(id, region, doc.text(), &self.grammar) {
            doc.set_marker(ABBREVIATION_MARKER, tracker.region());
          }
        },
        None => self.stop_tracking(doc),
      }
    } else if let Some(tracker) = self.restore_tracker(doc) {
      tracker.show_preview();
    }
    self.last_pos.insert(id, doc.caret());
  }

  // Commands.

  /// Expands the abbreviation under the caret and stops tracking it.
  pub fn expand_abbreviation(&mut self, doc: &mut dyn DocumentSurface) {
    let caret = doc.caret();
    let Some(tracker) = self.registry.get(doc.id()) else {
      return;
    };
    if !tracker.contains(caret) {
      return;
    }

    let region = tracker.region();
    if tracker.abbreviation().is_valid() {
      if let Some(snippet) = self.expand_tracker(doc) {
        if let Err(err) = doc.replace_with_snippet(region, &snippet) {
          tracing::warn!(%err, region = %region, "failed to insert expanded abbreviation");
        }
      }
    }
    self.stop_tracking(doc);
  }

  /// Extracts the abbreviation left of the caret and shows its preview.
  pub fn extract_abbreviation(&mut self, doc: &mut dyn DocumentSurface) {
    let caret = doc.caret();
    let id = doc.id();
    if self.suggest_tracker(doc, caret).is_some() {
      if let Some(tracker) = self.registry.get_mut(id) {
        tracker.show_preview();
      }
    }
  }

  /// Toggles forced abbreviation mode on the primary selection.
  pub fn enter_abbreviation(&mut self, doc: &mut dyn DocumentSurface) {
    let was_forced = self.registry.get(doc.id()).is_some_and(|tracker| tracker.forced());
    self.stop_tracking(doc);
    if was_forced {
      return;
    }

    let selection = doc.selection().span();
    let with_context = self.settings.capture_context(doc.text().len_chars());
    let options = self.options_for(doc, selection.begin, with_context);
    let tracker = self.start_tracking(doc, selection, TrackingMode::Forced, 0, options);
    if !selection.is_empty() {
      tracker.show_preview();
      doc.set_selection(Selection::point(selection.end));
    }
    self.last_pos.insert(doc.id(), doc.caret());
  }

  pub fn clear_abbreviation_marker(&mut self, doc: &mut dyn DocumentSurface) {
    self.stop_tracking(doc);
  }
}
