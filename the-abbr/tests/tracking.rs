use std::num::NonZeroUsize;

use the_abbr::{
  ABBREVIATION_MARKER,
  config::Settings,
  document::{
    DocumentId,
    DocumentSurface,
    MemoryDocument,
  },
  event::{
    Command,
    Completion,
    ContextKey,
    EditorEvent,
    Preview,
    Reply,
    TextCommand,
  },
  service::AbbreviationService,
  span::Span,
  syntax::FixedSyntax,
  testing::TagGrammar,
};

fn doc_id(id: usize) -> DocumentId {
  DocumentId::new(NonZeroUsize::new(id).unwrap())
}

/// A host editor reporting every change to the service the way a real one
/// would: the modification first, then the caret move.
struct Editor {
  service: AbbreviationService<TagGrammar, FixedSyntax>,
  doc:     MemoryDocument,
}

impl Editor {
  fn new(syntax: &str, text: &str) -> Self {
    Self::with(FixedSyntax::new(syntax), Settings::default(), text)
  }

  fn with(syntax: FixedSyntax, settings: Settings, text: &str) -> Self {
    let mut doc = MemoryDocument::new(doc_id(1), text);
    doc.move_to(doc.len_chars()).unwrap();
    let mut service = AbbreviationService::new(TagGrammar, syntax, settings);
    service.dispatch(&mut doc, EditorEvent::Activated);
    Self { service, doc }
  }

  fn send(&mut self, event: EditorEvent) -> Reply {
    self.service.dispatch(&mut self.doc, event)
  }

  fn type_text(&mut self, text: &str) {
    for ch in text.chars() {
      let delta = self.doc.type_char(ch).unwrap();
      self.send(EditorEvent::Modified(delta));
      self.send(EditorEvent::SelectionModified);
    }
  }

  fn backspace(&mut self) {
    let delta = self.doc.backspace().unwrap();
    self.send(EditorEvent::Modified(delta));
    self.send(EditorEvent::SelectionModified);
  }

  fn move_to(&mut self, pos: usize) {
    self.doc.move_to(pos).unwrap();
    self.send(EditorEvent::SelectionModified);
  }

  fn select(&mut self, anchor: usize, head: usize) {
    self.doc.select(anchor, head).unwrap();
    self.send(EditorEvent::SelectionModified);
  }

  fn command(&mut self, command: Command) {
    self.send(EditorEvent::Command(command));
    for delta in self.doc.take_pending_edits() {
      self.send(EditorEvent::Modified(delta));
    }
    self.send(EditorEvent::SelectionModified);
  }

  fn undo(&mut self) {
    self.send(EditorEvent::TextCommand(TextCommand::Undo));
    assert!(self.doc.undo());
    self.send(EditorEvent::PostTextCommand(TextCommand::Undo));
  }

  fn query(&mut self, key: ContextKey) -> bool {
    match self.send(EditorEvent::QueryContext(key)) {
      Reply::Context(value) => value,
      reply => panic!("unexpected reply {reply:?}"),
    }
  }

  fn region(&self) -> Option<Span> {
    self.service.get(self.doc.id()).map(|tracker| tracker.region())
  }

  fn abbr(&self) -> Option<String> {
    let tracker = self.service.get(self.doc.id())?;
    tracker.abbreviation().abbr().map(str::to_string)
  }

  fn preview(&self) -> Option<Preview> {
    self.service.preview(self.doc.id())
  }

  fn text(&self) -> String {
    self.doc.text().to_string()
  }
}

#[test]
fn typing_at_start_of_text_tracks() {
  let mut editor = Editor::new("html", "");
  editor.type_text("d");
  assert_eq!(editor.region(), Some(Span::new(0, 1)));
  assert_eq!(editor.doc.marker(ABBREVIATION_MARKER), Some(Span::new(0, 1)));

  editor.type_text("iv");
  assert_eq!(editor.region(), Some(Span::new(0, 3)));
  assert_eq!(editor.abbr().as_deref(), Some("div"));
  assert_eq!(
    editor.preview(),
    Some(Preview::Expansion("<div>${1}</div>".into()))
  );
}

#[test]
fn typing_mid_word_does_not_track() {
  let mut editor = Editor::new("html", "foo");
  editor.type_text("d");
  assert_eq!(editor.region(), None);

  let mut editor = Editor::new("html", "<p>");
  editor.type_text("d");
  assert_eq!(editor.region(), Some(Span::new(3, 4)));
}

#[test]
fn opener_swallows_auto_inserted_closer() {
  let mut editor = Editor::new("html", "x ");
  editor.type_text("[");
  assert_eq!(editor.text(), "x []");
  assert_eq!(editor.region(), Some(Span::new(2, 4)));

  editor.type_text("title");
  assert_eq!(editor.region(), Some(Span::new(2, 9)));
  assert_eq!(editor.abbr().as_deref(), Some("[title]"));

  // typing over the auto-inserted closer keeps the region
  editor.type_text("]");
  assert_eq!(editor.text(), "x [title]");
  assert_eq!(editor.region(), Some(Span::new(2, 9)));
}

#[test]
fn invalid_trailing_character_stops() {
  let mut editor = Editor::new("html", "");
  editor.type_text("div+");
  assert_eq!(editor.region(), None);
  assert_eq!(editor.doc.marker(ABBREVIATION_MARKER), None);
}

#[test]
fn invalid_character_before_closers_stops() {
  let mut editor = Editor::new("html", "");
  editor.type_text("a[x");
  assert_eq!(editor.text(), "a[x]");
  assert_eq!(editor.region(), Some(Span::new(0, 4)));

  // `(` pairs into `a[x()]`, invalid right before the closer run
  editor.type_text("(");
  assert_eq!(editor.text(), "a[x()]");
  assert_eq!(editor.region(), None);
}

#[test]
fn line_break_stops() {
  let mut editor = Editor::new("html", "");
  editor.type_text("div\n");
  assert_eq!(editor.region(), None);
}

#[test]
fn deleting_everything_stops() {
  let mut editor = Editor::new("html", "");
  editor.type_text("d");
  editor.backspace();
  assert_eq!(editor.text(), "");
  assert_eq!(editor.region(), None);
  assert_eq!(editor.doc.marker(ABBREVIATION_MARKER), None);
}

#[test]
fn caret_moves_toggle_preview() {
  let mut editor = Editor::new("html", "x ");
  editor.type_text("ul");
  assert!(editor.preview().is_some());

  editor.move_to(0);
  assert_eq!(editor.preview(), None);
  assert_eq!(editor.region(), Some(Span::new(2, 4)));

  // the end of the region still counts as inside
  editor.move_to(4);
  assert!(editor.preview().is_some());
}

#[test]
fn jsx_requires_prefix_marker() {
  let settings = Settings {
    jsx_prefix: "/".into(),
    ..Settings::default()
  };
  let mut editor = Editor::with(FixedSyntax::new("jsx"), settings, "    ret ");
  editor.type_text("/");
  assert_eq!(editor.region(), None);
  editor.type_text("d");
  assert_eq!(editor.region(), Some(Span::new(8, 10)));
  assert_eq!(editor.abbr().as_deref(), Some("d"));

  let tracker = editor.service.get(editor.doc.id()).unwrap();
  assert_eq!(tracker.offset(), 1);
  assert_eq!(tracker.options().prefix.as_deref(), Some("/"));

  let mut editor = Editor::new("jsx", "return ");
  editor.type_text("d");
  assert_eq!(editor.region(), None);
}

#[test]
fn forced_tracker_survives_invalid_edits() {
  let mut editor = Editor::new("html", "hello world");
  editor.select(0, 5);
  editor.command(Command::EnterAbbreviation);

  assert_eq!(editor.region(), Some(Span::new(0, 5)));
  assert_eq!(editor.doc.caret(), 5);
  assert!(editor.doc.selection().is_empty());
  assert!(editor.preview().is_some());
  assert!(editor.query(ContextKey::HasForcedMarker));

  editor.type_text(" +\n");
  assert_eq!(editor.region(), Some(Span::new(0, 8)));
  assert!(editor.abbr().is_some());
  editor.backspace();
  editor.backspace();
  editor.backspace();
  assert_eq!(editor.region(), Some(Span::new(0, 5)));

  editor.move_to(11);
  assert_eq!(editor.preview(), None);
  assert!(editor.query(ContextKey::HasMarker));

  // a second invocation toggles forced mode off
  editor.command(Command::EnterAbbreviation);
  assert_eq!(editor.region(), None);
  assert!(!editor.query(ContextKey::HasMarker));
}

#[test]
fn forced_tracker_on_empty_selection_expands() {
  let mut editor = Editor::new("html", "x ");
  editor.command(Command::EnterAbbreviation);
  assert_eq!(editor.region(), Some(Span::point(2)));

  // `>` would stop an auto tracker
  editor.type_text("ul>li");
  assert_eq!(editor.region(), Some(Span::new(2, 7)));
  assert!(editor.query(ContextKey::Abbreviation));

  editor.command(Command::ExpandAbbreviation);
  assert_eq!(editor.text(), "x <ul><li></li></ul>");
  assert_eq!(editor.doc.caret(), 2 + "<ul><li>".len());
  assert_eq!(editor.region(), None);
  assert_eq!(editor.doc.marker(ABBREVIATION_MARKER), None);
}

#[test]
fn expansion_captures_context_lazily() {
  let mut editor = Editor::new("html", "<ul>");
  editor.type_text(".x");
  let tracker = editor.service.get(editor.doc.id()).unwrap();
  assert_eq!(tracker.options().context, None);

  editor.command(Command::ExpandAbbreviation);
  assert_eq!(editor.text(), "<ul><li class=\"x\"></li>");
}

#[test]
fn typing_captures_context_in_small_documents() {
  let settings = Settings {
    context_size_limit: 100,
    ..Settings::default()
  };
  let mut editor = Editor::with(FixedSyntax::new("html"), settings, "<ul>");
  editor.type_text(".x");
  let tracker = editor.service.get(editor.doc.id()).unwrap();
  let context = tracker.options().context.as_ref().map(|context| context.name.as_str());
  assert_eq!(context, Some("ul"));
}

#[test]
fn typing_skips_context_at_size_limit() {
  let settings = Settings {
    context_size_limit: 3,
    ..Settings::default()
  };
  let mut editor = Editor::with(FixedSyntax::new("html"), settings, "<ul>");
  editor.type_text(".x");
  let tracker = editor.service.get(editor.doc.id()).unwrap();
  assert_eq!(tracker.options().context, None);
}

#[test]
fn expand_outside_region_does_nothing() {
  let mut editor = Editor::new("html", "x ");
  editor.type_text("div");
  editor.move_to(0);
  editor.command(Command::ExpandAbbreviation);
  assert_eq!(editor.text(), "x div");
  assert_eq!(editor.region(), Some(Span::new(2, 5)));
}

#[test]
fn undo_restores_stopped_tracker() {
  let mut editor = Editor::new("html", "");
  editor.type_text("div+");
  assert_eq!(editor.region(), None);

  editor.undo();
  assert_eq!(editor.text(), "div");
  assert_eq!(editor.region(), Some(Span::new(0, 3)));
  assert_eq!(
    editor.preview(),
    Some(Preview::Expansion("<div>${1}</div>".into()))
  );
}

#[test]
fn undo_resyncs_active_tracker() {
  let mut editor = Editor::new("html", "");
  editor.type_text("ul.a");
  editor.undo();
  assert_eq!(editor.text(), "ul.");
  assert_eq!(editor.region(), Some(Span::new(0, 3)));
  assert_eq!(editor.abbr().as_deref(), Some("ul."));
}

#[test]
fn undo_keeps_forced_tracker() {
  let mut editor = Editor::new("html", "hello world");
  editor.type_text("!");
  editor.select(0, 5);
  editor.command(Command::EnterAbbreviation);
  assert_eq!(editor.region(), Some(Span::new(0, 5)));

  // the restored snapshot predates the marker
  editor.undo();
  assert_eq!(editor.text(), "hello world");
  assert_eq!(editor.region(), Some(Span::new(0, 5)));
  assert_eq!(editor.abbr().as_deref(), Some("hello"));
  assert_eq!(editor.doc.marker(ABBREVIATION_MARKER), Some(Span::new(0, 5)));
  assert!(editor.query(ContextKey::HasForcedMarker));
}

#[test]
fn completions_follow_auto_complete() {
  let mut editor = Editor::new("html", "x ul");

  // not armed yet
  let reply = editor.send(EditorEvent::QueryCompletions { pos: 4 });
  assert_eq!(reply, Reply::Completions(None));

  editor.send(EditorEvent::TextCommand(TextCommand::AutoComplete));
  let reply = editor.send(EditorEvent::QueryCompletions { pos: 4 });
  assert_eq!(
    reply,
    Reply::Completions(Some(Completion {
      trigger: "ul\tEmmet".into(),
      snippet: "<ul>${1}</ul>".into(),
    }))
  );
  editor.send(EditorEvent::PostTextCommand(TextCommand::AutoComplete));
  assert_eq!(editor.region(), Some(Span::new(2, 4)));
  assert!(editor.query(ContextKey::Abbreviation));

  editor.send(EditorEvent::TextCommand(TextCommand::CommitCompletion));
  assert_eq!(editor.region(), None);
}

#[test]
fn extract_shows_preview() {
  let mut editor = Editor::new("html", "<p>a.b");
  editor.command(Command::ExtractAbbreviation);
  assert_eq!(editor.region(), Some(Span::new(3, 6)));
  assert_eq!(
    editor.preview(),
    Some(Preview::Expansion("<a class=\"b\">${1}</a>".into()))
  );

  editor.command(Command::ClearAbbreviationMarker);
  assert_eq!(editor.region(), None);
}

#[test]
fn invalid_preview_reports_error() {
  let mut editor = Editor::new("html", "");
  editor.command(Command::EnterAbbreviation);
  editor.type_text("a b");
  match editor.preview() {
    Some(Preview::Error(err)) => assert_eq!(err.pos, 1),
    other => panic!("expected an error preview, got {other:?}"),
  }
  assert!(editor.query(ContextKey::Abbreviation));
}

#[test]
fn query_context_keys() {
  let mut editor = Editor::new("html", "");
  assert!(!editor.query(ContextKey::Abbreviation));
  assert!(!editor.query(ContextKey::TabExpand));
  assert!(!editor.query(ContextKey::HasMarker));

  editor.type_text("p");
  assert!(editor.query(ContextKey::Abbreviation));
  assert!(editor.query(ContextKey::HasMarker));
  assert!(!editor.query(ContextKey::HasForcedMarker));

  editor.service.set_settings(Settings {
    tab_expand: true,
    ..Settings::default()
  });
  assert!(editor.query(ContextKey::TabExpand));
}

#[test]
fn disabled_tracking() {
  let settings = Settings {
    auto_mark: false,
    ..Settings::default()
  };
  let mut editor = Editor::with(FixedSyntax::new("html"), settings, "");
  editor.type_text("div");
  assert_eq!(editor.region(), None);

  let syntax = FixedSyntax::new("html").with_activation(false);
  let mut editor = Editor::with(syntax, Settings::default(), "");
  editor.type_text("div");
  assert_eq!(editor.region(), None);
}

#[test]
fn widgets_are_ignored() {
  let mut service = AbbreviationService::new(TagGrammar, FixedSyntax::new("html"), Settings::default());
  let mut widget = MemoryDocument::new(doc_id(7), "").with_widget(true);
  service.dispatch(&mut widget, EditorEvent::Activated);
  let delta = widget.type_char('d').unwrap();
  service.dispatch(&mut widget, EditorEvent::Modified(delta));
  assert!(service.get(widget.id()).is_none());
}

#[test]
fn close_and_shutdown_clear_trackers() {
  let mut service = AbbreviationService::new(TagGrammar, FixedSyntax::new("html"), Settings::default());
  let mut docs: Vec<MemoryDocument> = (1..=3)
    .map(|id| MemoryDocument::new(doc_id(id), ""))
    .collect();
  for doc in &mut docs {
    service.dispatch(doc, EditorEvent::Activated);
    let delta = doc.type_char('p').unwrap();
    service.dispatch(doc, EditorEvent::Modified(delta));
  }
  assert_eq!(service.registry().len(), 3);

  service.dispatch(&mut docs[0], EditorEvent::Close);
  assert!(service.get(doc_id(1)).is_none());
  assert_eq!(docs[0].marker(ABBREVIATION_MARKER), None);
  assert_eq!(service.registry().len(), 2);

  service.shutdown(docs.iter_mut().map(|doc| doc as &mut dyn DocumentSurface));
  assert!(service.registry().is_empty());
  assert!(
    docs
      .iter()
      .all(|doc| doc.marker(ABBREVIATION_MARKER).is_none())
  );
}

#[test]
fn documents_track_independently() {
  let mut service = AbbreviationService::new(TagGrammar, FixedSyntax::new("html"), Settings::default());
  let mut first = MemoryDocument::new(doc_id(1), "");
  let mut second = MemoryDocument::new(doc_id(2), "");
  for doc in [&mut first, &mut second] {
    service.dispatch(doc, EditorEvent::Activated);
    let delta = doc.type_char('b').unwrap();
    service.dispatch(doc, EditorEvent::Modified(delta));
  }

  let delta = first.type_char('+').unwrap();
  service.dispatch(&mut first, EditorEvent::Modified(delta));
  assert!(service.get(first.id()).is_none());
  assert_eq!(
    service.get(second.id()).map(|tracker| tracker.region()),
    Some(Span::new(0, 1))
  );
}
