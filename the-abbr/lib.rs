//! Abbreviation tracking for editor hosts.
//!
//! The crate follows a typed abbreviation from the moment the user starts it
//! until it is expanded or abandoned. A host drives
//! [`service::AbbreviationService`] with editor events; the service keeps one
//! [`tracker::RegionTracker`] per document, maps its span through edits and
//! revalidates the text against a [`grammar::Grammar`].
//!
//! # Example
//!
//! ```ignore
//! use the_abbr::{
//!   config::Settings,
//!   document::MemoryDocument,
//!   event::EditorEvent,
//!   service::AbbreviationService,
//! };
//!
//! let mut service = AbbreviationService::new(grammar, syntax, Settings::default());
//! let mut doc = MemoryDocument::new(id, "");
//!
//! let delta = doc.type_char('d')?;
//! service.dispatch(&mut doc, EditorEvent::Modified(delta));
//! assert!(service.get(doc.id()).is_some());
//! ```

use smartstring::{
  LazyCompact,
  SmartString,
};

pub mod config;
pub mod document;
pub mod edit;
pub mod event;
pub mod grammar;
pub mod heuristic;
pub mod reconcile;
pub mod registry;
pub mod service;
pub mod span;
pub mod syntax;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tracker;

pub type Tendril = SmartString<LazyCompact>;

/// Name of the persisted document marker that remembers the tracked span.
pub const ABBREVIATION_MARKER: &str = "emmet-abbreviation";
