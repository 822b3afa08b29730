//! In-memory editor, engine and host wiring.
//!
//! Used by the integration tests and the replay tool. Nothing here talks to a
//! real process: the engine interprets calls against line vectors and the
//! editor keeps plain strings.

mod editor;
mod engine;

use std::collections::HashMap;
use std::sync::Arc;

use duplex_primitives::{Eol, Position, TextRange};
use duplex_rpc::BufferId;
pub use editor::{MemoryEditor, ProgressEvent};
pub use engine::MemoryEngine;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::applier::Acceptance;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::ids::DocumentId;
use crate::ingest::IngestOutcome;
use crate::surface::Collaborators;
use crate::sync::DocumentSync;

#[derive(Debug, Default)]
struct Links {
	by_buffer: HashMap<BufferId, DocumentId>,
	by_doc: HashMap<DocumentId, BufferId>,
	insert_mode: bool,
	engine_cursors: HashMap<DocumentId, Position>,
}

/// Buffer ↔ document links and engine mode, set by hand.
#[derive(Debug, Default)]
pub struct MemoryCollaborators {
	inner: Mutex<Links>,
}

impl MemoryCollaborators {
	/// Creates an empty link table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Links `doc` to `buffer`.
	pub fn link(&self, doc: DocumentId, buffer: BufferId) {
		let mut inner = self.inner.lock();
		inner.by_buffer.insert(buffer, doc);
		inner.by_doc.insert(doc, buffer);
	}

	/// Removes the link of `doc`.
	pub fn unlink(&self, doc: DocumentId) {
		let mut inner = self.inner.lock();
		if let Some(buffer) = inner.by_doc.remove(&doc) {
			inner.by_buffer.remove(&buffer);
		}
	}

	/// Switches the engine's insert mode.
	pub fn set_insert_mode(&self, on: bool) {
		self.inner.lock().insert_mode = on;
	}

	/// Reports an engine cursor for `doc`, consumed by the next remote apply.
	pub fn report_engine_cursor(&self, doc: DocumentId, cursor: Position) {
		self.inner.lock().engine_cursors.insert(doc, cursor);
	}
}

impl Collaborators for MemoryCollaborators {
	fn document_for_buffer(&self, buffer: BufferId) -> Option<DocumentId> {
		self.inner.lock().by_buffer.get(&buffer).copied()
	}

	fn buffer_for_document(&self, doc: DocumentId) -> Option<BufferId> {
		self.inner.lock().by_doc.get(&doc).copied()
	}

	fn is_insert_mode(&self) -> bool {
		self.inner.lock().insert_mode
	}

	fn engine_cursor(&self, doc: DocumentId) -> Option<Position> {
		self.inner.lock().engine_cursors.remove(&doc)
	}
}

/// Rounds of event shuttling before [`MemoryHarness::pump`] gives up.
const PUMP_LIMIT: usize = 32;

/// One document open in a [`MemoryEditor`] and mirrored in a [`MemoryEngine`].
#[derive(Debug)]
pub struct MemoryHarness {
	/// Editor side.
	pub editor: Arc<MemoryEditor>,
	/// Engine side.
	pub engine: Arc<MemoryEngine>,
	/// Links and mode.
	pub collaborators: Arc<MemoryCollaborators>,
	/// Sync core under test.
	pub sync: DocumentSync,
	/// The mirrored document.
	pub doc: DocumentId,
	/// The engine buffer mirroring [`doc`](Self::doc).
	pub buffer: BufferId,
}

impl MemoryHarness {
	/// Opens `text` on both sides and starts tracking it.
	pub fn new(config: SyncConfig, text: &str, eol: Eol) -> Self {
		let editor = Arc::new(MemoryEditor::new(config.encoding));
		let engine = Arc::new(MemoryEngine::new());
		let collaborators = Arc::new(MemoryCollaborators::new());

		let doc = DocumentId::next();
		editor.open(doc, text, eol);
		let buffer = engine.add_buffer(text, eol);
		collaborators.link(doc, buffer);

		let sync = DocumentSync::new(config, editor.clone(), engine.clone(), collaborators.clone());
		sync.open_document(doc, text, eol);
		Self {
			editor,
			engine,
			collaborators,
			sync,
			doc,
			buffer,
		}
	}

	/// Types `text` over `range` in the editor and forwards the change to the sync core.
	pub async fn editor_edit(&self, range: TextRange, text: &str) -> Result<Option<IngestOutcome>> {
		match self.editor.user_edit(self.doc, range, text) {
			Some(event) => self.sync.on_editor_change(event).await.map(Some),
			None => Ok(None),
		}
	}

	/// Applies several edits as one editor change event and forwards it.
	pub async fn editor_edits(&self, edits: &[(TextRange, &str)]) -> Result<Option<IngestOutcome>> {
		match self.editor.user_edits(self.doc, edits) {
			Some(event) => self.sync.on_editor_change(event).await.map(Some),
			None => Ok(None),
		}
	}

	/// Replaces engine lines `[first, last)` with `lines`.
	pub fn engine_edit(&self, first: usize, last: usize, lines: Vec<String>) -> bool {
		self.engine.edit_lines(self.buffer, first, last, lines).is_some()
	}

	/// Switches the engine's insert mode.
	pub fn set_insert_mode(&self, on: bool) {
		self.collaborators.set_insert_mode(on);
	}

	/// Shuttles events both ways until neither side has anything left.
	///
	/// Returns the number of rounds run.
	pub async fn pump(&self) -> Result<usize> {
		for round in 0..PUMP_LIMIT {
			let queued = self
				.engine
				.take_notifications()
				.into_iter()
				.map(|event| self.sync.enqueue_engine_lines(event))
				.filter(Acceptance::is_queued)
				.count();
			if queued > 0 {
				self.sync.flush_remote().await;
			}

			let events = self.editor.take_events();
			let local = events.len();
			for event in events {
				self.sync.on_editor_change(event).await?;
			}

			if queued == 0 && local == 0 && self.engine.pending_notifications() == 0 {
				debug!(rounds = round, "memory.pump.settled");
				return Ok(round);
			}
		}
		warn!(limit = PUMP_LIMIT, "memory.pump.limit");
		Ok(PUMP_LIMIT)
	}

	/// Editor text of the document.
	pub fn editor_text(&self) -> String {
		self.editor.text(self.doc).unwrap_or_default()
	}

	/// Engine text of the buffer, joined with the document's line terminator.
	pub fn engine_text(&self) -> String {
		let eol = self.editor.eol(self.doc).unwrap_or_default();
		self.engine.text(self.buffer, eol).unwrap_or_default()
	}

	/// Returns `true` when both sides hold the same text.
	pub fn is_converged(&self) -> bool {
		self.editor_text() == self.engine_text()
	}
}
