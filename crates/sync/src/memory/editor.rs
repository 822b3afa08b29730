//! In-memory editor surface.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use duplex_primitives::{Eol, OffsetEncoding, PatchOp, Position, Selection, TextRange, apply_patch};
use parking_lot::Mutex;

use crate::error::EditError;
use crate::ids::{DocumentId, Version, ViewId};
use crate::surface::{ChangeEvent, ContentChange, DocumentState, EditOptions, EditorSurface};

/// Progress indicator transitions seen by a [`MemoryEditor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
	/// Indicator shown with a title.
	Shown(String),
	/// Indicator hidden.
	Hidden,
}

#[derive(Debug)]
struct MemoryDocument {
	text: String,
	eol: Eol,
	version: Version,
	view: Option<ViewId>,
	selection: Selection,
}

#[derive(Debug, Default)]
struct EditorInner {
	documents: HashMap<DocumentId, MemoryDocument>,
	views: HashMap<ViewId, DocumentId>,
	next_view: u64,
	outbox: Vec<ChangeEvent>,
	undo_options: Vec<EditOptions>,
	reject_next: bool,
	select_after_edit: Option<Selection>,
	edit_delay: Option<Duration>,
	progress: Vec<ProgressEvent>,
}

/// Editor surface backed by plain strings.
///
/// Edits applied through [`EditorSurface::apply_edits`] produce change events
/// the way a real editor would; collect them with
/// [`take_events`](Self::take_events) and feed them back to the sync core.
#[derive(Debug)]
pub struct MemoryEditor {
	encoding: OffsetEncoding,
	inner: Mutex<EditorInner>,
}

impl MemoryEditor {
	/// Creates an editor measuring columns in `encoding`.
	pub fn new(encoding: OffsetEncoding) -> Self {
		Self {
			encoding,
			inner: Mutex::new(EditorInner::default()),
		}
	}

	/// Opens `doc` in a new visible view.
	pub fn open(&self, doc: DocumentId, text: impl Into<String>, eol: Eol) -> ViewId {
		let mut inner = self.inner.lock();
		inner.next_view += 1;
		let view = ViewId(inner.next_view);
		inner.views.insert(view, doc);
		inner.documents.insert(
			doc,
			MemoryDocument {
				text: text.into(),
				eol,
				version: 1,
				view: Some(view),
				selection: Selection::default(),
			},
		);
		view
	}

	/// Hides every view of `doc`; the document stays open.
	pub fn hide(&self, doc: DocumentId) {
		let mut inner = self.inner.lock();
		if let Some(view) = inner.documents.get_mut(&doc).and_then(|d| d.view.take()) {
			inner.views.remove(&view);
		}
	}

	/// Closes `doc`.
	pub fn close(&self, doc: DocumentId) {
		self.hide(doc);
		self.inner.lock().documents.remove(&doc);
	}

	/// Current text of `doc`.
	pub fn text(&self, doc: DocumentId) -> Option<String> {
		self.inner.lock().documents.get(&doc).map(|d| d.text.clone())
	}

	/// Line terminator of `doc`.
	pub fn eol(&self, doc: DocumentId) -> Option<Eol> {
		self.inner.lock().documents.get(&doc).map(|d| d.eol)
	}

	/// Current version of `doc`.
	pub fn version(&self, doc: DocumentId) -> Option<Version> {
		self.inner.lock().documents.get(&doc).map(|d| d.version)
	}

	/// Primary selection of `doc`.
	pub fn selection_of(&self, doc: DocumentId) -> Option<Selection> {
		self.inner.lock().documents.get(&doc).map(|d| d.selection)
	}

	/// Moves the cursor of `doc`.
	pub fn set_cursor(&self, doc: DocumentId, pos: Position) {
		if let Some(document) = self.inner.lock().documents.get_mut(&doc) {
			document.selection = Selection::cursor(pos);
		}
	}

	/// Simulates the user replacing `range` with `text`.
	///
	/// The cursor lands after the inserted text. Returns the resulting change
	/// event for the caller to forward; it is not queued in the outbox.
	pub fn user_edit(&self, doc: DocumentId, range: TextRange, text: &str) -> Option<ChangeEvent> {
		let event = self.user_edits(doc, &[(range, text)])?;
		self.set_cursor(doc, end_of_insert(range.start, text, event.eol, self.encoding));
		Some(event)
	}

	/// Simulates a multi-cursor edit producing one change event.
	///
	/// Every range refers to the text before the edit; ranges must not overlap.
	/// The selection is left as is.
	pub fn user_edits(&self, doc: DocumentId, edits: &[(TextRange, &str)]) -> Option<ChangeEvent> {
		let mut inner = self.inner.lock();
		let document = inner.documents.get_mut(&doc)?;
		let changes = edits
			.iter()
			.map(|&(range, text)| content_change(&document.text, document.eol, self.encoding, range, text))
			.collect();
		let mut ops: Vec<PatchOp> = edits
			.iter()
			.map(|&(range, text)| PatchOp::Replace {
				range,
				text: text.to_string(),
			})
			.collect();
		ops.sort_by_key(|op| op.range().start);
		document.text = apply_patch(&document.text, &ops, document.eol, self.encoding);
		document.version += 1;
		Some(ChangeEvent {
			document: doc,
			version: document.version,
			eol: document.eol,
			text: document.text.clone(),
			changes,
		})
	}

	/// Makes the next [`apply_edits`](EditorSurface::apply_edits) fail with
	/// [`EditError::Rejected`].
	pub fn reject_next_edit(&self) {
		self.inner.lock().reject_next = true;
	}

	/// Leaves `selection` behind after the next applied edit.
	pub fn select_after_next_edit(&self, selection: Selection) {
		self.inner.lock().select_after_edit = Some(selection);
	}

	/// Delays every applied edit by `delay`.
	pub fn set_edit_delay(&self, delay: Option<Duration>) {
		self.inner.lock().edit_delay = delay;
	}

	/// Drains change events produced by applied edits.
	pub fn take_events(&self) -> Vec<ChangeEvent> {
		std::mem::take(&mut self.inner.lock().outbox)
	}

	/// Undo options of every applied edit so far.
	pub fn undo_options(&self) -> Vec<EditOptions> {
		self.inner.lock().undo_options.clone()
	}

	/// Progress indicator transitions so far.
	pub fn progress(&self) -> Vec<ProgressEvent> {
		self.inner.lock().progress.clone()
	}
}

#[async_trait]
impl EditorSurface for MemoryEditor {
	fn document(&self, doc: DocumentId) -> Option<DocumentState> {
		self.inner.lock().documents.get(&doc).map(|d| DocumentState {
			text: d.text.clone(),
			eol: d.eol,
			version: d.version,
		})
	}

	fn visible_view(&self, doc: DocumentId) -> Option<ViewId> {
		self.inner.lock().documents.get(&doc).and_then(|d| d.view)
	}

	fn selection(&self, view: ViewId) -> Option<Selection> {
		let inner = self.inner.lock();
		let doc = inner.views.get(&view)?;
		inner.documents.get(doc).map(|d| d.selection)
	}

	fn set_selection(&self, view: ViewId, selection: Selection) {
		let mut inner = self.inner.lock();
		let Some(&doc) = inner.views.get(&view) else {
			return;
		};
		if let Some(document) = inner.documents.get_mut(&doc) {
			document.selection = Selection {
				anchor: clamp(&document.text, document.eol, self.encoding, selection.anchor),
				active: clamp(&document.text, document.eol, self.encoding, selection.active),
			};
		}
	}

	async fn apply_edits(&self, view: ViewId, edits: Vec<PatchOp>, options: EditOptions) -> Result<(), EditError> {
		let delay = self.inner.lock().edit_delay;
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}

		let mut inner = self.inner.lock();
		if std::mem::take(&mut inner.reject_next) {
			return Err(EditError::Rejected);
		}
		let doc = *inner
			.views
			.get(&view)
			.ok_or_else(|| EditError::Failed(format!("unknown view {}", view.0)))?;
		let select_after = inner.select_after_edit.take();
		let encoding = self.encoding;
		let document = inner
			.documents
			.get_mut(&doc)
			.ok_or_else(|| EditError::Failed(format!("{doc} is closed")))?;

		let changes = edits
			.iter()
			.map(|op| content_change(&document.text, document.eol, encoding, op.range(), op.text()))
			.collect();
		document.text = apply_patch(&document.text, &edits, document.eol, encoding);
		document.version += 1;
		let selection = select_after.unwrap_or(document.selection);
		document.selection = Selection {
			anchor: clamp(&document.text, document.eol, encoding, selection.anchor),
			active: clamp(&document.text, document.eol, encoding, selection.active),
		};

		let event = ChangeEvent {
			document: doc,
			version: document.version,
			eol: document.eol,
			text: document.text.clone(),
			changes,
		};
		inner.outbox.push(event);
		inner.undo_options.push(options);
		Ok(())
	}

	fn show_progress(&self, title: &str) {
		self.inner.lock().progress.push(ProgressEvent::Shown(title.to_string()));
	}

	fn hide_progress(&self) {
		self.inner.lock().progress.push(ProgressEvent::Hidden);
	}
}

/// Byte offset of `pos` in `text`, clamped to the line.
fn byte_offset(text: &str, eol: Eol, encoding: OffsetEncoding, pos: Position) -> usize {
	let mut offset = 0;
	for (idx, line) in eol.split(text).into_iter().enumerate() {
		if idx == pos.line {
			return offset + encoding.byte_offset(line, pos.character);
		}
		offset += line.len() + eol.as_str().len();
	}
	text.len()
}

fn content_change(text: &str, eol: Eol, encoding: OffsetEncoding, range: TextRange, new_text: &str) -> ContentChange {
	let start = byte_offset(text, eol, encoding, range.start);
	let end = byte_offset(text, eol, encoding, range.end).max(start);
	ContentChange {
		range,
		text: new_text.to_string(),
		range_length: encoding.measure(&text[start..end]),
	}
}

fn end_of_insert(start: Position, text: &str, eol: Eol, encoding: OffsetEncoding) -> Position {
	let segments = eol.split(text);
	let last = segments.last().copied().unwrap_or("");
	match segments.len() {
		0 | 1 => Position::new(start.line, start.character + encoding.measure(last)),
		n => Position::new(start.line + n - 1, encoding.measure(last)),
	}
}

fn clamp(text: &str, eol: Eol, encoding: OffsetEncoding, pos: Position) -> Position {
	let lines = eol.split(text);
	let line = pos.line.min(lines.len().saturating_sub(1));
	let width = lines.get(line).map_or(0, |l| encoding.measure(l));
	Position::new(line, pos.character.min(width))
}
