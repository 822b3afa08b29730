//! Editor-side seams: the surface being synced and the host's collaborators.

use async_trait::async_trait;
use duplex_primitives::{Eol, PatchOp, Position, Selection, TextRange};
use duplex_rpc::BufferId;
use serde::{Deserialize, Serialize};

use crate::error::EditError;
use crate::ids::{DocumentId, Version, ViewId};

/// One replaced range within an editor change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChange {
	/// Replaced range, in the pre-change document.
	pub range: TextRange,
	/// Replacement text.
	pub text: String,
	/// Length of the replaced text in editor units.
	pub range_length: usize,
}

/// An editor document mutation, as observed after it happened.
///
/// All `changes` refer to the document before the event and do not overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
	/// Changed document.
	pub document: DocumentId,
	/// Document version after the change.
	pub version: Version,
	/// Line terminator of the document.
	pub eol: Eol,
	/// Full text after the change.
	pub text: String,
	/// Replaced ranges.
	pub changes: Vec<ContentChange>,
}

/// Undo grouping for a batched edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditOptions {
	/// Insert an undo stop before the edit.
	pub undo_stop_before: bool,
	/// Insert an undo stop after the edit.
	pub undo_stop_after: bool,
}

impl EditOptions {
	/// Merge into the surrounding undo step.
	pub const MERGE_UNDO: Self = Self {
		undo_stop_before: false,
		undo_stop_after: false,
	};
}

/// Live state of an editor document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentState {
	/// Current text.
	pub text: String,
	/// Line terminator.
	pub eol: Eol,
	/// Current version.
	pub version: Version,
}

/// The rich editor whose documents are mirrored into the engine.
#[async_trait]
pub trait EditorSurface: Send + Sync {
	/// Live state of `doc`, or `None` once it is closed.
	fn document(&self, doc: DocumentId) -> Option<DocumentState>;

	/// A view currently showing `doc`.
	fn visible_view(&self, doc: DocumentId) -> Option<ViewId>;

	/// Primary selection of `view`.
	fn selection(&self, view: ViewId) -> Option<Selection>;

	/// Replaces the selections of `view` with `selection`.
	fn set_selection(&self, view: ViewId, selection: Selection);

	/// Applies `edits` (all relative to the current text, in order) as one transaction.
	async fn apply_edits(&self, view: ViewId, edits: Vec<PatchOp>, options: EditOptions) -> Result<(), EditError>;

	/// Shows a non-blocking progress indicator.
	fn show_progress(&self, _title: &str) {}

	/// Hides the progress indicator.
	fn hide_progress(&self) {}
}

/// Host services the sync core relies on but does not own.
pub trait Collaborators: Send + Sync {
	/// Document mirrored by an engine buffer.
	fn document_for_buffer(&self, buffer: BufferId) -> Option<DocumentId>;

	/// Engine buffer mirroring a document.
	fn buffer_for_document(&self, doc: DocumentId) -> Option<BufferId>;

	/// Whether the engine is in insert mode.
	fn is_insert_mode(&self) -> bool;

	/// Cursor explicitly reported by the engine for `doc`, if one is pending.
	fn engine_cursor(&self, _doc: DocumentId) -> Option<Position> {
		None
	}
}
