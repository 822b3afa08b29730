//! Tracked documents and their last-known engine content.

use std::collections::HashMap;

use duplex_primitives::Eol;
use slab::Slab;

use crate::ids::DocumentId;

/// Per-document sync state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
	/// Owning document.
	pub id: DocumentId,
	/// Content exactly as last known to the engine.
	pub snapshot: String,
	/// Line terminator of the document.
	pub eol: Eol,
}

/// Arena of tracked documents indexed by [`DocumentId`].
#[derive(Debug, Default)]
pub struct DocumentRegistry {
	slots: Slab<DocumentEntry>,
	index: HashMap<DocumentId, usize>,
}

impl DocumentRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Starts tracking `doc`, or resets its snapshot if already tracked.
	pub fn open(&mut self, doc: DocumentId, snapshot: String, eol: Eol) {
		let entry = DocumentEntry { id: doc, snapshot, eol };
		match self.index.get(&doc) {
			Some(&slot) => self.slots[slot] = entry,
			None => {
				let slot = self.slots.insert(entry);
				self.index.insert(doc, slot);
			}
		}
	}

	/// Stops tracking `doc`, returning its final state.
	pub fn close(&mut self, doc: DocumentId) -> Option<DocumentEntry> {
		let slot = self.index.remove(&doc)?;
		Some(self.slots.remove(slot))
	}

	/// Returns the entry for `doc`.
	pub fn get(&self, doc: DocumentId) -> Option<&DocumentEntry> {
		self.index.get(&doc).and_then(|&slot| self.slots.get(slot))
	}

	/// Returns the entry for `doc` mutably.
	pub fn get_mut(&mut self, doc: DocumentId) -> Option<&mut DocumentEntry> {
		let slot = *self.index.get(&doc)?;
		self.slots.get_mut(slot)
	}

	/// Replaces the snapshot of a tracked document.
	///
	/// Returns `false` if `doc` is not tracked.
	pub fn set_snapshot(&mut self, doc: DocumentId, snapshot: String, eol: Eol) -> bool {
		let Some(entry) = self.get_mut(doc) else {
			return false;
		};
		entry.snapshot = snapshot;
		entry.eol = eol;
		true
	}

	/// Returns `true` if `doc` is tracked.
	pub fn contains(&self, doc: DocumentId) -> bool {
		self.index.contains_key(&doc)
	}

	/// Number of tracked documents.
	pub fn len(&self) -> usize {
		self.index.len()
	}

	/// Returns `true` if nothing is tracked.
	pub fn is_empty(&self) -> bool {
		self.index.is_empty()
	}
}
