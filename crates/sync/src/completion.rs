//! Per-document completion tracking for remote changes.
//!
//! Each accepted engine notification registers one [`PendingChange`]. Waiters
//! attach a oneshot sender to every change pending at the time they ask, so a
//! wait resolves exactly when the changes it saw have been applied (or fails
//! when one of them was rejected).

use std::collections::HashMap;
use std::future::Future;

use duplex_primitives::Position;
use futures::future::try_join_all;
use tokio::sync::oneshot;

use crate::error::CompletionError;
use crate::ids::DocumentId;

/// Outcome delivered to waiters.
pub type CompletionResult = Result<(), CompletionError>;

/// One accepted remote notification awaiting application.
#[derive(Debug, Default)]
pub struct PendingChange {
	waiters: Vec<oneshot::Sender<CompletionResult>>,
}

impl PendingChange {
	fn settle(self, result: CompletionResult) {
		for waiter in self.waiters {
			let _ = waiter.send(result);
		}
	}
}

/// Settles every change in `changes` successfully.
pub fn resolve_all(changes: impl IntoIterator<Item = PendingChange>) {
	changes.into_iter().for_each(|change| change.settle(Ok(())));
}

/// Fails every change in `changes` with `error`.
pub fn reject_all(changes: impl IntoIterator<Item = PendingChange>, error: CompletionError) {
	changes.into_iter().for_each(|change| change.settle(Err(error)));
}

/// Ordered pending changes plus the last applied cursor, per document.
#[derive(Debug, Default)]
pub struct CompletionGate {
	pending: HashMap<DocumentId, Vec<PendingChange>>,
	cursors: HashMap<DocumentId, Position>,
}

impl CompletionGate {
	/// Creates an empty gate.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers one pending change for `doc`.
	pub fn track(&mut self, doc: DocumentId) {
		self.pending.entry(doc).or_default().push(PendingChange::default());
	}

	/// Number of pending changes for `doc`.
	pub fn pending_len(&self, doc: DocumentId) -> usize {
		self.pending.get(&doc).map_or(0, Vec::len)
	}

	/// Returns `true` if `doc` has changes awaiting application.
	pub fn has_pending(&self, doc: DocumentId) -> bool {
		self.pending_len(doc) > 0
	}

	/// Removes the oldest `count` pending changes of `doc`.
	pub fn take_front(&mut self, doc: DocumentId, count: usize) -> Vec<PendingChange> {
		let Some(list) = self.pending.get_mut(&doc) else {
			return Vec::new();
		};
		let taken = list.drain(..count.min(list.len())).collect();
		if list.is_empty() {
			self.pending.remove(&doc);
		}
		taken
	}

	/// Removes every pending change of every document.
	pub fn take_all(&mut self) -> Vec<PendingChange> {
		self.pending.drain().flat_map(|(_, list)| list).collect()
	}

	/// Future resolving once every change pending *now* for `doc` settles.
	///
	/// Completes immediately when nothing is pending.
	pub fn wait(&mut self, doc: DocumentId) -> impl Future<Output = CompletionResult> + Send + use<> {
		let receivers: Vec<_> = self
			.pending
			.get_mut(&doc)
			.into_iter()
			.flatten()
			.map(|change| {
				let (tx, rx) = oneshot::channel();
				change.waiters.push(tx);
				rx
			})
			.collect();

		async move {
			let results = try_join_all(receivers).await.map_err(|_| CompletionError::Dropped)?;
			results.into_iter().collect()
		}
	}

	/// Records the cursor left by the last successful remote apply.
	pub fn record_cursor(&mut self, doc: DocumentId, cursor: Position) {
		self.cursors.insert(doc, cursor);
	}

	/// Returns and clears the last recorded cursor.
	pub fn consume_last_cursor(&mut self, doc: DocumentId) -> Option<Position> {
		self.cursors.remove(&doc)
	}

	/// Fails all waiters of `doc` with [`CompletionError::Closed`] and drops its state.
	pub fn close(&mut self, doc: DocumentId) {
		if let Some(list) = self.pending.remove(&doc) {
			reject_all(list, CompletionError::Closed);
		}
		self.cursors.remove(&doc);
	}
}
