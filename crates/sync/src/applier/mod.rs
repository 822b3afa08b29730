//! Engine → editor: queue line notifications and apply them as minimal edits.
//!
//! Accepted notifications go to one queue. A single drain loop (guarded by
//! an in-flight flag) pops everything queued, groups it per document in
//! arrival order, rebuilds each document's lines, diffs the result against
//! the live text and applies the patch in one editor transaction.
//!
//! # Error Handling
//!
//! - Unknown buffer, echoed tick, empty change: dropped at acceptance
//! - Closed document, no visible view, no-op diff: skipped for this pass
//! - Editor rejected the edit: pending completions fail with
//!   [`CompletionError::EditRejected`], no retry
//! - Anything else: logged per document, the loop continues

mod shape;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use duplex_primitives::{Position, Selection, diff_with};
use duplex_rpc::BufferLinesEvent;
use indexmap::IndexMap;
use parking_lot::Mutex;
pub use shape::apply_lines_event;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::completion::{PendingChange, reject_all, resolve_all};
use crate::error::{CompletionError, EditError, Result};
use crate::ids::{DocumentId, ViewId};
use crate::surface::{EditOptions, EditorSurface};
use crate::sync::SyncCore;

/// Title of the progress indicator shown for slow drains.
pub const PROGRESS_TITLE: &str = "Applying engine edits";

/// What happened to an engine notification on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
	/// Queued for the given document.
	Queued(DocumentId),
	/// No document is mirrored by the buffer.
	UnknownBuffer,
	/// At or below the buffer's tick gate.
	Echo,
	/// Empty splice (sent after some undos).
	EmptyChange,
}

impl Acceptance {
	/// Returns `true` if the notification was queued.
	pub fn is_queued(&self) -> bool {
		matches!(self, Self::Queued(_))
	}
}

/// Summary of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
	/// Queue pops performed.
	pub passes: usize,
	/// Documents that received an edit, once per pass.
	pub applied: Vec<DocumentId>,
	/// Documents skipped (closed, not visible, nothing to change).
	pub skipped: Vec<DocumentId>,
	/// Documents whose edit the editor rejected.
	pub rejected: Vec<DocumentId>,
	/// Documents whose edit failed unexpectedly.
	pub failed: Vec<DocumentId>,
}

enum ApplyOutcome {
	Applied,
	Skipped(&'static str),
	Rejected,
}

impl SyncCore {
	pub(crate) fn accept(&self, event: BufferLinesEvent) -> Acceptance {
		let Some(doc) = self.collaborators.document_for_buffer(event.buffer) else {
			debug!(buffer = event.buffer.0, "sync.apply.unknown_buffer");
			return Acceptance::UnknownBuffer;
		};

		let mut state = self.state.lock();
		if state.echo.is_tick_echo(event.buffer, event.tick) {
			debug!(buffer = event.buffer.0, tick = event.tick, "sync.apply.skip_tick");
			return Acceptance::Echo;
		}
		if event.is_empty_change() {
			debug!(buffer = event.buffer.0, tick = event.tick, "sync.apply.empty_change");
			return Acceptance::EmptyChange;
		}

		trace!(
			doc_id = doc.0,
			buffer = event.buffer.0,
			tick = event.tick,
			first = event.first_line,
			last = event.last_line,
			lines = event.lines.len(),
			"sync.apply.queued"
		);
		state.completion.track(doc);
		state.queue.push_back(event);
		Acceptance::Queued(doc)
	}

	pub(crate) async fn drain(&self) -> DrainReport {
		let mut report = DrainReport::default();
		loop {
			let Some(guard) = DrainGuard::acquire(&self.draining) else {
				return report;
			};
			debug!("sync.apply.drain_start");
			let progress = ProgressTimer::start(Arc::clone(&self.surface), self.config.progress_delay());

			let leftovers = self.drain_queue(&mut report).await;
			resolve_all(leftovers);

			drop(progress);
			drop(guard);
			debug!(
				passes = report.passes,
				applied = report.applied.len(),
				skipped = report.skipped.len(),
				rejected = report.rejected.len(),
				failed = report.failed.len(),
				"sync.apply.drain_done"
			);
			// a notification may have slipped in between the last pop and the flag reset
			if self.state.lock().queue.is_empty() {
				return report;
			}
		}
	}

	/// Pops and applies until the queue is empty. Returns the completions
	/// that are still pending for skipped documents.
	async fn drain_queue(&self, report: &mut DrainReport) -> Vec<PendingChange> {
		let mut deferred = Vec::new();
		loop {
			let events: Vec<BufferLinesEvent> = {
				let mut state = self.state.lock();
				if state.queue.is_empty() {
					deferred.extend(state.completion.take_all());
					return deferred;
				}
				state.queue.drain(..).collect()
			};
			report.passes += 1;

			for (doc, events) in self.group_by_document(events) {
				match self.apply_document(doc, &events).await {
					Ok(ApplyOutcome::Applied) => report.applied.push(doc),
					Ok(ApplyOutcome::Rejected) => report.rejected.push(doc),
					Ok(ApplyOutcome::Skipped(reason)) => {
						debug!(doc_id = doc.0, reason, "sync.apply.skip_doc");
						deferred.extend(self.state.lock().completion.take_front(doc, events.len()));
						report.skipped.push(doc);
					}
					Err(err) => {
						error!(doc_id = doc.0, error = %err, "sync.apply.failed");
						report.failed.push(doc);
					}
				}
			}
		}
	}

	fn group_by_document(&self, events: Vec<BufferLinesEvent>) -> IndexMap<DocumentId, Vec<BufferLinesEvent>> {
		let mut groups: IndexMap<DocumentId, Vec<BufferLinesEvent>> = IndexMap::new();
		for event in events {
			let Some(doc) = self.collaborators.document_for_buffer(event.buffer) else {
				warn!(buffer = event.buffer.0, "sync.apply.no_document");
				continue;
			};
			groups.entry(doc).or_default().push(event);
		}
		groups
	}

	async fn apply_document(&self, doc: DocumentId, events: &[BufferLinesEvent]) -> Result<ApplyOutcome> {
		if !self.state.lock().registry.contains(doc) {
			return Ok(ApplyOutcome::Skipped("untracked"));
		}
		let Some(live) = self.surface.document(doc) else {
			return Ok(ApplyOutcome::Skipped("closed"));
		};
		let Some(view) = self.surface.visible_view(doc) else {
			return Ok(ApplyOutcome::Skipped("no_view"));
		};

		let mut lines: Vec<String> = live.eol.split(&live.text).into_iter().map(str::to_string).collect();
		for event in events {
			apply_lines_event(&mut lines, event.first_line, event.last_line, &event.lines);
		}
		let target = live.eol.join(&lines);
		let ops = diff_with(&live.text, &target, live.eol, self.config.encoding, &self.config.diff_options());
		if ops.is_empty() {
			return Ok(ApplyOutcome::Skipped("unchanged"));
		}

		let cursor_before = self.surface.selection(view).map(|selection| selection.active);
		self.state.lock().echo.arm_version(doc, live.version + 1);
		debug!(doc_id = doc.0, ops = ops.len(), events = events.len(), "sync.apply.edit");

		let result = self.surface.apply_edits(view, ops, EditOptions::MERGE_UNDO).await;
		let taken = self.state.lock().completion.take_front(doc, events.len());

		match result {
			Ok(()) => {
				let cursor = self.settle_cursor(doc, view, cursor_before);
				let after = self.surface.document(doc);
				{
					let mut state = self.state.lock();
					if let Some(cursor) = cursor {
						state.completion.record_cursor(doc, cursor);
					}
					if let Some(after) = after {
						state.registry.set_snapshot(doc, after.text, after.eol);
					}
				}
				resolve_all(taken);
				debug!(doc_id = doc.0, "sync.apply.flush_done");
				Ok(ApplyOutcome::Applied)
			}
			Err(EditError::Rejected) => {
				self.state.lock().echo.disarm_version(doc);
				reject_all(taken, CompletionError::EditRejected);
				warn!(doc_id = doc.0, "sync.apply.rejected");
				Ok(ApplyOutcome::Rejected)
			}
			Err(err) => {
				self.state.lock().echo.disarm_version(doc);
				reject_all(taken, CompletionError::ApplyFailed);
				Err(err.into())
			}
		}
	}

	/// Collapses a selection left by the edit, otherwise restores the
	/// engine-reported cursor or the cursor from before the edit.
	fn settle_cursor(&self, doc: DocumentId, view: ViewId, before: Option<Position>) -> Option<Position> {
		let selection = self.surface.selection(view)?;
		let cursor = if !selection.is_empty() {
			selection.active
		} else if let Some(engine) = self.collaborators.engine_cursor(doc) {
			engine
		} else {
			before.unwrap_or(selection.active)
		};
		self.surface.set_selection(view, Selection::cursor(cursor));
		Some(cursor)
	}
}

/// Holds the in-flight flag for the lifetime of one drain.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
	fn acquire(flag: &'a AtomicBool) -> Option<Self> {
		flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.ok()
			.map(|_| Self(flag))
	}
}

impl Drop for DrainGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgressPhase {
	Pending,
	Shown,
	Finished,
}

/// Shows the progress indicator once a drain outlives `delay`; hides it on drop.
struct ProgressTimer {
	task: JoinHandle<()>,
	phase: Arc<Mutex<ProgressPhase>>,
	surface: Arc<dyn EditorSurface>,
}

impl ProgressTimer {
	fn start(surface: Arc<dyn EditorSurface>, delay: Duration) -> Self {
		let phase = Arc::new(Mutex::new(ProgressPhase::Pending));
		let task = tokio::spawn({
			let phase = Arc::clone(&phase);
			let surface = Arc::clone(&surface);
			async move {
				tokio::time::sleep(delay).await;
				let mut phase = phase.lock();
				if *phase == ProgressPhase::Pending {
					*phase = ProgressPhase::Shown;
					surface.show_progress(PROGRESS_TITLE);
				}
			}
		});
		Self { task, phase, surface }
	}
}

impl Drop for ProgressTimer {
	fn drop(&mut self) {
		self.task.abort();
		let mut phase = self.phase.lock();
		if *phase == ProgressPhase::Shown {
			self.surface.hide_progress();
		}
		*phase = ProgressPhase::Finished;
	}
}
