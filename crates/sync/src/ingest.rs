//! Editor → engine: turn editor change events into one atomic engine batch.

use duplex_primitives::{Eol, OffsetEncoding, Position, char_to_byte};
use duplex_rpc::{AtomicBatch, BufferId, EngineCall, Tick};
use tracing::{debug, error, trace, warn};

use crate::dot_repeat::escape_input;
use crate::error::{Result, SyncError};
use crate::surface::{ChangeEvent, ContentChange};
use crate::sync::SyncCore;

/// What happened to one editor change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
	/// The event was the echo of a remote edit and was dropped.
	Echo,
	/// The document is not tracked.
	Untracked,
	/// The document has no engine buffer.
	NoBuffer,
	/// The event carried no changes.
	Empty,
	/// The changes were sent.
	Sent {
		/// Calls in the batch.
		calls: usize,
		/// Tick threshold stamped for the buffer.
		tick_gate: Tick,
	},
}

impl SyncCore {
	pub(crate) async fn ingest(&self, event: ChangeEvent) -> Result<IngestOutcome> {
		let _serial = self.ingest_lock.lock().await;
		let doc = event.document;
		trace!(doc_id = doc.0, version = event.version, changes = event.changes.len(), "sync.ingest.event");

		let buffer = self.collaborators.buffer_for_document(doc);
		let insert_mode = self.collaborators.is_insert_mode();
		let cursor = self.live_cursor(doc);
		let encoding = self.config.encoding;

		let (buffer, batch) = {
			let mut state = self.state.lock();
			if state.echo.take_version_echo(doc, event.version) {
				debug!(doc_id = doc.0, version = event.version, "sync.ingest.echo");
				return Ok(IngestOutcome::Echo);
			}
			let Some(entry) = state.registry.get(doc) else {
				warn!(doc_id = doc.0, "sync.ingest.no_snapshot");
				return Ok(IngestOutcome::Untracked);
			};
			if event.changes.is_empty() {
				return Ok(IngestOutcome::Empty);
			}
			let previous = entry.snapshot.clone();

			if self.config.dot_repeat && insert_mode {
				state.recorder.observe(&event, &previous, cursor, encoding);
			}

			let Some(buffer) = buffer else {
				warn!(doc_id = doc.0, "sync.ingest.no_buffer");
				return Ok(IngestOutcome::NoBuffer);
			};

			let typed = (self.config.input_for_typing && insert_mode)
				.then(|| typed_keys(&event, cursor, encoding))
				.flatten();
			let batch = match typed {
				Some(keys) => AtomicBatch::new().with(EngineCall::Input { keys }),
				None => set_text_calls(buffer, &previous, event.eol, &event.changes, encoding).collect(),
			};

			state.registry.set_snapshot(doc, event.text, event.eol);
			(buffer, batch)
		};

		let tick = match self.engine.changed_tick(buffer).await {
			Ok(tick) => tick,
			Err(err) => {
				warn!(doc_id = doc.0, buffer = buffer.0, error = %err, "sync.ingest.tick_failed");
				return Err(err.into());
			}
		};
		let tick_gate = self.state.lock().echo.stamp_tick(buffer, tick, batch.len());
		debug!(doc_id = doc.0, buffer = buffer.0, calls = batch.len(), tick, tick_gate, "sync.ingest.dispatch");

		let reply = self.engine.call_atomic(&batch).await.inspect_err(|err| {
			error!(doc_id = doc.0, buffer = buffer.0, error = %err, "sync.ingest.batch_failed");
		})?;
		let failures = reply.failures(&batch);
		if !failures.is_empty() {
			let summary = failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n");
			error!(doc_id = doc.0, buffer = buffer.0, failed = failures.len(), %summary, "sync.ingest.calls_failed");
			return Err(SyncError::Batch {
				buffer: Some(buffer),
				summary,
			});
		}

		Ok(IngestOutcome::Sent {
			calls: batch.len(),
			tick_gate,
		})
	}
}

/// One `nvim_buf_set_text` per change, translated against `previous` and
/// ordered by descending start so earlier calls never shift later ones.
fn set_text_calls<'a>(
	buffer: BufferId,
	previous: &'a str,
	eol: Eol,
	changes: &'a [ContentChange],
	encoding: OffsetEncoding,
) -> impl Iterator<Item = EngineCall> + 'a {
	let lines = eol.split(previous);
	let mut ordered: Vec<&ContentChange> = changes.iter().collect();
	ordered.sort_by(|a, b| b.range.start.cmp(&a.range.start));

	ordered.into_iter().map(move |change| {
		let byte_col = |pos: Position| char_to_byte(lines.get(pos.line).copied().unwrap_or(""), pos.character, encoding);
		EngineCall::BufSetText {
			buffer,
			start_line: change.range.start.line,
			start_col: byte_col(change.range.start),
			end_line: change.range.end.line,
			end_col: byte_col(change.range.end),
			lines: eol.split(&change.text).into_iter().map(str::to_string).collect(),
		}
	})
}

/// Keystrokes for an event that is exactly one character typed at the cursor.
fn typed_keys(event: &ChangeEvent, cursor: Option<Position>, encoding: OffsetEncoding) -> Option<String> {
	let [change] = event.changes.as_slice() else {
		return None;
	};
	if !change.range.is_empty() || change.range_length != 0 {
		return None;
	}
	let mut chars = change.text.chars();
	let ch = chars.next()?;
	if chars.next().is_some() || ch == '\n' || ch == '\r' {
		return None;
	}
	let start = change.range.start;
	let expected = Position::new(start.line, start.character + encoding.unit_len(ch));
	(cursor? == expected).then(|| escape_input(&change.text, event.eol))
}
