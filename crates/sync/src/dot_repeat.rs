//! Dot-repeat: rebuild the last insert-mode edit and replay it in the engine.
//!
//! While the engine is in insert mode, contiguous single-cursor edits are
//! folded into one [`DotRepeatAccumulator`]. Replaying types the accumulated
//! edit into a throwaway scratch buffer so the engine records it as its own
//! last change, ready for `.`.

use std::iter;

use duplex_primitives::{Eol, OffsetEncoding, Position, char_to_byte};
use duplex_rpc::engine::decode_u64;
use duplex_rpc::{AtomicBatch, BufferId, EngineCall, TextEngine, WindowConfig, WindowId};
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::ids::DocumentId;
use crate::surface::ChangeEvent;
use crate::sync::SyncCore;

/// One logical insert-mode edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotRepeatAccumulator {
	/// Document the edit happened in.
	pub document: DocumentId,
	/// Document offset where the edit starts, in editor units.
	pub start_offset: usize,
	/// Backspaces the engine needs to remove the deleted text: one per code
	/// point, one per line break.
	pub deleted_len: usize,
	/// Text typed so far.
	pub inserted: String,
	/// Length of `inserted` in editor units.
	pub inserted_len: usize,
	/// Line terminator of the document.
	pub eol: Eol,
}

impl DotRepeatAccumulator {
	/// Offset right after the inserted text.
	pub fn end_offset(&self) -> usize {
		self.start_offset + self.inserted_len
	}

	/// Keystrokes reproducing this edit from the end of the deleted text.
	pub fn keys(&self) -> String {
		let mut keys = "<BS>".repeat(self.deleted_len);
		keys.push_str(&escape_input(&self.inserted, self.eol));
		keys
	}
}

/// Escapes text for the engine's keystroke notation.
pub fn escape_input(text: &str, eol: Eol) -> String {
	text.replace('<', "<LT>").replace(eol.as_str(), "<CR>")
}

/// Folds insert-mode change events into an accumulator.
#[derive(Debug, Default)]
pub struct DotRepeatRecorder {
	current: Option<DotRepeatAccumulator>,
}

impl DotRepeatRecorder {
	/// Creates an empty recorder.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records `event`, whose changes refer to `previous`.
	///
	/// Only changes on the cursor's line count. Anything that does not continue
	/// exactly where the accumulator ends starts a new accumulator.
	pub fn observe(&mut self, event: &ChangeEvent, previous: &str, cursor: Option<Position>, encoding: OffsetEncoding) {
		let [change] = event.changes.as_slice() else {
			// multi-cursor edits are not one logical change
			self.current = None;
			return;
		};
		let Some(cursor) = cursor else {
			return;
		};
		let first = change.range.start.line;
		let last = first + change.text.matches(event.eol.as_str()).count();
		if !(first..=last).contains(&cursor.line) {
			return;
		}

		let start = document_offset(previous, event.eol, change.range.start, encoding);
		let inserted_len = encoding.measure(&change.text);
		let deleted = deleted_text(previous, event.eol, change.range.start, change.range_length, encoding);

		if let Some(acc) = self.current.as_mut().filter(|acc| acc.document == event.document) {
			if start == acc.end_offset() {
				acc.deleted_len += backspace_count(deleted, event.eol);
				acc.inserted.push_str(&change.text);
				acc.inserted_len += inserted_len;
				return;
			}
			if change.text.is_empty() && change.range_length > 0 && start + change.range_length == acc.end_offset() {
				backspace(acc, deleted, change.range_length, start, encoding);
				return;
			}
		}

		self.current = Some(DotRepeatAccumulator {
			document: event.document,
			start_offset: start,
			deleted_len: backspace_count(deleted, event.eol),
			inserted: change.text.clone(),
			inserted_len,
			eol: event.eol,
		});
	}

	/// The accumulated edit, if any.
	pub fn current(&self) -> Option<&DotRepeatAccumulator> {
		self.current.as_ref()
	}

	/// Removes and returns the accumulated edit.
	pub fn take(&mut self) -> Option<DotRepeatAccumulator> {
		self.current.take()
	}

	/// Forgets the accumulated edit.
	pub fn clear(&mut self) {
		self.current = None;
	}
}

/// Deletion of `deleted` (`len` editor units) ending at the accumulator's
/// end: eat typed text first, then extend the deleted prefix.
fn backspace(acc: &mut DotRepeatAccumulator, deleted: &str, len: usize, start: usize, encoding: OffsetEncoding) {
	if len <= acc.inserted_len {
		let mut removed = 0;
		while removed < len {
			let Some(ch) = acc.inserted.pop() else {
				break;
			};
			removed += encoding.unit_len(ch);
		}
		acc.inserted_len -= removed.min(acc.inserted_len);
	} else {
		let before_typed = &deleted[..encoding.byte_offset(deleted, len - acc.inserted_len)];
		acc.deleted_len += backspace_count(before_typed, acc.eol);
		acc.inserted.clear();
		acc.inserted_len = 0;
		acc.start_offset = start;
	}
}

/// Absolute offset of `pos` in `text`, in editor units.
fn document_offset(text: &str, eol: Eol, pos: Position, encoding: OffsetEncoding) -> usize {
	let eol_len = encoding.measure(eol.as_str());
	let lines = eol.split(text);
	let before: usize = lines.iter().take(pos.line).map(|line| encoding.measure(line) + eol_len).sum();
	before + pos.character
}

/// The `len` editor units of `text` starting at `start`.
fn deleted_text(text: &str, eol: Eol, start: Position, len: usize, encoding: OffsetEncoding) -> &str {
	let lines = eol.split(text);
	let line_start: usize = lines.iter().take(start.line).map(|line| line.len() + eol.as_str().len()).sum();
	let col = lines.get(start.line).map_or(0, |line| char_to_byte(line, start.character, encoding));
	let rest = &text[(line_start + col).min(text.len())..];
	&rest[..encoding.byte_offset(rest, len)]
}

/// Engine backspaces removing `text`: one per code point, one per line break.
fn backspace_count(text: &str, eol: Eol) -> usize {
	let breaks = text.matches(eol.as_str()).count();
	text.chars().count() - breaks * (eol.as_str().chars().count() - 1)
}

/// Scratch buffer/window pair, released on every exit path by
/// [`ScratchScope::release`].
#[derive(Debug, Default)]
struct ScratchScope {
	previous: Option<WindowId>,
	buffer: Option<BufferId>,
	window: Option<WindowId>,
}

impl ScratchScope {
	/// Restores the previous window and disposes of the scratch pair.
	///
	/// Calls go out one by one so a failing step does not skip the rest.
	async fn release(self, engine: &dyn TextEngine) {
		let calls = [
			self.previous.map(|window| EngineCall::SetCurrentWin { window }),
			self.window.map(|window| EngineCall::WinClose { window, force: true }),
			self.buffer.map(|buffer| EngineCall::BufDelete { buffer, force: true }),
		];
		for call in calls.into_iter().flatten() {
			let method = call.method();
			if let Err(err) = engine.request(call).await {
				warn!(method, error = %err, "sync.dot_repeat.release_failed");
			}
		}
	}
}

impl SyncCore {
	/// Replays the accumulated edit in a scratch buffer.
	///
	/// Returns `false` when there is nothing to replay. The accumulator is
	/// cleared either way.
	pub(crate) async fn replay_dot_repeat(&self) -> Result<bool> {
		let Some(acc) = self.state.lock().recorder.take() else {
			return Ok(false);
		};
		debug!(
			doc_id = acc.document.0,
			deleted = acc.deleted_len,
			inserted = acc.inserted_len,
			"sync.dot_repeat.replay"
		);

		let engine = self.engine.as_ref();
		let mut scratch = ScratchScope::default();
		let result = self.replay_in_scratch(engine, &mut scratch, &acc).await;
		scratch.release(engine).await;
		result.map(|()| true)
	}

	async fn replay_in_scratch(&self, engine: &dyn TextEngine, scratch: &mut ScratchScope, acc: &DotRepeatAccumulator) -> Result<()> {
		scratch.previous = Some(engine.current_window().await?);

		let create = EngineCall::CreateBuf {
			listed: false,
			scratch: true,
		};
		let method = create.method();
		let buffer = BufferId(decode_u64(method, engine.request(create).await?)?);
		scratch.buffer = Some(buffer);

		let open = EngineCall::OpenWin {
			buffer,
			enter: true,
			config: WindowConfig::TINY,
		};
		let method = open.method();
		let window = WindowId(decode_u64(method, engine.request(open).await?)?);
		scratch.window = Some(window);

		let filler: String = iter::repeat_n(self.config.scratch_filler, acc.deleted_len).collect();
		let batch = AtomicBatch::new()
			.with(EngineCall::SetCurrentWin { window })
			.with(EngineCall::SetOption {
				buffer: Some(buffer),
				name: "bufhidden".into(),
				value: "wipe".into(),
			})
			.with(EngineCall::BufSetLines {
				buffer,
				start: 0,
				end: -1,
				strict: false,
				lines: vec![filler.clone()],
			})
			.with(EngineCall::WinSetCursor {
				window,
				line: 1,
				col: filler.len(),
			})
			.with(EngineCall::Input { keys: acc.keys() });

		let reply = engine.call_atomic(&batch).await?;
		let failures = reply.failures(&batch);
		if failures.is_empty() {
			return Ok(());
		}
		let summary = failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n");
		warn!(buffer = buffer.0, %summary, "sync.dot_repeat.calls_failed");
		Err(SyncError::Batch {
			buffer: Some(buffer),
			summary,
		})
	}
}

#[cfg(test)]
mod tests {
	use duplex_primitives::TextRange;
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::surface::ContentChange;

	const DOC: DocumentId = DocumentId(1);
	const UTF16: OffsetEncoding = OffsetEncoding::Utf16;

	fn event(line: usize, start: usize, end: usize, text: &str) -> ChangeEvent {
		ChangeEvent {
			document: DOC,
			version: 1,
			eol: Eol::Lf,
			text: String::new(),
			changes: vec![ContentChange {
				range: TextRange::new(Position::new(line, start), Position::new(line, end)),
				text: text.into(),
				range_length: end - start,
			}],
		}
	}

	fn typed(recorder: &mut DotRepeatRecorder, previous: &str, col: usize, text: &str) {
		let cursor = Position::new(0, col + text.chars().count());
		recorder.observe(&event(0, col, col, text), previous, Some(cursor), UTF16);
	}

	#[test]
	fn contiguous_inserts_merge() {
		let mut recorder = DotRepeatRecorder::new();
		typed(&mut recorder, "", 0, "a");
		typed(&mut recorder, "a", 1, "b");
		typed(&mut recorder, "ab", 2, "c");

		let acc = recorder.current().unwrap();
		assert_eq!(acc.start_offset, 0);
		assert_eq!(acc.inserted, "abc");
		assert_eq!(acc.inserted_len, 3);
		assert_eq!(acc.deleted_len, 0);
	}

	#[test]
	fn non_contiguous_insert_starts_fresh() {
		let mut recorder = DotRepeatRecorder::new();
		typed(&mut recorder, "", 0, "a");
		typed(&mut recorder, "a", 1, "b");
		typed(&mut recorder, "ab", 2, "c");
		typed(&mut recorder, "abc       x", 10, "z");

		let acc = recorder.current().unwrap();
		assert_eq!(acc.start_offset, 10);
		assert_eq!(acc.inserted, "z");
	}

	#[test]
	fn offsets_span_lines() {
		let mut recorder = DotRepeatRecorder::new();
		let previous = "one\ntwo";
		recorder.observe(&event(1, 1, 1, "X"), previous, Some(Position::new(1, 2)), UTF16);
		assert_eq!(recorder.current().unwrap().start_offset, 5);
	}

	#[test]
	fn backspace_eats_typed_text_then_deletes() {
		let mut recorder = DotRepeatRecorder::new();
		typed(&mut recorder, "xy", 2, "ab");
		recorder.observe(&event(0, 3, 4, ""), "xyab", Some(Position::new(0, 3)), UTF16);
		let acc = recorder.current().unwrap();
		assert_eq!((acc.inserted.as_str(), acc.deleted_len), ("a", 0));

		// two more: one typed char, then one pre-existing char
		recorder.observe(&event(0, 2, 3, ""), "xya", Some(Position::new(0, 2)), UTF16);
		recorder.observe(&event(0, 1, 2, ""), "xy", Some(Position::new(0, 1)), UTF16);
		let acc = recorder.current().unwrap();
		assert_eq!(acc.inserted, "");
		assert_eq!(acc.deleted_len, 1);
		assert_eq!(acc.start_offset, 1);
		assert_eq!(acc.keys(), "<BS>");
	}

	fn deletion(range: TextRange, range_length: usize, eol: Eol) -> ChangeEvent {
		ChangeEvent {
			document: DOC,
			version: 1,
			eol,
			text: String::new(),
			changes: vec![ContentChange {
				range,
				text: String::new(),
				range_length,
			}],
		}
	}

	#[test]
	fn deleted_line_break_is_one_backspace() {
		let mut recorder = DotRepeatRecorder::new();
		let range = TextRange::new(Position::new(0, 2), Position::new(1, 0));
		recorder.observe(&deletion(range, 2, Eol::CrLf), "ab\r\ncd", Some(Position::new(0, 2)), UTF16);
		let acc = recorder.current().unwrap();
		assert_eq!(acc.deleted_len, 1);
		assert_eq!(acc.keys(), "<BS>");
	}

	#[test]
	fn deleted_astral_character_is_one_backspace() {
		let mut recorder = DotRepeatRecorder::new();
		let range = TextRange::new(Position::new(0, 1), Position::new(0, 3));
		recorder.observe(&deletion(range, 2, Eol::Lf), "a\u{1F600}", Some(Position::new(0, 1)), UTF16);
		assert_eq!(recorder.current().unwrap().keys(), "<BS>");
	}

	#[test]
	fn backspace_past_typed_text_counts_code_points() {
		let mut recorder = DotRepeatRecorder::new();
		typed(&mut recorder, "x\u{1F600}", 3, "b");
		// one deletion over the emoji and the typed "b"
		let range = TextRange::new(Position::new(0, 1), Position::new(0, 4));
		recorder.observe(&deletion(range, 3, Eol::Lf), "x\u{1F600}b", Some(Position::new(0, 1)), UTF16);
		let acc = recorder.current().unwrap();
		assert_eq!(acc.inserted, "");
		assert_eq!(acc.start_offset, 1);
		assert_eq!(acc.keys(), "<BS>");
	}

	#[test]
	fn changes_away_from_cursor_are_ignored() {
		let mut recorder = DotRepeatRecorder::new();
		typed(&mut recorder, "", 0, "a");
		recorder.observe(&event(0, 0, 0, "zzz"), "a", Some(Position::new(4, 0)), UTF16);
		assert_eq!(recorder.current().unwrap().inserted, "a");
	}

	#[test]
	fn multi_cursor_event_discards() {
		let mut recorder = DotRepeatRecorder::new();
		typed(&mut recorder, "", 0, "a");
		let mut multi = event(0, 1, 1, "b");
		multi.changes.push(multi.changes[0].clone());
		recorder.observe(&multi, "a", Some(Position::new(0, 2)), UTF16);
		assert!(recorder.current().is_none());
	}

	#[test]
	fn keys_escape_angle_brackets_and_newlines() {
		let acc = DotRepeatAccumulator {
			document: DOC,
			start_offset: 0,
			deleted_len: 2,
			inserted: "a<b\r\nc".into(),
			inserted_len: 6,
			eol: Eol::CrLf,
		};
		assert_eq!(acc.keys(), "<BS><BS>a<LT>b<CR>c");
		assert_eq!(escape_input("<CR>\n", Eol::Lf), "<LT>CR><CR>");
	}
}
