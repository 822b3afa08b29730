use duplex_primitives::{Eol, Position, TextRange};
use duplex_rpc::BufferLinesEvent;
use duplex_sync::memory::MemoryHarness;
use duplex_sync::{CompletionError, IngestOutcome, SyncConfig, SyncError};
use pretty_assertions::assert_eq;

fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("duplex_sync=debug").try_init();
}

fn harness(text: &str) -> MemoryHarness {
	init_tracing();
	MemoryHarness::new(SyncConfig::default(), text, Eol::Lf)
}

fn point(line: usize, character: usize) -> TextRange {
	TextRange::point(Position::new(line, character))
}

fn lines(items: &[&str]) -> Vec<String> {
	items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn editor_edits_reach_engine_once() {
	let h = harness("fn main() {\n}\n");
	h.editor_edit(point(0, 11), "\n    body();").await.unwrap();
	h.editor_edit(TextRange::new(Position::new(0, 3), Position::new(0, 7)), "start").await.unwrap();
	h.pump().await.unwrap();

	assert_eq!(h.editor_text(), "fn start() {\n    body();\n}\n");
	assert!(h.is_converged());
	let set_text = h.engine.methods().into_iter().filter(|m| *m == "nvim_buf_set_text").count();
	assert_eq!(set_text, 2);
	assert!(h.editor.undo_options().is_empty());
}

#[tokio::test]
async fn engine_edits_reach_editor_once() {
	let h = harness("alpha\nbeta\ngamma");
	h.engine_edit(1, 2, lines(&["BETA", "delta"]));
	h.engine_edit(0, 1, lines(&[]));
	h.pump().await.unwrap();

	assert_eq!(h.editor_text(), "BETA\ndelta\ngamma");
	assert!(h.is_converged());
	// the editor's resulting change event was recognized as an echo
	assert_eq!(h.engine.batch_count(), 0);
}

#[tokio::test]
async fn interleaved_edits_converge() {
	let h = harness("one\ntwo\nthree");
	h.editor_edit(point(0, 3), "!").await.unwrap();
	h.engine_edit(2, 3, lines(&["THREE"]));
	h.pump().await.unwrap();
	h.editor_edit(point(1, 0), ">").await.unwrap();
	h.pump().await.unwrap();

	assert_eq!(h.editor_text(), "one!\n>two\nTHREE");
	assert!(h.is_converged());
}

#[tokio::test]
async fn astral_characters_translate_to_engine_bytes() {
	let h = harness("\u{1F600} ok\nna\u{00EF}ve");
	// after the emoji (two UTF-16 units) and the space
	h.editor_edit(point(0, 3), "very ").await.unwrap();
	h.editor_edit(TextRange::new(Position::new(1, 2), Position::new(1, 3)), "i").await.unwrap();
	h.pump().await.unwrap();

	assert_eq!(h.engine_text(), "\u{1F600} very ok\nnaive");
	assert!(h.is_converged());
}

#[tokio::test]
async fn multi_cursor_event_converges() {
	let h = harness("h\u{00E9}llo w\u{00F6}rld\nsecond");
	let span = |line, start, end| TextRange::new(Position::new(line, start), Position::new(line, end));
	let outcome = h
		.editor_edits(&[(span(0, 1, 2), "X"), (point(1, 6), "!"), (span(0, 7, 8), "ZZ")])
		.await
		.unwrap();
	assert!(matches!(outcome, Some(IngestOutcome::Sent { calls: 3, .. })));
	h.pump().await.unwrap();

	assert_eq!(h.engine_text(), "hXllo wZZrld\nsecond!");
	assert!(h.is_converged());
}

#[tokio::test]
async fn crlf_documents_round_trip() {
	init_tracing();
	let h = MemoryHarness::new(SyncConfig::default(), "a\r\nb", Eol::CrLf);
	h.editor_edit(point(0, 1), "\r\nmid").await.unwrap();
	h.engine_edit(2, 3, lines(&["B"]));
	h.pump().await.unwrap();

	assert_eq!(h.editor_text(), "a\r\nmid\r\nB");
	assert!(h.is_converged());
}

#[tokio::test]
async fn closing_a_document_fails_waiters() {
	let h = harness("a");
	h.sync.enqueue_engine_lines(BufferLinesEvent {
		buffer: h.buffer,
		tick: 2,
		first_line: 0,
		last_line: 1,
		lines: lines(&["b"]),
		more: false,
	});
	let waiter = h.sync.wait(h.doc);

	assert!(h.sync.close_document(h.doc));
	assert_eq!(waiter.await, Err(CompletionError::Closed));
	assert!(!h.sync.is_tracked(h.doc));

	let outcome = h.editor_edit(point(0, 1), "x").await.unwrap();
	assert_eq!(outcome, Some(IngestOutcome::Untracked));
}

#[tokio::test]
async fn unlinked_document_is_not_sent() {
	let h = harness("a");
	h.collaborators.unlink(h.doc);
	let outcome = h.editor_edit(point(0, 1), "x").await.unwrap();
	assert_eq!(outcome, Some(IngestOutcome::NoBuffer));
	assert_eq!(h.engine.batch_count(), 0);
}

#[tokio::test]
async fn failed_engine_call_surfaces_as_batch_error() {
	let h = harness("a");
	h.engine.fail_method("nvim_buf_set_text");
	let err = h.editor_edit(point(0, 1), "x").await.unwrap_err();
	assert!(matches!(err, SyncError::Batch { buffer: Some(b), .. } if b == h.buffer));
}

#[tokio::test]
async fn typed_character_goes_through_input() {
	init_tracing();
	let config = SyncConfig {
		input_for_typing: true,
		..SyncConfig::default()
	};
	let h = MemoryHarness::new(config, "ac", Eol::Lf);
	h.set_insert_mode(true);
	h.engine.set_cursor(h.buffer, 0, 1);

	h.editor_edit(point(0, 1), "b").await.unwrap();
	h.pump().await.unwrap();

	assert_eq!(h.engine.inputs(), vec![(h.buffer, "b".to_string())]);
	assert_eq!(h.engine_text(), "abc");
	assert!(h.is_converged());
}

#[tokio::test]
async fn dot_repeat_accumulates_contiguous_typing() {
	let h = harness("x");
	h.set_insert_mode(true);
	for (col, ch) in ["a", "<", "\n"].into_iter().enumerate() {
		h.editor_edit(point(0, 1 + col), ch).await.unwrap();
	}

	let acc = h.sync.dot_repeat().unwrap();
	assert_eq!(acc.document, h.doc);
	assert_eq!(acc.start_offset, 1);
	assert_eq!(acc.deleted_len, 0);
	assert_eq!(acc.inserted, "a<\n");
	assert_eq!(acc.keys(), "a<LT><CR>");
}

#[tokio::test]
async fn dot_repeat_ignores_normal_mode_edits() {
	let h = harness("x");
	h.editor_edit(point(0, 1), "a").await.unwrap();
	assert!(h.sync.dot_repeat().is_none());
	assert!(!h.sync.replay_dot_repeat().await.unwrap());
}

#[tokio::test]
async fn dot_repeat_replays_in_scratch_buffer() {
	let h = harness("hello");
	h.set_insert_mode(true);
	h.editor_edit(TextRange::new(Position::new(0, 3), Position::new(0, 5)), "").await.unwrap();
	h.editor_edit(point(0, 3), "p").await.unwrap();
	h.editor_edit(point(0, 4), "!").await.unwrap();
	h.pump().await.unwrap();
	assert_eq!(h.engine_text(), "help!");

	let window = h.engine.current_window_id();
	let buffers = h.engine.buffer_count();
	assert!(h.sync.replay_dot_repeat().await.unwrap());

	let inputs = h.engine.inputs();
	assert_eq!(inputs.len(), 1);
	assert_ne!(inputs[0].0, h.buffer);
	assert_eq!(inputs[0].1, "<BS><BS>p!");

	assert_eq!(h.engine.buffer_count(), buffers);
	assert_eq!(h.engine.current_window_id(), window);
	assert_eq!(h.engine_text(), "help!");
	assert!(h.sync.dot_repeat().is_none());
}

#[tokio::test]
async fn dot_repeat_backspaces_once_per_character() {
	let h = harness("a\u{1F600}");
	h.set_insert_mode(true);
	// the emoji spans two editor units
	h.editor_edit(TextRange::new(Position::new(0, 1), Position::new(0, 3)), "").await.unwrap();
	h.pump().await.unwrap();
	assert_eq!(h.engine_text(), "a");

	assert!(h.sync.replay_dot_repeat().await.unwrap());
	let inputs = h.engine.inputs();
	assert_eq!(inputs.len(), 1);
	assert_eq!(inputs[0].1, "<BS>");
}

#[tokio::test]
async fn failed_replay_still_releases_scratch() {
	let h = harness("");
	h.set_insert_mode(true);
	h.editor_edit(point(0, 0), "z").await.unwrap();
	h.engine.fail_method("nvim_buf_set_lines");

	let windows = h.engine.window_count();
	let err = h.sync.replay_dot_repeat().await.unwrap_err();
	assert!(matches!(err, SyncError::Batch { .. }));
	assert_eq!(h.engine.window_count(), windows);
	assert_eq!(h.engine.buffer_count(), 1);
	assert!(h.engine.inputs().is_empty());
}

#[tokio::test]
async fn cursor_positions_translate_between_sides() {
	init_tracing();
	let config = SyncConfig {
		tab_size: 4,
		..SyncConfig::default()
	};
	let h = MemoryHarness::new(config, "\tx = \u{00E9}\u{1F600};", Eol::Lf);

	h.editor.set_cursor(h.doc, Position::new(0, 8));
	let engine = h.sync.engine_cursor_position(h.doc);
	// tab, "x = ", é (2 bytes), emoji (4 bytes)
	assert_eq!((engine.line, engine.col), (1, 11));

	assert_eq!(h.sync.editor_position_from_bytes(h.doc, 0, 11), Some(Position::new(0, 8)));
	// the tab spans screen columns 0..4
	assert_eq!(h.sync.editor_position_from_screen(h.doc, 0, 4, false), Some(Position::new(0, 1)));
	assert_eq!(h.sync.editor_position_from_screen(h.doc, 0, 6, false), Some(Position::new(0, 3)));
	assert_eq!(h.sync.editor_position_from_bytes(h.doc, 3, 0), None);

	h.editor.hide(h.doc);
	let fallback = h.sync.engine_cursor_position(h.doc);
	assert_eq!((fallback.line, fallback.col), (1, 0));
}
