//! Public entry point tying both directions together.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use duplex_primitives::{EnginePosition, Eol, Position, byte_to_char, screen_col_to_char, to_engine_position};
use duplex_rpc::{BufferId, BufferLinesEvent, TextEngine};
use parking_lot::Mutex;
use tracing::debug;

use crate::applier::{Acceptance, DrainReport};
use crate::completion::{CompletionGate, CompletionResult};
use crate::config::SyncConfig;
use crate::dot_repeat::{DotRepeatAccumulator, DotRepeatRecorder};
use crate::echo::EchoGuard;
use crate::error::Result;
use crate::ids::DocumentId;
use crate::ingest::IngestOutcome;
use crate::registry::DocumentRegistry;
use crate::surface::{ChangeEvent, Collaborators, EditorSurface};

/// Synchronous state shared by both directions. Never held across `.await`.
#[derive(Debug, Default)]
pub(crate) struct SyncState {
	pub registry: DocumentRegistry,
	pub echo: EchoGuard,
	pub completion: CompletionGate,
	pub queue: VecDeque<BufferLinesEvent>,
	pub recorder: DotRepeatRecorder,
}

pub(crate) struct SyncCore {
	pub config: SyncConfig,
	pub surface: Arc<dyn EditorSurface>,
	pub engine: Arc<dyn TextEngine>,
	pub collaborators: Arc<dyn Collaborators>,
	pub state: Mutex<SyncState>,
	/// Serializes editor → engine processing.
	pub ingest_lock: tokio::sync::Mutex<()>,
	/// Set while a remote drain loop runs.
	pub draining: AtomicBool,
}

impl SyncCore {
	/// Cursor of the first visible view of `doc`.
	pub(crate) fn live_cursor(&self, doc: DocumentId) -> Option<Position> {
		let view = self.surface.visible_view(doc)?;
		self.surface.selection(view).map(|selection| selection.active)
	}
}

/// Bidirectional document synchronization between an editor and the engine.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct DocumentSync {
	core: Arc<SyncCore>,
}

impl std::fmt::Debug for DocumentSync {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.core.state.lock();
		f.debug_struct("DocumentSync")
			.field("documents", &state.registry.len())
			.field("queued", &state.queue.len())
			.field("draining", &self.core.draining.load(Ordering::Acquire))
			.finish()
	}
}

impl DocumentSync {
	/// Creates a sync core over the given editor, engine and host services.
	pub fn new(
		config: SyncConfig,
		surface: Arc<dyn EditorSurface>,
		engine: Arc<dyn TextEngine>,
		collaborators: Arc<dyn Collaborators>,
	) -> Self {
		Self {
			core: Arc::new(SyncCore {
				config,
				surface,
				engine,
				collaborators,
				state: Mutex::new(SyncState::default()),
				ingest_lock: tokio::sync::Mutex::new(()),
				draining: AtomicBool::new(false),
			}),
		}
	}

	/// Active configuration.
	pub fn config(&self) -> &SyncConfig {
		&self.core.config
	}

	/// Starts tracking `doc` with the content the engine buffer was loaded with.
	pub fn open_document(&self, doc: DocumentId, text: impl Into<String>, eol: Eol) {
		debug!(doc_id = doc.0, "sync.doc_open");
		self.core.state.lock().registry.open(doc, text.into(), eol);
	}

	/// Stops tracking `doc`. Waiters on it fail with
	/// [`CompletionError::Closed`](crate::CompletionError::Closed).
	pub fn close_document(&self, doc: DocumentId) -> bool {
		debug!(doc_id = doc.0, "sync.doc_close");
		let mut state = self.core.state.lock();
		state.echo.forget_document(doc);
		state.completion.close(doc);
		state.registry.close(doc).is_some()
	}

	/// Drops tick state of a deleted engine buffer.
	pub fn forget_buffer(&self, buffer: BufferId) {
		self.core.state.lock().echo.forget_buffer(buffer);
	}

	/// Returns `true` if `doc` is tracked.
	pub fn is_tracked(&self, doc: DocumentId) -> bool {
		self.core.state.lock().registry.contains(doc)
	}

	/// Content of `doc` as last known to the engine.
	pub fn snapshot(&self, doc: DocumentId) -> Option<String> {
		self.core.state.lock().registry.get(doc).map(|entry| entry.snapshot.clone())
	}

	/// Mirrors an editor change event into the engine.
	pub async fn on_editor_change(&self, event: ChangeEvent) -> Result<IngestOutcome> {
		self.core.ingest(event).await
	}

	/// Queues an engine notification without applying it.
	///
	/// Call [`flush_remote`](Self::flush_remote) to apply queued notifications.
	pub fn enqueue_engine_lines(&self, event: BufferLinesEvent) -> Acceptance {
		self.core.accept(event)
	}

	/// Queues an engine notification and starts a drain on the current tokio
	/// runtime unless one is already running.
	pub fn on_engine_lines(&self, event: BufferLinesEvent) -> Acceptance {
		let acceptance = self.core.accept(event);
		if acceptance.is_queued() && !self.is_draining() {
			let core = Arc::clone(&self.core);
			tokio::spawn(async move {
				core.drain().await;
			});
		}
		acceptance
	}

	/// Applies every queued engine notification.
	///
	/// Returns immediately with an empty report if another drain is running;
	/// that drain picks up everything queued.
	pub async fn flush_remote(&self) -> DrainReport {
		self.core.drain().await
	}

	/// Returns `true` while a drain loop runs.
	pub fn is_draining(&self) -> bool {
		self.core.draining.load(Ordering::Acquire)
	}

	/// Resolves once every remote change pending now for `doc` is applied.
	pub fn wait(&self, doc: DocumentId) -> impl Future<Output = CompletionResult> + Send + use<> {
		self.core.state.lock().completion.wait(doc)
	}

	/// Returns `true` if remote changes for `doc` are pending.
	pub fn has_pending(&self, doc: DocumentId) -> bool {
		self.core.state.lock().completion.has_pending(doc)
	}

	/// Returns and clears the cursor left by the last remote apply on `doc`.
	pub fn consume_last_cursor(&self, doc: DocumentId) -> Option<Position> {
		self.core.state.lock().completion.consume_last_cursor(doc)
	}

	/// Engine position of the editor cursor in `doc`.
	///
	/// Falls back to the top of the buffer when the document has no view.
	pub fn engine_cursor_position(&self, doc: DocumentId) -> EnginePosition {
		let fallback = EnginePosition { line: 1, col: 0 };
		let (Some(cursor), Some(live)) = (self.core.live_cursor(doc), self.core.surface.document(doc)) else {
			return fallback;
		};
		let lines = live.eol.split(&live.text);
		match lines.get(cursor.line) {
			Some(line) => to_engine_position(line, cursor, self.core.config.encoding),
			None => fallback,
		}
	}

	/// Editor position of an engine cursor at 0-based `line` and byte column `byte_col`.
	pub fn editor_position_from_bytes(&self, doc: DocumentId, line: usize, byte_col: usize) -> Option<Position> {
		let encoding = self.core.config.encoding;
		self.with_snapshot_line(doc, line, |text| byte_to_char(text, byte_col, encoding))
			.map(|character| Position::new(line, character))
	}

	/// Editor position of an engine screen column on 0-based `line`.
	///
	/// Tabs expand to the configured tab size. With `use_bytes`, other
	/// characters count their UTF-8 length instead of their display width.
	pub fn editor_position_from_screen(&self, doc: DocumentId, line: usize, screen_col: usize, use_bytes: bool) -> Option<Position> {
		let config = &self.core.config;
		self.with_snapshot_line(doc, line, |text| screen_col_to_char(text, screen_col, config.tab_size, use_bytes, config.encoding))
			.map(|character| Position::new(line, character))
	}

	fn with_snapshot_line<T>(&self, doc: DocumentId, line: usize, f: impl FnOnce(&str) -> T) -> Option<T> {
		let state = self.core.state.lock();
		let entry = state.registry.get(doc)?;
		entry.eol.split(&entry.snapshot).get(line).map(|text| f(text))
	}

	/// The edit dot-repeat would replay.
	pub fn dot_repeat(&self) -> Option<DotRepeatAccumulator> {
		self.core.state.lock().recorder.current().cloned()
	}

	/// Forgets the recorded dot-repeat edit.
	pub fn clear_dot_repeat(&self) {
		self.core.state.lock().recorder.clear();
	}

	/// Replays the recorded edit inside the engine.
	///
	/// Returns `false` when nothing was recorded.
	pub async fn replay_dot_repeat(&self) -> Result<bool> {
		self.core.replay_dot_repeat().await
	}
}
