//! In-memory text engine.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use duplex_primitives::Eol;
use duplex_rpc::{AtomicBatch, BatchReply, BufferId, BufferLinesEvent, EngineCall, OptionValue, TextEngine, Tick, WindowId};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// Sequential handle generator.
#[derive(Debug, Default, Clone, Copy)]
struct CounterIdGen(u64);

impl CounterIdGen {
	#[allow(clippy::should_implement_trait, reason = "convention")]
	fn next(&mut self) -> u64 {
		self.0 += 1;
		self.0
	}
}

#[derive(Debug)]
struct MemoryBuffer {
	lines: Vec<String>,
	tick: Tick,
	/// Emits line notifications.
	attached: bool,
	options: HashMap<String, OptionValue>,
}

#[derive(Debug, Clone, Copy)]
struct MemoryWindow {
	buffer: BufferId,
	/// 0-based row, byte column.
	cursor: (usize, usize),
}

#[derive(Debug, Default)]
struct EngineInner {
	ids: CounterIdGen,
	buffers: BTreeMap<BufferId, MemoryBuffer>,
	windows: BTreeMap<WindowId, MemoryWindow>,
	current: Option<WindowId>,
	notifications: Vec<BufferLinesEvent>,
	inputs: Vec<(BufferId, String)>,
	methods: Vec<&'static str>,
	failing: Vec<&'static str>,
	batches: usize,
}

/// Text engine backed by line vectors, speaking the same calls as the real one.
///
/// A batch stops at the first failing call, like the real engine. Attached
/// buffers queue a [`BufferLinesEvent`] per change; collect them with
/// [`take_notifications`](Self::take_notifications).
#[derive(Debug, Default)]
pub struct MemoryEngine {
	inner: Mutex<EngineInner>,
}

impl MemoryEngine {
	/// Creates an empty engine.
	pub fn new() -> Self {
		Self::default()
	}

	/// Loads `text` into a new attached buffer shown in a new window.
	///
	/// The first window created becomes current.
	pub fn add_buffer(&self, text: &str, eol: Eol) -> BufferId {
		let mut inner = self.inner.lock();
		let buffer = BufferId(inner.ids.next());
		inner.buffers.insert(
			buffer,
			MemoryBuffer {
				lines: eol.split(text).into_iter().map(str::to_string).collect(),
				tick: 1,
				attached: true,
				options: HashMap::new(),
			},
		);
		let window = WindowId(inner.ids.next());
		inner.windows.insert(window, MemoryWindow { buffer, cursor: (0, 0) });
		inner.current.get_or_insert(window);
		buffer
	}

	/// Lines of `buffer`.
	pub fn lines(&self, buffer: BufferId) -> Option<Vec<String>> {
		self.inner.lock().buffers.get(&buffer).map(|b| b.lines.clone())
	}

	/// Text of `buffer` joined with `eol`.
	pub fn text(&self, buffer: BufferId, eol: Eol) -> Option<String> {
		self.lines(buffer).map(|lines| eol.join(&lines))
	}

	/// Change counter of `buffer`.
	pub fn tick(&self, buffer: BufferId) -> Option<Tick> {
		self.inner.lock().buffers.get(&buffer).map(|b| b.tick)
	}

	/// Simulates an engine-side change: lines `[first, last)` become `lines`.
	pub fn edit_lines(&self, buffer: BufferId, first: usize, last: usize, lines: Vec<String>) -> Option<Tick> {
		let mut inner = self.inner.lock();
		let target = inner.buffers.get_mut(&buffer)?;
		let start = first.min(target.lines.len());
		let end = last.clamp(start, target.lines.len());
		target.lines.splice(start..end, lines.iter().cloned());
		if target.lines.is_empty() {
			target.lines.push(String::new());
		}
		target.tick += 1;
		let tick = target.tick;
		inner.notifications.push(BufferLinesEvent {
			buffer,
			tick,
			first_line: first,
			last_line: last,
			lines,
			more: false,
		});
		Some(tick)
	}

	/// Places the cursor of the window showing `buffer` (0-based row, byte column).
	pub fn set_cursor(&self, buffer: BufferId, row: usize, col: usize) {
		let mut inner = self.inner.lock();
		let Some((&id, _)) = inner.windows.iter().find(|(_, w)| w.buffer == buffer) else {
			return;
		};
		if let Some(window) = inner.windows.get_mut(&id) {
			window.cursor = (row, col);
		}
		inner.current = Some(id);
	}

	/// Makes every later call of `method` fail.
	pub fn fail_method(&self, method: &'static str) {
		self.inner.lock().failing.push(method);
	}

	/// Drains queued line notifications.
	pub fn take_notifications(&self) -> Vec<BufferLinesEvent> {
		std::mem::take(&mut self.inner.lock().notifications)
	}

	/// Number of queued line notifications.
	pub fn pending_notifications(&self) -> usize {
		self.inner.lock().notifications.len()
	}

	/// Keystrokes received, with the buffer they were typed into.
	pub fn inputs(&self) -> Vec<(BufferId, String)> {
		self.inner.lock().inputs.clone()
	}

	/// Methods called so far, in order.
	pub fn methods(&self) -> Vec<&'static str> {
		self.inner.lock().methods.clone()
	}

	/// Number of atomic batches received.
	pub fn batch_count(&self) -> usize {
		self.inner.lock().batches
	}

	/// Number of live buffers.
	pub fn buffer_count(&self) -> usize {
		self.inner.lock().buffers.len()
	}

	/// Number of live windows.
	pub fn window_count(&self) -> usize {
		self.inner.lock().windows.len()
	}

	/// Focused window.
	pub fn current_window_id(&self) -> Option<WindowId> {
		self.inner.lock().current
	}
}

#[async_trait]
impl TextEngine for MemoryEngine {
	async fn call_atomic(&self, batch: &AtomicBatch) -> duplex_rpc::Result<BatchReply> {
		let mut inner = self.inner.lock();
		inner.batches += 1;
		let mut outcomes = Vec::with_capacity(batch.len());
		for call in batch.calls() {
			inner.methods.push(call.method());
			let outcome = if inner.failing.contains(&call.method()) {
				Err(format!("{} failed", call.method()))
			} else {
				inner.execute(call)
			};
			let failed = outcome.is_err();
			outcomes.push(outcome);
			if failed {
				break;
			}
		}
		Ok(BatchReply { outcomes })
	}
}

type CallResult = Result<Value, String>;

impl EngineInner {
	fn execute(&mut self, call: &EngineCall) -> CallResult {
		match call {
			EngineCall::BufSetText {
				buffer,
				start_line,
				start_col,
				end_line,
				end_col,
				lines,
			} => self.set_text(*buffer, (*start_line, *start_col), (*end_line, *end_col), lines),
			EngineCall::BufGetChangedTick { buffer } => Ok(json!(self.buffer(*buffer)?.tick)),
			EngineCall::Input { keys } => self.input(keys),
			EngineCall::CreateBuf { .. } => {
				let buffer = BufferId(self.ids.next());
				self.buffers.insert(
					buffer,
					MemoryBuffer {
						lines: vec![String::new()],
						tick: 1,
						attached: false,
						options: HashMap::new(),
					},
				);
				Ok(json!(buffer))
			}
			EngineCall::OpenWin { buffer, enter, .. } => {
				self.buffer(*buffer)?;
				let window = WindowId(self.ids.next());
				self.windows.insert(
					window,
					MemoryWindow {
						buffer: *buffer,
						cursor: (0, 0),
					},
				);
				if *enter {
					self.current = Some(window);
				}
				Ok(json!(window))
			}
			EngineCall::SetCurrentWin { window } => {
				self.window(*window)?;
				self.current = Some(*window);
				Ok(Value::Null)
			}
			EngineCall::GetCurrentWin => self.current.map(|w| json!(w)).ok_or_else(|| "no current window".to_string()),
			EngineCall::WinClose { window, .. } => {
				self.windows.remove(window).ok_or_else(|| format!("Invalid window id: {}", window.0))?;
				if self.current == Some(*window) {
					self.current = self.windows.keys().next().copied();
				}
				Ok(Value::Null)
			}
			EngineCall::SetOption { buffer, name, value } => {
				if let Some(buffer) = buffer {
					self.buffer_mut(*buffer)?.options.insert(name.clone(), value.clone());
				}
				Ok(Value::Null)
			}
			EngineCall::BufSetLines {
				buffer,
				start,
				end,
				strict,
				lines,
			} => self.set_lines(*buffer, *start, *end, *strict, lines),
			EngineCall::WinSetCursor { window, line, col } => {
				let buffer = self.window(*window)?.buffer;
				let row_count = self.buffer(buffer)?.lines.len();
				if *line == 0 || *line > row_count {
					return Err("Cursor position outside buffer".into());
				}
				let width = self.buffer(buffer)?.lines[*line - 1].len();
				let id = self.resolve_window(*window)?;
				if let Some(target) = self.windows.get_mut(&id) {
					target.cursor = (*line - 1, (*col).min(width));
				}
				Ok(Value::Null)
			}
			EngineCall::BufDelete { buffer, .. } => {
				self.buffers.remove(buffer).ok_or_else(|| format!("Invalid buffer id: {}", buffer.0))?;
				self.windows.retain(|_, w| w.buffer != *buffer);
				if self.current.is_some_and(|w| !self.windows.contains_key(&w)) {
					self.current = self.windows.keys().next().copied();
				}
				Ok(Value::Null)
			}
		}
	}

	fn buffer(&self, buffer: BufferId) -> Result<&MemoryBuffer, String> {
		self.buffers.get(&buffer).ok_or_else(|| format!("Invalid buffer id: {}", buffer.0))
	}

	fn buffer_mut(&mut self, buffer: BufferId) -> Result<&mut MemoryBuffer, String> {
		self.buffers.get_mut(&buffer).ok_or_else(|| format!("Invalid buffer id: {}", buffer.0))
	}

	fn resolve_window(&self, window: WindowId) -> Result<WindowId, String> {
		let id = if window == WindowId::CURRENT {
			self.current.ok_or_else(|| "no current window".to_string())?
		} else {
			window
		};
		if self.windows.contains_key(&id) {
			Ok(id)
		} else {
			Err(format!("Invalid window id: {}", window.0))
		}
	}

	fn window(&self, window: WindowId) -> Result<MemoryWindow, String> {
		let id = self.resolve_window(window)?;
		self.windows.get(&id).copied().ok_or_else(|| format!("Invalid window id: {}", id.0))
	}

	fn set_text(&mut self, buffer: BufferId, start: (usize, usize), end: (usize, usize), lines: &[String]) -> CallResult {
		let target = self.buffer_mut(buffer)?;
		let (start_line, start_col) = start;
		let (end_line, end_col) = end;
		if start_line >= target.lines.len() || end_line >= target.lines.len() || (end_line, end_col) < (start_line, start_col) {
			return Err("Index out of bounds".into());
		}
		let head = &target.lines[start_line];
		let tail = &target.lines[end_line];
		if start_col > head.len() || !head.is_char_boundary(start_col) || end_col > tail.len() || !tail.is_char_boundary(end_col) {
			return Err("Column value outside range".into());
		}

		let mut replacement: Vec<String> = if lines.is_empty() { vec![String::new()] } else { lines.to_vec() };
		let prefix = head[..start_col].to_string();
		let suffix = tail[end_col..].to_string();
		replacement[0].insert_str(0, &prefix);
		if let Some(last) = replacement.last_mut() {
			last.push_str(&suffix);
		}

		target.lines.splice(start_line..=end_line, replacement.iter().cloned());
		target.tick += 1;
		let (tick, attached) = (target.tick, target.attached);
		if attached {
			self.notifications.push(BufferLinesEvent {
				buffer,
				tick,
				first_line: start_line,
				last_line: end_line + 1,
				lines: replacement,
				more: false,
			});
		}
		Ok(Value::Null)
	}

	fn set_lines(&mut self, buffer: BufferId, start: i64, end: i64, strict: bool, lines: &[String]) -> CallResult {
		let target = self.buffer_mut(buffer)?;
		let len = target.lines.len() as i64;
		let resolve = |idx: i64| if idx < 0 { len + 1 + idx } else { idx };
		let (start, end) = (resolve(start), resolve(end));
		if strict && (start < 0 || end > len || start > end) {
			return Err("Index out of bounds".into());
		}
		let start = start.clamp(0, len) as usize;
		let end = (end.clamp(0, len) as usize).max(start);

		let before = target.lines.clone();
		target.lines.splice(start..end, lines.iter().cloned());
		if target.lines.is_empty() {
			target.lines.push(String::new());
		}
		self.changed(buffer, before);
		Ok(Value::Null)
	}

	/// Types `keys` at the current window's cursor.
	fn input(&mut self, keys: &str) -> CallResult {
		let window_id = self.current.ok_or_else(|| "no current window".to_string())?;
		let window = self.window(window_id)?;
		let buffer = window.buffer;
		self.inputs.push((buffer, keys.to_string()));

		let target = self.buffer_mut(buffer)?;
		let before = target.lines.clone();
		let (mut row, mut col) = window.cursor;
		row = row.min(target.lines.len() - 1);
		col = col.min(target.lines[row].len());

		for key in parse_keys(keys) {
			match key {
				Key::Char(ch) => {
					target.lines[row].insert(col, ch);
					col += ch.len_utf8();
				}
				Key::Enter => {
					let rest = target.lines[row].split_off(col);
					target.lines.insert(row + 1, rest);
					row += 1;
					col = 0;
				}
				Key::Backspace if col > 0 => {
					let line = &mut target.lines[row];
					let prev = line[..col].chars().next_back().map_or(1, char::len_utf8);
					line.replace_range(col - prev..col, "");
					col -= prev;
				}
				Key::Backspace if row > 0 => {
					let line = target.lines.remove(row);
					row -= 1;
					col = target.lines[row].len();
					target.lines[row].push_str(&line);
				}
				Key::Backspace => {}
			}
		}

		if let Some(window) = self.windows.get_mut(&window_id) {
			window.cursor = (row, col);
		}
		self.changed(buffer, before);
		Ok(Value::Null)
	}

	/// Bumps the tick and notifies the minimal line range that differs from `before`.
	fn changed(&mut self, buffer: BufferId, before: Vec<String>) {
		let Some(target) = self.buffers.get_mut(&buffer) else {
			return;
		};
		if target.lines == before {
			return;
		}
		target.tick += 1;
		if !target.attached {
			return;
		}
		let after = &target.lines;
		let prefix = before.iter().zip(after).take_while(|(a, b)| a == b).count();
		let max_suffix = before.len().min(after.len()) - prefix;
		let suffix = before
			.iter()
			.rev()
			.zip(after.iter().rev())
			.take(max_suffix)
			.take_while(|(a, b)| a == b)
			.count();
		self.notifications.push(BufferLinesEvent {
			buffer,
			tick: target.tick,
			first_line: prefix,
			last_line: before.len() - suffix,
			lines: after[prefix..after.len() - suffix].to_vec(),
			more: false,
		});
	}
}

enum Key {
	Char(char),
	Enter,
	Backspace,
}

/// Splits `<CR>`/`<BS>`/`<LT>` notation into keys. Unknown `<...>` sequences are typed literally.
fn parse_keys(keys: &str) -> Vec<Key> {
	let mut out = Vec::new();
	let mut rest = keys;
	while let Some(ch) = rest.chars().next() {
		if ch == '<' {
			let special = [("<CR>", Key::Enter), ("<BS>", Key::Backspace), ("<LT>", Key::Char('<'))]
				.into_iter()
				.find(|(name, _)| rest.starts_with(name));
			if let Some((name, key)) = special {
				out.push(key);
				rest = &rest[name.len()..];
				continue;
			}
		}
		out.push(Key::Char(ch));
		rest = &rest[ch.len_utf8()..];
	}
	out
}
