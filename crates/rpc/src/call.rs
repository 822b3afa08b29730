//! Typed engine calls and their wire encoding.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Engine per-buffer change counter.
pub type Tick = u64;

/// Engine buffer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BufferId(pub u64);

impl BufferId {
	/// The engine's alias for "the current buffer".
	pub const CURRENT: Self = Self(0);
}

/// Engine window handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl WindowId {
	/// The engine's alias for "the current window".
	pub const CURRENT: Self = Self(0);
}

/// Geometry for a floating window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
	/// Grid row of the top-left corner.
	pub row: u32,
	/// Grid column of the top-left corner.
	pub col: u32,
	/// Width in cells.
	pub width: u32,
	/// Height in cells.
	pub height: u32,
}

impl WindowConfig {
	/// Smallest useful window, tucked into the corner.
	pub const TINY: Self = Self {
		row: 0,
		col: 0,
		width: 1,
		height: 1,
	};

	fn to_value(self) -> Value {
		json!({
			"relative": "editor",
			"row": self.row,
			"col": self.col,
			"width": self.width,
			"height": self.height,
			"focusable": true,
			"style": "minimal",
		})
	}
}

/// Value of an engine option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
	/// Boolean option.
	Bool(bool),
	/// Numeric option.
	Int(i64),
	/// String option.
	Str(String),
}

impl From<bool> for OptionValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<i64> for OptionValue {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<&str> for OptionValue {
	fn from(value: &str) -> Self {
		Self::Str(value.to_string())
	}
}

/// One remote method invocation.
///
/// Line numbers are 0-based and byte columns are UTF-8 offsets unless noted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
	/// Replace a byte range of a buffer with `lines`.
	BufSetText {
		/// Target buffer.
		buffer: BufferId,
		/// Start line.
		start_line: usize,
		/// Start byte column.
		start_col: usize,
		/// End line.
		end_line: usize,
		/// End byte column (exclusive).
		end_col: usize,
		/// Replacement, split on line terminators.
		lines: Vec<String>,
	},
	/// Read the buffer's change counter.
	BufGetChangedTick {
		/// Target buffer.
		buffer: BufferId,
	},
	/// Feed raw keystrokes (`<CR>`, `<BS>`, `<LT>` notation).
	Input {
		/// Keystroke string.
		keys: String,
	},
	/// Create a buffer.
	CreateBuf {
		/// Show in the buffer list.
		listed: bool,
		/// Throwaway buffer with no file.
		scratch: bool,
	},
	/// Open a floating window on `buffer`.
	OpenWin {
		/// Buffer shown in the window.
		buffer: BufferId,
		/// Focus the new window.
		enter: bool,
		/// Placement.
		config: WindowConfig,
	},
	/// Focus a window.
	SetCurrentWin {
		/// Window to focus.
		window: WindowId,
	},
	/// Read the focused window.
	GetCurrentWin,
	/// Close a window.
	WinClose {
		/// Window to close.
		window: WindowId,
		/// Discard unsaved changes.
		force: bool,
	},
	/// Set an option, optionally local to one buffer.
	SetOption {
		/// Buffer scope, or global when `None`.
		buffer: Option<BufferId>,
		/// Option name.
		name: String,
		/// New value.
		value: OptionValue,
	},
	/// Replace whole lines `[start, end)`. Negative indices count from the end.
	BufSetLines {
		/// Target buffer.
		buffer: BufferId,
		/// First line.
		start: i64,
		/// Line after the last replaced one.
		end: i64,
		/// Fail on out-of-range indices.
		strict: bool,
		/// Replacement lines.
		lines: Vec<String>,
	},
	/// Move a window's cursor. `line` is 1-based, `col` a byte column.
	WinSetCursor {
		/// Target window.
		window: WindowId,
		/// 1-based line.
		line: usize,
		/// Byte column.
		col: usize,
	},
	/// Delete a buffer.
	BufDelete {
		/// Buffer to delete.
		buffer: BufferId,
		/// Discard unsaved changes.
		force: bool,
	},
}

impl EngineCall {
	/// Wire method name.
	pub fn method(&self) -> &'static str {
		match self {
			Self::BufSetText { .. } => "nvim_buf_set_text",
			Self::BufGetChangedTick { .. } => "nvim_buf_get_changedtick",
			Self::Input { .. } => "nvim_input",
			Self::CreateBuf { .. } => "nvim_create_buf",
			Self::OpenWin { .. } => "nvim_open_win",
			Self::SetCurrentWin { .. } => "nvim_set_current_win",
			Self::GetCurrentWin => "nvim_get_current_win",
			Self::WinClose { .. } => "nvim_win_close",
			Self::SetOption { .. } => "nvim_set_option_value",
			Self::BufSetLines { .. } => "nvim_buf_set_lines",
			Self::WinSetCursor { .. } => "nvim_win_set_cursor",
			Self::BufDelete { .. } => "nvim_buf_delete",
		}
	}

	/// Positional arguments as JSON-compatible values.
	pub fn args(&self) -> Vec<Value> {
		match self {
			Self::BufSetText {
				buffer,
				start_line,
				start_col,
				end_line,
				end_col,
				lines,
			} => vec![
				json!(buffer),
				json!(start_line),
				json!(start_col),
				json!(end_line),
				json!(end_col),
				json!(lines),
			],
			Self::BufGetChangedTick { buffer } => vec![json!(buffer)],
			Self::Input { keys } => vec![json!(keys)],
			Self::CreateBuf { listed, scratch } => vec![json!(listed), json!(scratch)],
			Self::OpenWin { buffer, enter, config } => vec![json!(buffer), json!(enter), config.to_value()],
			Self::SetCurrentWin { window } => vec![json!(window)],
			Self::GetCurrentWin => Vec::new(),
			Self::WinClose { window, force } => vec![json!(window), json!(force)],
			Self::SetOption { buffer, name, value } => {
				let opts = match buffer {
					Some(buffer) => json!({ "buf": buffer }),
					None => json!({ "scope": "global" }),
				};
				vec![json!(name), json!(value), opts]
			}
			Self::BufSetLines {
				buffer,
				start,
				end,
				strict,
				lines,
			} => vec![json!(buffer), json!(start), json!(end), json!(strict), json!(lines)],
			Self::WinSetCursor { window, line, col } => vec![json!(window), json!([line, col])],
			Self::BufDelete { buffer, force } => vec![json!(buffer), json!({ "force": force })],
		}
	}

	/// Whether a failure of this call is expected noise.
	///
	/// `nvim_input` reports errors for keys the engine merely queued.
	pub fn failure_is_ignorable(&self) -> bool {
		matches!(self, Self::Input { .. })
	}
}
