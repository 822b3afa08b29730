//! Per-line column translation.
//!
//! Every function here is total: columns past the end of a line clamp (or, for
//! [`byte_to_char`], extrapolate) instead of failing, since the editor and the
//! engine can be transiently out of sync while edits are in flight.

use unicode_width::UnicodeWidthChar;

use crate::encoding::OffsetEncoding;
use crate::position::{EnginePosition, Position};

/// Converts an editor column to a UTF-8 byte column within `line`.
///
/// A column inside a code point (e.g. between the halves of a UTF-16
/// surrogate pair) counts the whole code point. Columns past the end clamp
/// to `line.len()`.
pub fn char_to_byte(line: &str, col: usize, encoding: OffsetEncoding) -> usize {
	if col == 0 || line.is_empty() {
		return 0;
	}

	let mut units = 0;
	let mut bytes = 0;
	for ch in line.chars() {
		if units >= col {
			break;
		}
		units += encoding.unit_len(ch);
		bytes += ch.len_utf8();
	}
	bytes
}

/// Converts a UTF-8 byte column within `line` to an editor column.
///
/// A byte column inside a code point counts that code point. Byte columns
/// past the end extrapolate one column per excess byte.
pub fn byte_to_char(line: &str, byte_col: usize, encoding: OffsetEncoding) -> usize {
	let mut bytes = 0;
	let mut units = 0;
	let mut chars = line.chars();
	while bytes < byte_col {
		let Some(ch) = chars.next() else {
			return units + (byte_col - bytes);
		};
		bytes += ch.len_utf8();
		units += encoding.unit_len(ch);
	}
	units
}

/// Converts an engine screen column to an editor column within `line`.
///
/// Tabs advance to the next multiple of `tab_size`. Other characters take
/// their display width, or their UTF-8 length when `use_bytes` is set.
pub fn screen_col_to_char(line: &str, screen_col: usize, tab_size: usize, use_bytes: bool, encoding: OffsetEncoding) -> usize {
	if screen_col == 0 || line.is_empty() {
		return 0;
	}

	let tab_size = tab_size.max(1);
	let mut screen = 0;
	let mut units = 0;
	for ch in line.chars() {
		if screen >= screen_col {
			break;
		}
		screen += match ch {
			'\t' => tab_size - (screen % tab_size),
			_ if use_bytes => ch.len_utf8(),
			_ => ch.width().unwrap_or(0),
		};
		units += encoding.unit_len(ch);
	}
	units
}

/// Converts an editor position on `line_text` to the engine's cursor convention.
pub fn to_engine_position(line_text: &str, pos: Position, encoding: OffsetEncoding) -> EnginePosition {
	EnginePosition {
		line: pos.line + 1,
		col: char_to_byte(line_text, pos.character, encoding),
	}
}
