//! Minimal text patches between two snapshots.
//!
//! [`diff`] runs a Myers diff over the characters of both texts and merges
//! every run of deletions/insertions into one [`PatchOp`]. All positions refer
//! to the *old* text, so the whole patch can be handed to an editor that
//! applies a batch of edits against the pre-edit document.

use std::ops::Range;
use std::time::Duration;

use similar::{Algorithm, DiffTag, TextDiff};

use crate::encoding::OffsetEncoding;
use crate::position::{Eol, Position, TextRange};

/// A single edit against the old text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOp {
	/// Insert `text` at a point.
	Insert {
		/// Insertion point.
		at: Position,
		/// Inserted text.
		text: String,
	},
	/// Remove a range.
	Delete {
		/// Removed range.
		range: TextRange,
	},
	/// Replace a range with `text`.
	Replace {
		/// Replaced range.
		range: TextRange,
		/// Replacement text.
		text: String,
	},
}

impl PatchOp {
	/// Range of old text this op covers (empty for inserts).
	pub fn range(&self) -> TextRange {
		match self {
			Self::Insert { at, .. } => TextRange::point(*at),
			Self::Delete { range } | Self::Replace { range, .. } => *range,
		}
	}

	/// Text this op writes (empty for deletes).
	pub fn text(&self) -> &str {
		match self {
			Self::Insert { text, .. } | Self::Replace { text, .. } => text,
			Self::Delete { .. } => "",
		}
	}

	fn from_parts(range: TextRange, text: String) -> Self {
		if range.is_empty() {
			Self::Insert { at: range.start, text }
		} else if text.is_empty() {
			Self::Delete { range }
		} else {
			Self::Replace { range, text }
		}
	}
}

/// Tuning for [`diff_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOptions {
	/// Upper bound on diff time. Past it the patch is still exact but may be
	/// larger than minimal.
	pub timeout: Option<Duration>,
}

/// Computes the patch turning `old` into `new`.
pub fn diff(old: &str, new: &str, eol: Eol, encoding: OffsetEncoding) -> Vec<PatchOp> {
	diff_with(old, new, eol, encoding, &DiffOptions::default())
}

/// Computes the patch turning `old` into `new` with explicit options.
pub fn diff_with(old: &str, new: &str, eol: Eol, encoding: OffsetEncoding, options: &DiffOptions) -> Vec<PatchOp> {
	if old == new {
		return Vec::new();
	}

	let mut config = TextDiff::configure();
	config.algorithm(Algorithm::Myers);
	if let Some(timeout) = options.timeout {
		config.timeout(timeout);
	}
	let text_diff = config.diff_chars(old, new);

	let old_chars = char_boundaries(old);
	let new_chars = char_boundaries(new);
	let lines = LineMap::new(old, eol, encoding);

	let mut ops = Vec::new();
	let mut hunk: Option<(Range<usize>, Range<usize>)> = None;
	let flush = |hunk: (Range<usize>, Range<usize>), ops: &mut Vec<PatchOp>| {
		let (old_range, new_range) = hunk;
		let range = TextRange::new(
			lines.position_at(old_chars[old_range.start]),
			lines.position_at(old_chars[old_range.end]),
		);
		let text = new[new_chars[new_range.start]..new_chars[new_range.end]].to_string();
		ops.push(PatchOp::from_parts(range, text));
	};

	for op in text_diff.ops() {
		let (tag, old_range, new_range) = op.as_tag_tuple();
		if tag == DiffTag::Equal {
			if let Some(done) = hunk.take() {
				flush(done, &mut ops);
			}
			continue;
		}
		hunk = Some(match hunk.take() {
			Some((prev_old, prev_new)) => (prev_old.start..old_range.end, prev_new.start..new_range.end),
			None => (old_range, new_range),
		});
	}
	if let Some(done) = hunk.take() {
		flush(done, &mut ops);
	}

	ops
}

/// Applies `ops` (positions relative to `old`, in order) and returns the new text.
///
/// Overlapping ops are clamped so later ops never rewrite text an earlier op
/// already consumed.
pub fn apply_patch(old: &str, ops: &[PatchOp], eol: Eol, encoding: OffsetEncoding) -> String {
	let lines = LineMap::new(old, eol, encoding);
	let mut out = String::with_capacity(old.len());
	let mut cursor = 0;
	for op in ops {
		let range = op.range();
		let start = lines.offset_at(range.start).max(cursor);
		let end = lines.offset_at(range.end).max(start);
		out.push_str(&old[cursor..start]);
		out.push_str(op.text());
		cursor = end;
	}
	out.push_str(&old[cursor..]);
	out
}

/// Byte offset of every char plus a trailing `text.len()`.
fn char_boundaries(text: &str) -> Vec<usize> {
	text.char_indices().map(|(idx, _)| idx).chain(std::iter::once(text.len())).collect()
}

/// Maps byte offsets to positions and back for one text.
struct LineMap<'a> {
	text: &'a str,
	/// Byte offset where each line starts.
	starts: Vec<usize>,
	encoding: OffsetEncoding,
}

impl<'a> LineMap<'a> {
	fn new(text: &'a str, eol: Eol, encoding: OffsetEncoding) -> Self {
		let terminator = eol.as_str();
		let starts = std::iter::once(0)
			.chain(text.match_indices(terminator).map(|(idx, _)| idx + terminator.len()))
			.collect();
		Self { text, starts, encoding }
	}

	fn position_at(&self, byte: usize) -> Position {
		let line = self.starts.partition_point(|&start| start <= byte).saturating_sub(1);
		let start = self.starts[line];
		Position::new(line, self.encoding.measure(&self.text[start..byte]))
	}

	fn offset_at(&self, pos: Position) -> usize {
		let Some(&start) = self.starts.get(pos.line) else {
			return self.text.len();
		};
		let end = self.starts.get(pos.line + 1).copied().unwrap_or(self.text.len());
		start + self.encoding.byte_offset(&self.text[start..end], pos.character)
	}
}

#[cfg(test)]
mod tests;
