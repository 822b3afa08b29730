use serde::{Deserialize, Serialize};

/// Editor-side position in line/column coordinates.
///
/// Columns are measured in the surface's [`OffsetEncoding`](crate::OffsetEncoding) units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
	/// Zero-based line index.
	pub line: usize,
	/// Zero-based column in the line.
	pub character: usize,
}

impl Position {
	/// Creates a new position.
	pub const fn new(line: usize, character: usize) -> Self {
		Self { line, character }
	}
}

/// Half-open range between two positions, `end` exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
	/// Start position (inclusive).
	pub start: Position,
	/// End position (exclusive).
	pub end: Position,
}

impl TextRange {
	/// Creates a new range.
	pub const fn new(start: Position, end: Position) -> Self {
		Self { start, end }
	}

	/// Creates a zero-length range at a position.
	pub const fn point(pos: Position) -> Self {
		Self { start: pos, end: pos }
	}

	/// Returns true if the range covers no text.
	pub fn is_empty(&self) -> bool {
		self.start == self.end
	}
}

/// A single-cursor selection.
///
/// `anchor` stays put while `active` follows the cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
	/// The fixed end.
	pub anchor: Position,
	/// The moving end (cursor position).
	pub active: Position,
}

impl Selection {
	/// Creates a collapsed selection at `pos`.
	pub const fn cursor(pos: Position) -> Self {
		Self { anchor: pos, active: pos }
	}

	/// Returns true if anchor and active coincide.
	pub fn is_empty(&self) -> bool {
		self.anchor == self.active
	}
}

/// Line terminator of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eol {
	/// `\n`
	#[default]
	Lf,
	/// `\r\n`
	CrLf,
}

impl Eol {
	/// The terminator text.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Lf => "\n",
			Self::CrLf => "\r\n",
		}
	}

	/// Picks `CrLf` when the text contains any `\r\n`, `Lf` otherwise.
	pub fn detect(text: &str) -> Self {
		if text.contains("\r\n") {
			Self::CrLf
		} else {
			Self::Lf
		}
	}

	/// Splits `text` into lines on this terminator.
	///
	/// Always yields at least one (possibly empty) line.
	pub fn split(self, text: &str) -> Vec<&str> {
		text.split(self.as_str()).collect()
	}

	/// Joins lines with this terminator.
	pub fn join<S: AsRef<str>>(self, lines: &[S]) -> String {
		let mut out = String::new();
		for (idx, line) in lines.iter().enumerate() {
			if idx > 0 {
				out.push_str(self.as_str());
			}
			out.push_str(line.as_ref());
		}
		out
	}
}

/// Engine-side cursor: 1-based line, 0-based byte column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnginePosition {
	/// One-based line number.
	pub line: usize,
	/// Zero-based byte column.
	pub col: usize,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn eol_detect() {
		assert_eq!(Eol::detect("a\nb"), Eol::Lf);
		assert_eq!(Eol::detect("a\r\nb"), Eol::CrLf);
		assert_eq!(Eol::detect(""), Eol::Lf);
	}

	#[test]
	fn split_keeps_trailing_empty_line() {
		assert_eq!(Eol::Lf.split("a\nb\n"), vec!["a", "b", ""]);
		assert_eq!(Eol::CrLf.split("a\r\nb"), vec!["a", "b"]);
		assert_eq!(Eol::Lf.split(""), vec![""]);
	}

	#[test]
	fn join_inverts_split() {
		let text = "one\r\ntwo\r\n\r\nthree";
		assert_eq!(Eol::CrLf.join(&Eol::CrLf.split(text)), text);
	}

	#[test]
	fn selection_emptiness() {
		let sel = Selection::cursor(Position::new(1, 2));
		assert!(sel.is_empty());
		let sel = Selection {
			anchor: Position::new(0, 0),
			active: Position::new(0, 3),
		};
		assert!(!sel.is_empty());
	}
}
