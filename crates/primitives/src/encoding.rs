use serde::{Deserialize, Serialize};

/// Unit in which editor-side columns are measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OffsetEncoding {
	/// UTF-8 byte offsets.
	#[serde(rename = "utf-8")]
	Utf8,
	/// UTF-16 code unit offsets (editor default).
	#[default]
	#[serde(rename = "utf-16")]
	Utf16,
	/// UTF-32 / Unicode codepoint offsets.
	#[serde(rename = "utf-32")]
	Utf32,
}

impl OffsetEncoding {
	/// Number of column units a single code point occupies.
	#[inline]
	pub fn unit_len(self, ch: char) -> usize {
		match self {
			Self::Utf8 => ch.len_utf8(),
			Self::Utf16 => ch.len_utf16(),
			Self::Utf32 => 1,
		}
	}

	/// Length of `text` in column units.
	pub fn measure(self, text: &str) -> usize {
		match self {
			Self::Utf8 => text.len(),
			Self::Utf16 => text.chars().map(char::len_utf16).sum(),
			Self::Utf32 => text.chars().count(),
		}
	}

	/// Byte offset into `text` reached after `units` column units.
	///
	/// A unit count landing inside a code point includes that code point.
	/// Counts past the end clamp to `text.len()`.
	pub fn byte_offset(self, text: &str, units: usize) -> usize {
		let mut consumed = 0;
		for (idx, ch) in text.char_indices() {
			if consumed >= units {
				return idx;
			}
			consumed += self.unit_len(ch);
		}
		text.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn measure_astral_code_point() {
		let text = "a\u{1F600}b";
		assert_eq!(OffsetEncoding::Utf8.measure(text), 6);
		assert_eq!(OffsetEncoding::Utf16.measure(text), 4);
		assert_eq!(OffsetEncoding::Utf32.measure(text), 3);
	}

	#[test]
	fn byte_offset_rounds_up_inside_surrogate_pair() {
		let text = "a\u{1F600}b";
		assert_eq!(OffsetEncoding::Utf16.byte_offset(text, 1), 1);
		assert_eq!(OffsetEncoding::Utf16.byte_offset(text, 2), 5);
		assert_eq!(OffsetEncoding::Utf16.byte_offset(text, 3), 5);
		assert_eq!(OffsetEncoding::Utf16.byte_offset(text, 99), 6);
	}
}
