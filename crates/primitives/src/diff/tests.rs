use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

const UTF16: OffsetEncoding = OffsetEncoding::Utf16;

fn range(sl: usize, sc: usize, el: usize, ec: usize) -> TextRange {
	TextRange::new(Position::new(sl, sc), Position::new(el, ec))
}

#[test]
fn identical_texts_produce_no_ops() {
	assert!(diff("same\ntext", "same\ntext", Eol::Lf, UTF16).is_empty());
}

#[test]
fn single_char_replace_on_second_line() {
	let ops = diff("ab\ncd", "ab\ncX", Eol::Lf, UTF16);
	assert_eq!(
		ops,
		vec![PatchOp::Replace {
			range: range(1, 1, 1, 2),
			text: "X".into(),
		}]
	);
}

#[test]
fn pure_insert_and_delete_shapes() {
	let ops = diff("hello world", "hello brave world", Eol::Lf, UTF16);
	assert_eq!(
		ops,
		vec![PatchOp::Insert {
			at: Position::new(0, 6),
			text: "brave ".into(),
		}]
	);

	let ops = diff("one\ntwo\nthree", "one\nthree", Eol::Lf, UTF16);
	assert_eq!(ops.len(), 1);
	assert!(matches!(ops[0], PatchOp::Delete { .. }));
	assert_eq!(apply_patch("one\ntwo\nthree", &ops, Eol::Lf, UTF16), "one\nthree");
}

#[test]
fn columns_follow_encoding() {
	let old = "\u{1F600}a";
	let new = "\u{1F600}b";
	let utf16 = diff(old, new, Eol::Lf, UTF16);
	assert_eq!(utf16[0].range(), range(0, 2, 0, 3));
	let utf32 = diff(old, new, Eol::Lf, OffsetEncoding::Utf32);
	assert_eq!(utf32[0].range(), range(0, 1, 0, 2));
	let utf8 = diff(old, new, Eol::Lf, OffsetEncoding::Utf8);
	assert_eq!(utf8[0].range(), range(0, 4, 0, 5));
}

#[test]
fn crlf_positions_count_whole_terminators() {
	let old = "ab\r\ncd\r\nef";
	let new = "ab\r\ncd\r\neF";
	let ops = diff(old, new, Eol::CrLf, UTF16);
	assert_eq!(
		ops,
		vec![PatchOp::Replace {
			range: range(2, 1, 2, 2),
			text: "F".into(),
		}]
	);
}

#[test]
fn multi_hunk_patch_is_ordered() {
	let old = "alpha\nbeta\ngamma";
	let new = "Alpha\nbeta\ngammas";
	let ops = diff(old, new, Eol::Lf, UTF16);
	assert_eq!(ops.len(), 2);
	assert!(ops[0].range().start < ops[1].range().start);
	assert_eq!(apply_patch(old, &ops, Eol::Lf, UTF16), new);
}

#[test]
fn timeout_still_yields_exact_patch() {
	let old = "x".repeat(200) + "\n" + &"y".repeat(200);
	let new = "y".repeat(200) + "\n" + &"x".repeat(200);
	let options = DiffOptions {
		timeout: Some(Duration::from_nanos(1)),
	};
	let ops = diff_with(&old, &new, Eol::Lf, UTF16, &options);
	assert_eq!(apply_patch(&old, &ops, Eol::Lf, UTF16), new);
}

fn text_strategy(alphabet: Vec<char>) -> impl Strategy<Value = String> {
	prop::collection::vec(prop::sample::select(alphabet), 0..32).prop_map(|chars| chars.into_iter().collect())
}

proptest! {
	#[test]
	fn round_trip_lf(
		old in text_strategy(vec!['a', 'b', '\n', '\u{00E9}', '\u{1F600}']),
		new in text_strategy(vec!['a', 'b', '\n', '\u{00E9}', '\u{1F600}']),
	) {
		for encoding in [OffsetEncoding::Utf8, OffsetEncoding::Utf16, OffsetEncoding::Utf32] {
			let ops = diff(&old, &new, Eol::Lf, encoding);
			prop_assert_eq!(apply_patch(&old, &ops, Eol::Lf, encoding), new.clone());
		}
	}

	#[test]
	fn round_trip_crlf(
		old in text_strategy(vec!['a', '\r', '\n', '\u{65E5}']),
		new in text_strategy(vec!['a', '\r', '\n', '\u{65E5}']),
	) {
		let ops = diff(&old, &new, Eol::CrLf, UTF16);
		prop_assert_eq!(apply_patch(&old, &ops, Eol::CrLf, UTF16), new);
	}

	#[test]
	fn ops_never_touch_adjacent_ranges(
		old in text_strategy(vec!['a', 'b', '\n']),
		new in text_strategy(vec!['a', 'b', '\n']),
	) {
		let ops = diff(&old, &new, Eol::Lf, UTF16);
		for pair in ops.windows(2) {
			prop_assert!(pair[0].range().end < pair[1].range().start);
		}
	}
}
