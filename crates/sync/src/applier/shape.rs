//! Replays engine line events onto a line array.

/// Applies one `[first, last) → data` line event to `lines`.
///
/// The engine emits five shapes:
/// 1. line cleared: `last == first + 1`, `data == [""]`
/// 2. several empty lines removed: `last > first + 1`, `data == [""]`;
///    `first` survives as an empty line
/// 3. lines deleted: `first != last`, `data == []`
/// 4. lines inserted: `first == last`
/// 5. lines replaced: anything else
///
/// `last` may point past the end of `lines`; indices are clamped. When the
/// event starts past the end (appending after the last line), a blank line
/// is prefixed so the data does not merge into the current last line.
pub fn apply_lines_event(lines: &mut Vec<String>, first: usize, last: usize, data: &[String]) {
	let blank = matches!(data, [only] if only.is_empty());

	if first != last && last == first + 1 && blank {
		if let Some(line) = lines.get_mut(first) {
			line.clear();
		}
	} else if first != last && blank {
		remove_lines(lines, first, last - first - 1);
		if let Some(line) = lines.get_mut(first) {
			line.clear();
		}
	} else if first != last && data.is_empty() {
		remove_lines(lines, first, last - first);
	} else if first == last {
		let at = first.min(lines.len());
		let prefix = (first > lines.len()).then(String::new);
		lines.splice(at..at, prefix.into_iter().chain(data.iter().cloned()));
	} else {
		let start = first.min(lines.len());
		let end = last.clamp(start, lines.len());
		let prefix = (first >= lines.len()).then(String::new);
		lines.splice(start..end, prefix.into_iter().chain(data.iter().cloned()));
	}
}

fn remove_lines(lines: &mut Vec<String>, at: usize, count: usize) {
	let start = at.min(lines.len());
	let end = (at + count).min(lines.len());
	lines.drain(start..end);
}
