//! Inbound buffer change notification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::call::{BufferId, Tick};
use crate::error::{Error, Result};

/// `nvim_buf_lines_event`: lines `[first_line, last_line)` were replaced by `lines`.
///
/// `last_line` may exceed the buffer's line count when the change appends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferLinesEvent {
	/// Changed buffer.
	pub buffer: BufferId,
	/// Buffer tick after the change.
	pub tick: Tick,
	/// First replaced line.
	pub first_line: usize,
	/// Line after the last replaced one.
	pub last_line: usize,
	/// Replacement lines.
	pub lines: Vec<String>,
	/// More events for the same change follow.
	pub more: bool,
}

impl BufferLinesEvent {
	/// Wire event name.
	pub const METHOD: &'static str = "nvim_buf_lines_event";

	/// Decodes the positional payload `[buf, tick, first, last, lines, more]`.
	///
	/// The engine sends `null` for the tick when only the line data changed; it
	/// decodes as tick 0.
	pub fn from_args(args: &[Value]) -> Result<Self> {
		let bad = || Error::UnexpectedReply {
			method: Self::METHOD,
			value: Value::Array(args.to_vec()),
		};
		let [buffer, tick, first, last, lines, more] = args else {
			return Err(bad());
		};
		let index = |value: &Value| value.as_u64().map(|n| n as usize).ok_or_else(bad);
		let lines = lines
			.as_array()
			.ok_or_else(bad)?
			.iter()
			.map(|line| line.as_str().map(str::to_string).ok_or_else(bad))
			.collect::<Result<Vec<_>>>()?;

		Ok(Self {
			buffer: BufferId(buffer.as_u64().ok_or_else(bad)?),
			tick: if tick.is_null() { 0 } else { tick.as_u64().ok_or_else(bad)? },
			first_line: index(first)?,
			last_line: index(last)?,
			lines,
			more: more.as_bool().ok_or_else(bad)?,
		})
	}

	/// An empty splice, sent by the engine after some undo operations.
	pub fn is_empty_change(&self) -> bool {
		self.first_line == self.last_line && self.lines.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	#[test]
	fn decodes_positional_payload() {
		let args = [json!(2), json!(9), json!(1), json!(2), json!(["x", ""]), json!(false)];
		let event = BufferLinesEvent::from_args(&args).unwrap();
		assert_eq!(
			event,
			BufferLinesEvent {
				buffer: BufferId(2),
				tick: 9,
				first_line: 1,
				last_line: 2,
				lines: vec!["x".into(), String::new()],
				more: false,
			}
		);
	}

	#[test]
	fn rejects_short_or_mistyped_payloads() {
		assert!(BufferLinesEvent::from_args(&[json!(1)]).is_err());
		let args = [json!(2), json!(9), json!(1), json!(2), json!([3]), json!(false)];
		assert!(BufferLinesEvent::from_args(&args).is_err());
	}

	#[test]
	fn empty_change_detection() {
		let args = [json!(1), json!(3), json!(4), json!(4), json!([]), json!(false)];
		assert!(BufferLinesEvent::from_args(&args).unwrap().is_empty_change());
	}
}
