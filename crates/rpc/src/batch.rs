//! Atomic batches: several calls executed without interleaving.

use std::fmt;

use serde_json::{Value, json};

use crate::call::EngineCall;
use crate::error::{Error, Result};

/// Result of one call within a batch: its value or the engine's message.
pub type CallOutcome = std::result::Result<Value, String>;

/// Ordered list of calls sent in one round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomicBatch {
	calls: Vec<EngineCall>,
}

impl AtomicBatch {
	/// Creates an empty batch.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a call.
	pub fn push(&mut self, call: EngineCall) -> &mut Self {
		self.calls.push(call);
		self
	}

	/// Builder-style [`push`](Self::push).
	#[must_use]
	pub fn with(mut self, call: EngineCall) -> Self {
		self.calls.push(call);
		self
	}

	/// Number of calls.
	pub fn len(&self) -> usize {
		self.calls.len()
	}

	/// Returns `true` if the batch holds no calls.
	pub fn is_empty(&self) -> bool {
		self.calls.is_empty()
	}

	/// Calls in send order.
	pub fn calls(&self) -> &[EngineCall] {
		&self.calls
	}

	/// Encodes the batch as `[[method, [args...]], ...]`.
	pub fn to_value(&self) -> Value {
		Value::Array(self.calls.iter().map(|call| json!([call.method(), call.args()])).collect())
	}
}

impl FromIterator<EngineCall> for AtomicBatch {
	fn from_iter<I: IntoIterator<Item = EngineCall>>(iter: I) -> Self {
		Self {
			calls: iter.into_iter().collect(),
		}
	}
}

/// Per-call outcomes, parallel to the batch that produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReply {
	/// One entry per call that the engine reached.
	pub outcomes: Vec<CallOutcome>,
}

impl BatchReply {
	/// Reply where every call succeeded with the given values.
	pub fn ok(values: impl IntoIterator<Item = Value>) -> Self {
		Self {
			outcomes: values.into_iter().map(Ok).collect(),
		}
	}

	/// Decodes the engine's `[results, error]` convention.
	///
	/// `results` holds the values of the calls that ran. `error` is `null` or
	/// `[index, kind, message]` naming the call that stopped the batch. Calls
	/// after a failure never ran and have no outcome.
	pub fn from_wire(value: Value, batch_len: usize) -> Result<Self> {
		let unexpected = |value: Value| Error::UnexpectedReply {
			method: "nvim_call_atomic",
			value,
		};
		let Value::Array(mut parts) = value else {
			return Err(unexpected(value));
		};
		if parts.len() != 2 {
			return Err(unexpected(Value::Array(parts)));
		}
		let error = parts.pop().unwrap_or(Value::Null);
		let results = match parts.pop() {
			Some(Value::Array(results)) => results,
			other => return Err(unexpected(other.unwrap_or(Value::Null))),
		};

		let mut outcomes: Vec<CallOutcome> = results.into_iter().map(Ok).collect();
		match error {
			Value::Null => {}
			Value::Array(detail) => {
				let index = detail.first().and_then(Value::as_u64).map(|idx| idx as usize);
				let message = detail.get(2).and_then(Value::as_str).unwrap_or("unknown error").to_string();
				match index {
					Some(idx) if idx == outcomes.len() && idx < batch_len => outcomes.push(Err(message)),
					_ => return Err(unexpected(Value::Array(detail))),
				}
			}
			other => return Err(unexpected(other)),
		}
		if outcomes.len() > batch_len {
			return Err(Error::Protocol(format!(
				"batch of {batch_len} calls produced {} results",
				outcomes.len()
			)));
		}
		Ok(Self { outcomes })
	}

	/// Outcome of the call at `index`, if the engine reached it.
	pub fn get(&self, index: usize) -> Option<&CallOutcome> {
		self.outcomes.get(index)
	}

	/// Failed calls worth reporting. `input` failures are skipped.
	pub fn failures(&self, batch: &AtomicBatch) -> Vec<CallFailure> {
		self.outcomes
			.iter()
			.enumerate()
			.filter_map(|(index, outcome)| {
				let message = outcome.as_ref().err()?;
				let call = batch.calls.get(index)?;
				(!call.failure_is_ignorable()).then(|| CallFailure {
					index,
					method: call.method(),
					message: message.clone(),
				})
			})
			.collect()
	}
}

/// A reportable per-call error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
	/// Position within the batch.
	pub index: usize,
	/// Wire method name.
	pub method: &'static str,
	/// Engine-provided error message.
	pub message: String,
}

impl fmt::Display for CallFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.method, self.message)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::call::BufferId;

	fn batch() -> AtomicBatch {
		AtomicBatch::new()
			.with(EngineCall::Input { keys: "<BS>".into() })
			.with(EngineCall::BufGetChangedTick { buffer: BufferId(1) })
			.with(EngineCall::BufDelete {
				buffer: BufferId(1),
				force: true,
			})
	}

	#[test]
	fn encodes_method_and_args() {
		let batch = AtomicBatch::new().with(EngineCall::GetCurrentWin);
		assert_eq!(batch.to_value(), json!([["nvim_get_current_win", []]]));
	}

	#[test]
	fn failures_skip_input() {
		let reply = BatchReply {
			outcomes: vec![Err("E5108".into()), Ok(json!(4)), Err("E89: no write".into())],
		};
		let failures = reply.failures(&batch());
		assert_eq!(failures.len(), 1);
		assert_eq!(failures[0].index, 2);
		assert_eq!(failures[0].to_string(), "nvim_buf_delete: E89: no write");
	}

	#[test]
	fn wire_reply_with_error_stops_at_failed_call() {
		let reply = BatchReply::from_wire(json!([[null], [1, 0, "Invalid buffer id"]]), 3).unwrap();
		assert_eq!(
			reply.outcomes,
			vec![Ok(Value::Null), Err("Invalid buffer id".to_string())]
		);
		assert!(reply.get(2).is_none());
	}

	#[test]
	fn wire_reply_rejects_garbage() {
		assert!(BatchReply::from_wire(json!({"nope": 1}), 1).is_err());
		assert!(BatchReply::from_wire(json!([[1, 2], null]), 1).is_err());
		assert!(BatchReply::from_wire(json!([[], [5, 0, "x"]]), 1).is_err());
	}
}
