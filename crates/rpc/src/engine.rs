//! Client side of the engine connection.

use async_trait::async_trait;
use serde_json::Value;

use crate::batch::{AtomicBatch, BatchReply};
use crate::call::{BufferId, EngineCall, Tick, WindowId};
use crate::error::{Error, Result};

/// A connection to the text engine.
///
/// Implementors only need [`call_atomic`](Self::call_atomic); single calls
/// and typed helpers are layered on top of it.
#[async_trait]
pub trait TextEngine: Send + Sync {
	/// Executes `batch` without interleaving other clients' calls.
	///
	/// Per-call failures are reported in the reply, not as `Err`. `Err` means
	/// the batch as a whole did not go through.
	async fn call_atomic(&self, batch: &AtomicBatch) -> Result<BatchReply>;

	/// Executes a single call and returns its value.
	async fn request(&self, call: EngineCall) -> Result<Value> {
		let method = call.method();
		let batch = AtomicBatch::new().with(call);
		let reply = self.call_atomic(&batch).await?;
		match reply.outcomes.into_iter().next() {
			Some(Ok(value)) => Ok(value),
			Some(Err(message)) => Err(Error::Call { method, message }),
			None => Err(Error::Protocol(format!("no outcome for {method}"))),
		}
	}

	/// Reads the change counter of `buffer`.
	async fn changed_tick(&self, buffer: BufferId) -> Result<Tick> {
		let value = self.request(EngineCall::BufGetChangedTick { buffer }).await?;
		decode_u64(EngineCall::BufGetChangedTick { buffer }.method(), value)
	}

	/// Reads the focused window.
	async fn current_window(&self) -> Result<WindowId> {
		let value = self.request(EngineCall::GetCurrentWin).await?;
		decode_u64(EngineCall::GetCurrentWin.method(), value).map(WindowId)
	}
}

/// Decodes a handle or counter reply.
pub fn decode_u64(method: &'static str, value: Value) -> Result<u64> {
	value.as_u64().ok_or(Error::UnexpectedReply { method, value })
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use serde_json::json;

	use super::*;

	/// Answers every call with a canned outcome and records what it saw.
	struct Canned {
		outcome: std::result::Result<Value, String>,
		seen: Mutex<Vec<&'static str>>,
	}

	#[async_trait]
	impl TextEngine for Canned {
		async fn call_atomic(&self, batch: &AtomicBatch) -> Result<BatchReply> {
			self.seen.lock().unwrap().extend(batch.calls().iter().map(EngineCall::method));
			Ok(BatchReply {
				outcomes: batch.calls().iter().map(|_| self.outcome.clone()).collect(),
			})
		}
	}

	fn canned(outcome: std::result::Result<Value, String>) -> Canned {
		Canned {
			outcome,
			seen: Mutex::new(Vec::new()),
		}
	}

	#[tokio::test]
	async fn changed_tick_goes_through_one_batch() {
		let engine = canned(Ok(json!(12)));
		assert_eq!(engine.changed_tick(BufferId(1)).await.unwrap(), 12);
		assert_eq!(*engine.seen.lock().unwrap(), vec!["nvim_buf_get_changedtick"]);
	}

	#[tokio::test]
	async fn call_error_names_the_method() {
		let engine = canned(Err("Invalid window id".into()));
		let err = engine.current_window().await.unwrap_err();
		assert!(matches!(err, Error::Call { method: "nvim_get_current_win", .. }));
	}

	#[tokio::test]
	async fn non_numeric_tick_is_unexpected() {
		let engine = canned(Ok(json!("nope")));
		assert!(matches!(
			engine.changed_tick(BufferId(1)).await,
			Err(Error::UnexpectedReply { .. })
		));
	}
}
