//! Error types for engine calls.

use serde_json::Value;

/// A convenient type alias for `Result` with `E` = [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible errors talking to the engine.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The connection to the engine is gone.
	#[error("engine connection closed")]
	Closed,
	/// The engine rejected a single call.
	#[error("{method} failed: {message}")]
	Call {
		/// Wire method name.
		method: &'static str,
		/// Engine-provided error message.
		message: String,
	},
	/// The engine answered with a value of the wrong shape.
	#[error("unexpected reply to {method}: {value}")]
	UnexpectedReply {
		/// Wire method name.
		method: &'static str,
		/// The reply as received.
		value: Value,
	},
	/// The peer violated the calling convention.
	#[error("protocol error: {0}")]
	Protocol(String),
}
