//! Error types for the sync core.

use duplex_rpc::BufferId;

/// A convenient type alias for `Result` with `E` = [`SyncError`].
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Failures surfaced by sync operations.
///
/// Stale and echoed changes are not errors; they are reported through the
/// operation's outcome type instead.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SyncError {
	/// The engine could not be reached or answered nonsense.
	#[error(transparent)]
	Engine(#[from] duplex_rpc::Error),
	/// Some calls of an atomic batch failed.
	#[error("engine batch for buffer {buffer:?} failed:\n{summary}")]
	Batch {
		/// Target buffer, when the batch had one.
		buffer: Option<BufferId>,
		/// One line per failed call.
		summary: String,
	},
	/// The editor surface failed to apply an edit.
	#[error(transparent)]
	Edit(#[from] EditError),
}

/// Why the editor surface did not apply an edit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
	/// The editor declined the edit (document changed underneath, read-only, ...).
	#[error("edit rejected by the editor")]
	Rejected,
	/// Anything else.
	#[error("editor failure: {0}")]
	Failed(String),
}

/// Why a completion future failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
	/// The editor rejected the edit carrying the pending change.
	#[error("remote change was rejected by the editor")]
	EditRejected,
	/// Applying the pending change failed unexpectedly.
	#[error("remote change could not be applied")]
	ApplyFailed,
	/// The document was closed before the change was applied.
	#[error("document closed")]
	Closed,
	/// The sync core went away.
	#[error("sync core dropped")]
	Dropped,
}
