//! Echo suppression for both directions.
//!
//! Every change the core pushes to one side comes back as a change event
//! from that side. Two gates recognise those echoes:
//!
//! * **tick gate** (per engine buffer): stamped to `tick + ops` before a local
//!   batch is sent; any engine notification at or below it is ours.
//! * **version gate** (per document): armed to `version + 1` before a remote
//!   edit is applied to the editor; the first local event with that version
//!   is ours and consumes the gate.

use std::collections::HashMap;

use duplex_rpc::{BufferId, Tick};

use crate::ids::{DocumentId, Version};

/// Per-buffer tick thresholds and per-document version gates.
#[derive(Debug, Default)]
pub struct EchoGuard {
	ticks: HashMap<BufferId, Tick>,
	versions: HashMap<DocumentId, Version>,
}

impl EchoGuard {
	/// Creates an empty guard.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records that `ops` engine changes are about to be sent on top of `current`.
	///
	/// Returns the new threshold.
	pub fn stamp_tick(&mut self, buffer: BufferId, current: Tick, ops: usize) -> Tick {
		let threshold = current + ops as Tick;
		self.ticks.insert(buffer, threshold);
		threshold
	}

	/// Current threshold for `buffer` (0 when never stamped).
	pub fn tick_threshold(&self, buffer: BufferId) -> Tick {
		self.ticks.get(&buffer).copied().unwrap_or(0)
	}

	/// Returns `true` if a notification with `tick` was caused by us.
	pub fn is_tick_echo(&self, buffer: BufferId, tick: Tick) -> bool {
		tick <= self.tick_threshold(buffer)
	}

	/// Arms the version gate: the editor event carrying `version` will be dropped.
	pub fn arm_version(&mut self, doc: DocumentId, version: Version) {
		self.versions.insert(doc, version);
	}

	/// Disarms the version gate without consuming it.
	pub fn disarm_version(&mut self, doc: DocumentId) -> Option<Version> {
		self.versions.remove(&doc)
	}

	/// Consumes the gate if `version` matches it.
	///
	/// Returns `true` when the event is an echo and must be dropped. A
	/// non-matching version leaves the gate armed.
	pub fn take_version_echo(&mut self, doc: DocumentId, version: Version) -> bool {
		if self.versions.get(&doc) == Some(&version) {
			self.versions.remove(&doc);
			return true;
		}
		false
	}

	/// Armed version for `doc`, if any.
	pub fn armed_version(&self, doc: DocumentId) -> Option<Version> {
		self.versions.get(&doc).copied()
	}

	/// Drops per-document state.
	pub fn forget_document(&mut self, doc: DocumentId) {
		self.versions.remove(&doc);
	}

	/// Drops per-buffer state.
	pub fn forget_buffer(&mut self, buffer: BufferId) {
		self.ticks.remove(&buffer);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tick_gate_covers_every_sent_op() {
		let mut guard = EchoGuard::new();
		let buf = BufferId(1);
		assert!(!guard.is_tick_echo(buf, 1));

		assert_eq!(guard.stamp_tick(buf, 10, 3), 13);
		for tick in 11..=13 {
			assert!(guard.is_tick_echo(buf, tick));
		}
		assert!(!guard.is_tick_echo(buf, 14));
		assert!(!guard.is_tick_echo(BufferId(2), 11));
	}

	#[test]
	fn version_gate_drops_once() {
		let mut guard = EchoGuard::new();
		let doc = DocumentId(7);
		guard.arm_version(doc, 5);

		assert!(!guard.take_version_echo(doc, 4));
		assert_eq!(guard.armed_version(doc), Some(5));
		assert!(guard.take_version_echo(doc, 5));
		assert!(!guard.take_version_echo(doc, 5));
	}

	#[test]
	fn disarm_and_forget() {
		let mut guard = EchoGuard::new();
		let doc = DocumentId(1);
		guard.arm_version(doc, 2);
		assert_eq!(guard.disarm_version(doc), Some(2));
		assert!(!guard.take_version_echo(doc, 2));

		guard.stamp_tick(BufferId(3), 1, 1);
		guard.forget_buffer(BufferId(3));
		assert_eq!(guard.tick_threshold(BufferId(3)), 0);
	}
}
