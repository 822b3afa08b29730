//! Scenario files and their replay.

use std::path::Path;

use anyhow::Context;
use duplex_primitives::{Eol, TextRange};
use duplex_sync::SyncConfig;
use duplex_sync::memory::MemoryHarness;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A starting document and the edits to run against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
	/// Initial text on both sides.
	pub text: String,
	/// Line terminator. Detected from `text` when absent.
	#[serde(default)]
	pub eol: Option<Eol>,
	/// Steps, in order.
	#[serde(default)]
	pub steps: Vec<Step>,
}

/// One scenario step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
	/// The user replaces `range` in the editor.
	EditorEdit {
		/// Replaced range, in editor units.
		range: TextRange,
		/// Replacement.
		text: String,
	},
	/// The engine replaces lines `[first, last)`.
	EngineEdit {
		/// First replaced line.
		first: usize,
		/// End of the replaced lines, exclusive.
		last: usize,
		/// Replacement lines.
		lines: Vec<String>,
	},
	/// Switches the engine's insert mode.
	InsertMode(bool),
	/// Replays the recorded edit in the engine.
	DotRepeat,
}

impl Scenario {
	/// Reads a JSON scenario file.
	pub fn load(path: &Path) -> anyhow::Result<Self> {
		let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
		serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
	}

	fn eol(&self) -> Eol {
		self.eol.unwrap_or_else(|| Eol::detect(&self.text))
	}
}

/// Final state of both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
	/// Editor text.
	pub editor: String,
	/// Engine text.
	pub engine: String,
	/// Keystrokes sent to the engine.
	pub inputs: Vec<String>,
}

impl Outcome {
	/// Returns `true` when both sides hold the same text.
	pub fn converged(&self) -> bool {
		self.editor == self.engine
	}
}

/// Runs `scenario` to completion, pumping events after every step.
pub async fn run(scenario: &Scenario, config: SyncConfig) -> anyhow::Result<Outcome> {
	let harness = MemoryHarness::new(config, &scenario.text, scenario.eol());

	for (idx, step) in scenario.steps.iter().enumerate() {
		debug!(step = idx, ?step, "replay.step");
		match step {
			Step::EditorEdit { range, text } => {
				if harness.editor_edit(*range, text).await?.is_none() {
					warn!(step = idx, "replay.editor_edit.ignored");
				}
			}
			Step::EngineEdit { first, last, lines } => {
				harness.engine_edit(*first, *last, lines.clone());
			}
			Step::InsertMode(on) => harness.set_insert_mode(*on),
			Step::DotRepeat => {
				let replayed = harness.sync.replay_dot_repeat().await.with_context(|| format!("step {idx}: dot-repeat"))?;
				if !replayed {
					info!(step = idx, "replay.dot_repeat.empty");
				}
			}
		}
		harness.pump().await.with_context(|| format!("step {idx}: pump"))?;
	}

	Ok(Outcome {
		editor: harness.editor_text(),
		engine: harness.engine_text(),
		inputs: harness.engine.inputs().into_iter().map(|(_, keys)| keys).collect(),
	})
}

#[cfg(test)]
mod tests {
	use duplex_primitives::Position;
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn parses_every_step_kind() {
		let raw = r#"{
			"text": "ab\r\ncd",
			"steps": [
				{ "editor_edit": { "range": { "start": { "line": 0, "character": 2 }, "end": { "line": 0, "character": 2 } }, "text": "!" } },
				{ "engine_edit": { "first": 1, "last": 2, "lines": ["CD"] } },
				{ "insert_mode": true },
				"dot_repeat"
			]
		}"#;
		let scenario: Scenario = serde_json::from_str(raw).unwrap();
		assert_eq!(scenario.eol(), Eol::CrLf);
		assert_eq!(
			scenario.steps,
			vec![
				Step::EditorEdit {
					range: TextRange::point(Position::new(0, 2)),
					text: "!".into(),
				},
				Step::EngineEdit {
					first: 1,
					last: 2,
					lines: vec!["CD".into()],
				},
				Step::InsertMode(true),
				Step::DotRepeat,
			]
		);
	}

	#[test]
	fn load_reports_path() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("broken.json");
		std::fs::write(&path, "{").unwrap();
		let err = Scenario::load(&path).unwrap_err();
		assert!(format!("{err:#}").contains("broken.json"));
	}

	#[tokio::test]
	async fn runs_to_convergence() {
		let scenario = Scenario {
			text: "one\ntwo".into(),
			eol: None,
			steps: vec![
				Step::InsertMode(true),
				Step::EditorEdit {
					range: TextRange::point(Position::new(0, 3)),
					text: "!".into(),
				},
				Step::EngineEdit {
					first: 1,
					last: 2,
					lines: vec!["TWO".into()],
				},
				Step::DotRepeat,
			],
		};
		let outcome = run(&scenario, SyncConfig::default()).await.unwrap();
		assert_eq!(outcome.editor, "one!\nTWO");
		assert!(outcome.converged());
		assert_eq!(outcome.inputs, vec!["!".to_string()]);
	}
}
