//! Sync configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! encoding = "utf-16"
//! tab_size = 8
//! progress_delay_ms = 1000
//! diff_timeout_ms = 500
//! input_for_typing = false
//! dot_repeat = true
//! scratch_filler = "x"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use duplex_primitives::{DiffOptions, OffsetEncoding};
use serde::{Deserialize, Serialize};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or field types.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// A field parsed but holds an unusable value.
	#[error("invalid value for {field}: {reason}")]
	Invalid {
		/// Offending field.
		field: &'static str,
		/// What is wrong with it.
		reason: &'static str,
	},
}

/// Tunables for [`DocumentSync`](crate::DocumentSync).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
	/// Column unit used by the editor surface.
	pub encoding: OffsetEncoding,
	/// Tab width for screen-column translation.
	pub tab_size: usize,
	/// How long a remote drain may run before a progress indicator shows.
	pub progress_delay_ms: u64,
	/// Deadline for one diff. `0` disables the deadline.
	pub diff_timeout_ms: u64,
	/// Send single typed characters as raw keystrokes in insert mode.
	pub input_for_typing: bool,
	/// Record insert-mode edits for dot-repeat replay.
	pub dot_repeat: bool,
	/// Character used to pre-fill the dot-repeat scratch line.
	pub scratch_filler: char,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			encoding: OffsetEncoding::Utf16,
			tab_size: 8,
			progress_delay_ms: 1000,
			diff_timeout_ms: 500,
			input_for_typing: false,
			dot_repeat: true,
			scratch_filler: 'x',
		}
	}
}

impl SyncConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Loads configuration from a file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
			path: path.to_path_buf(),
			error: e,
		})?;
		Self::from_toml_str(&content)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.tab_size == 0 {
			return Err(ConfigError::Invalid {
				field: "tab_size",
				reason: "must be at least 1",
			});
		}
		if !self.scratch_filler.is_ascii_graphic() {
			return Err(ConfigError::Invalid {
				field: "scratch_filler",
				reason: "must be a printable ASCII character",
			});
		}
		Ok(())
	}

	/// Progress indicator delay.
	pub fn progress_delay(&self) -> Duration {
		Duration::from_millis(self.progress_delay_ms)
	}

	/// Diff tuning derived from this config.
	pub fn diff_options(&self) -> DiffOptions {
		DiffOptions {
			timeout: (self.diff_timeout_ms > 0).then(|| Duration::from_millis(self.diff_timeout_ms)),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_document_is_default() {
		assert_eq!(SyncConfig::from_toml_str("").unwrap(), SyncConfig::default());
	}

	#[test]
	fn fields_override_defaults() {
		let config = SyncConfig::from_toml_str(
			r#"
			encoding = "utf-32"
			tab_size = 4
			diff_timeout_ms = 0
			input_for_typing = true
			"#,
		)
		.unwrap();
		assert_eq!(config.encoding, OffsetEncoding::Utf32);
		assert_eq!(config.tab_size, 4);
		assert!(config.input_for_typing);
		assert!(config.dot_repeat);
		assert_eq!(config.diff_options().timeout, None);
	}

	#[test]
	fn unknown_fields_and_bad_values_fail() {
		assert!(matches!(
			SyncConfig::from_toml_str("colour = 1"),
			Err(ConfigError::Toml(_))
		));
		assert!(matches!(
			SyncConfig::from_toml_str("tab_size = 0"),
			Err(ConfigError::Invalid { field: "tab_size", .. })
		));
		assert!(matches!(
			SyncConfig::from_toml_str("scratch_filler = \" \""),
			Err(ConfigError::Invalid { field: "scratch_filler", .. })
		));
	}

	#[test]
	fn load_reads_file_and_reports_path() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "progress_delay_ms = 250").unwrap();
		let config = SyncConfig::load(file.path()).unwrap();
		assert_eq!(config.progress_delay(), Duration::from_millis(250));

		let missing = file.path().with_extension("missing");
		let err = SyncConfig::load(&missing).unwrap_err();
		assert!(matches!(err, ConfigError::Io { ref path, .. } if *path == missing));
	}
}
