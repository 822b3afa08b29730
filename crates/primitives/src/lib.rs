//! Core text coordinates shared by the editor and engine sides of a sync.
//!
//! The editor side indexes columns in character units (see [`OffsetEncoding`]),
//! the engine side in UTF-8 bytes. This crate owns the conversions between the
//! two and the diffing used to turn a pair of snapshots into a minimal patch.

/// Text diffing and patch application.
pub mod diff;
/// Column unit selection for editor-side positions.
pub mod encoding;
/// Column translation between character units, bytes and screen cells.
pub mod offset;
/// Line/column positions, ranges, selections and line terminators.
pub mod position;

pub use diff::{DiffOptions, PatchOp, apply_patch, diff, diff_with};
pub use encoding::OffsetEncoding;
pub use offset::{byte_to_char, char_to_byte, screen_col_to_char, to_engine_position};
pub use position::{EnginePosition, Eol, Position, Selection, TextRange};
