//! Keeps an editor surface and a headless text engine editing the same text.
//!
//! Local edits flow editor → engine through [`DocumentSync::on_editor_change`];
//! engine notifications flow back through [`DocumentSync::on_engine_lines`].
//! Each direction stamps an echo gate before it writes so the mirrored
//! change is not bounced back to where it came from.
//!
//! # Ordering
//!
//! - Local events are serialized by one async mutex and sent in arrival order.
//! - Remote notifications are queued and applied by a single drain loop in
//!   tick order. Notifications arriving mid-drain join the running loop.
//! - Nothing orders local against remote edits of the same document; the echo
//!   gates keep either side from re-applying its own change.

pub mod applier;
pub mod completion;
pub mod config;
pub mod dot_repeat;
pub mod echo;
pub mod error;
pub mod ids;
mod ingest;
#[cfg(feature = "memory")]
pub mod memory;
pub mod registry;
pub mod surface;
mod sync;

pub use applier::{Acceptance, DrainReport};
pub use completion::CompletionGate;
pub use config::{ConfigError, SyncConfig};
pub use dot_repeat::{DotRepeatAccumulator, DotRepeatRecorder, escape_input};
pub use echo::EchoGuard;
pub use error::{CompletionError, EditError, Result, SyncError};
pub use ids::{DocumentId, Version, ViewId};
pub use ingest::IngestOutcome;
pub use registry::DocumentRegistry;
pub use surface::{ChangeEvent, Collaborators, ContentChange, DocumentState, EditOptions, EditorSurface};
pub use sync::DocumentSync;

// only the integration tests install a subscriber
#[cfg(test)]
use tracing_subscriber as _;
