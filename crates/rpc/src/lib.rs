//! Contract with the headless text engine.
//!
//! The engine is reachable only through RPC. This crate provides the typed
//! surface the sync core speaks:
//! * [`EngineCall`]: one remote method invocation with its arguments
//! * [`AtomicBatch`] / [`BatchReply`]: several calls executed without
//!   interleaving, with per-call outcomes
//! * [`BufferLinesEvent`]: the engine's line-oriented change notification
//! * [`TextEngine`]: the transport-agnostic client trait

#![warn(missing_docs)]

pub mod batch;
pub mod call;
pub mod engine;
pub mod error;
pub mod notification;

pub use batch::{AtomicBatch, BatchReply, CallFailure, CallOutcome};
pub use call::{BufferId, EngineCall, OptionValue, Tick, WindowConfig, WindowId};
pub use engine::TextEngine;
pub use error::{Error, Result};
pub use notification::BufferLinesEvent;
