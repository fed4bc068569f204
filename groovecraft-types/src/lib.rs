//! # groovecraft-types
//!
//! Shared data model for the GrooveCraft sequencer: the immutable `Pattern`
//! value produced by the DSL parser, the per-effect module configs it is
//! built from, the groove preset catalog, and parser diagnostics.
//!
//! This crate has no audio or scheduling logic of its own; it exists so
//! that the parser, engine, and audio graph crates can all depend on one
//! shared vocabulary without depending on each other.

pub mod diagnostics;
pub mod groove;
pub mod llm_contract;
pub mod modules;
pub mod pattern;
pub mod ranges;

pub use diagnostics::{Diagnostics, ParseIssue, Severity};
pub use groove::{GrooveApplyResult, GrooveCategory, GrooveTemplate};
pub use llm_contract::{ChatMessage, ChatRole, LlmAssistRequest, LlmProvider, LlmStreamEvent};
pub use modules::*;
pub use pattern::{Instrument, OverflowMode, Pattern};
