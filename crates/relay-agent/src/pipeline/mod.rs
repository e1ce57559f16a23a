//! Shared message pipeline: channel-agnostic relay turn processing.
//!
//! Channel adapters call `process_message` for the relay path and
//! `handle_slash_command` for the built-in commands, then add their own
//! formatting on top.

pub mod context;
pub mod process;
pub mod slash;

pub use context::MessageContext;
pub use process::{process_message, PipelineError, ProcessedMessage};
pub use slash::handle_slash_command;
