//! Answer generation over retrieved passages

pub mod prompt;

pub use prompt::{PromptBuilder, SYSTEM_PROMPT};
