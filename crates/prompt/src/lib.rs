//! Prompt system for the policy assistant.
//!
//! - Built-in retrieval-augmented chat prompt
//! - YAML prompt overrides
//! - Handlebars rendering with retrieved context

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_chat_prompt;
pub use loader::{default_chat_prompt, load_prompt_file, resolve_prompt, DEFAULT_PROMPT_ID};
pub use types::{BuiltPrompt, PromptBehavior, PromptDefinition};
