//! Prompt types for the policy assistant.

use serde::{Deserialize, Serialize};

/// A prompt definition, either built in or loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Behavioral settings, exposed to the template as `tone` and `style`
    pub behavior: PromptBehavior,

    /// Handlebars template. Receives `context`, `question`, `tone`, `style`.
    pub template: String,
}

/// Behavioral settings for prompt execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBehavior {
    /// Tone (e.g., "professional, helpful")
    pub tone: String,

    /// Style (e.g., "concise")
    pub style: String,
}

/// A fully rendered prompt ready for the generative provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// Rendered prompt text
    pub text: String,

    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Whether any retrieved context was injected
    #[serde(rename = "contextIncluded")]
    pub context_included: bool,
}
