//! Prompt loading: the built-in chat prompt and YAML overrides.

use crate::types::{PromptBehavior, PromptDefinition};
use policy_core::{AppError, AppResult};
use std::path::Path;

/// Identifier of the built-in chat prompt.
pub const DEFAULT_PROMPT_ID: &str = "policy.chat.default";

const DEFAULT_TEMPLATE: &str = r#"You are an intelligent HR Policy Assistant.

### SOURCES (Company Policy):
{{context}}

### USER REQUEST:
{{question}}

### INSTRUCTIONS:
1. **Task Execution:** If the user asks you to write an email, letter, or draft, write it.
   - Use the SOURCES as constraints (e.g., notice period, who to CC).
   - Where the policy is silent, use standard professional placeholders like [Manager Name].

2. **Fact Checking:** If the user asks a factual question (e.g., "How many leaves?"), answer strictly from the SOURCES.
   - If the answer is not in the SOURCES, say "I cannot find that information in the policy."

3. **Tone:** {{tone}}, {{style}}.

Answer now:
"#;

/// The built-in retrieval-augmented chat prompt.
pub fn default_chat_prompt() -> PromptDefinition {
    PromptDefinition {
        id: DEFAULT_PROMPT_ID.to_string(),
        title: "Policy chat".to_string(),
        api_version: "1.0".to_string(),
        behavior: PromptBehavior {
            tone: "Professional, helpful".to_string(),
            style: "concise".to_string(),
        },
        template: DEFAULT_TEMPLATE.to_string(),
    }
}

/// Load a prompt definition from a YAML file.
///
/// # Example
/// ```no_run
/// use policy_prompt::load_prompt_file;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt_file(Path::new(".policy/prompt.yml"))?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt_file(path: &Path) -> AppResult<PromptDefinition> {
    tracing::debug!("Loading prompt from: {:?}", path);

    if !path.exists() {
        return Err(AppError::Prompt(format!("Prompt file not found: {:?}", path)));
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::Prompt(format!("Failed to read prompt file {:?}: {}", path, e)))?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents)
        .map_err(|e| AppError::Prompt(format!("Failed to parse prompt YAML {:?}: {}", path, e)))?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Load the prompt at `path`, or the built-in prompt when `path` is `None`.
pub fn resolve_prompt(path: Option<&Path>) -> AppResult<PromptDefinition> {
    match path {
        Some(path) => load_prompt_file(path),
        None => Ok(default_chat_prompt()),
    }
}

fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt("Prompt template cannot be empty".to_string()));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    // A template that never shows the question cannot answer it.
    if !def.template.contains("{{question}}") {
        return Err(AppError::Prompt(format!(
            "Prompt '{}' must reference {{{{question}}}}",
            def.id
        )));
    }

    Ok(())
}
