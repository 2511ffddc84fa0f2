//! Prompt builder: renders a definition with retrieved context and a question.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use policy_core::{AppError, AppResult};
use std::collections::HashMap;

/// Render the chat prompt.
///
/// `context` is the blank-line-joined retrieved text, possibly empty when
/// the tenant has nothing indexed.
///
/// # Example
/// ```
/// use policy_prompt::{build_chat_prompt, default_chat_prompt};
///
/// let built = build_chat_prompt(&default_chat_prompt(), "", "How many leave days?").unwrap();
/// assert!(built.text.contains("How many leave days?"));
/// assert!(!built.context_included);
/// ```
pub fn build_chat_prompt(
    definition: &PromptDefinition,
    context: &str,
    question: &str,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let mut variables = HashMap::new();
    variables.insert("context", context);
    variables.insert("question", question);
    variables.insert("tone", definition.behavior.tone.as_str());
    variables.insert("style", definition.behavior.style.as_str());

    let text = render_template(&definition.template, &variables)?;

    Ok(BuiltPrompt {
        text,
        source_prompt_id: definition.id.clone(),
        context_included: !context.trim().is_empty(),
    })
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<&str, &str>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Policy text and questions are plain text, never HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
