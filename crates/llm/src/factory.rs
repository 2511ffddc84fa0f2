//! LLM provider factory.
//!
//! Builds the generative client once at process start from configuration.
//! The resulting `Arc<dyn LlmClient>` is injected into the chat engine.

use crate::client::LlmClient;
use crate::providers::{GeminiClient, DEFAULT_GEMINI_URL};
use policy_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("gemini")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - Provider credential
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown or the key is empty.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: &str,
) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "gemini" | "google" => {
            if api_key.trim().is_empty() {
                return Err(AppError::Config(
                    "Gemini provider requires an API key".to_string(),
                ));
            }
            let base_url = endpoint.unwrap_or(DEFAULT_GEMINI_URL);
            Ok(Arc::new(GeminiClient::with_base_url(base_url, api_key)))
        }
        _ => Err(AppError::Config(format!("Unknown provider: {}", provider))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_gemini_client() {
        let client = create_client("gemini", None, "key").unwrap();
        assert_eq!(client.provider_name(), "gemini");
    }

    #[test]
    fn test_gemini_requires_api_key() {
        match create_client("gemini", None, "") {
            Err(err) => assert!(err.to_string().contains("requires an API key")),
            Ok(_) => panic!("Expected error for Gemini without API key"),
        }
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, "key") {
            Err(err) => assert!(err.to_string().contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
