//! Generative model integration for the policy assistant.
//!
//! Provides a provider-agnostic `LlmClient` trait and a Gemini
//! implementation. The model is treated as a black-box completion service.
//!
//! # Example
//! ```no_run
//! use policy_llm::{GeminiClient, LlmClient, LlmRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GeminiClient::new("api-key");
//! let request = LlmRequest::new("Summarise the leave policy", "gemini-2.0-flash");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{GeminiClient, API_KEY_HEADER, DEFAULT_GEMINI_URL};
