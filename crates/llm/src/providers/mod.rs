//! Generative provider implementations.

pub mod gemini;

pub use gemini::{GeminiClient, API_KEY_HEADER, DEFAULT_GEMINI_URL};
