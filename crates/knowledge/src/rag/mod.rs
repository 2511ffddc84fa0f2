//! Retrieval-augmented chat.

pub mod chat;
pub mod types;

pub use chat::ChatEngine;
pub use types::{ChatResponse, RetrievedContext};
