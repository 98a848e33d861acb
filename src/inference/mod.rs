//! Inference layer — chat completions against an OpenAI-compatible endpoint.
//!
//! This module handles all communication with the model provider:
//! - Request building and response parsing for `POST /chat/completions`
//! - The [`CompletionModel`] seam the assistant core is generic over
//!
//! The client speaks the OpenAI Chat Completions API, making the provider
//! interchangeable via config. Switching endpoints is a config change, not a
//! code change.

pub mod client;
pub mod errors;
pub mod types;

// Re-exports for convenience
pub use client::{CompletionModel, InferenceClient};
pub use errors::InferenceError;
pub use types::{ChatMessage, Role};
