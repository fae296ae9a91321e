//! LLM integration for captioning and prompt-based text classification.
//!
//! Provides a provider abstraction over multiple LLM backends (Ollama,
//! Anthropic, OpenAI, Hyperbolic). Retrying calls live in [`crate::retry`].

pub(crate) mod anthropic;
mod http;
pub(crate) mod ollama;
pub(crate) mod openai;
pub mod provider;

pub use provider::{ImageInput, LlmProvider, LlmProviderFactory, LlmRequest, LlmResponse};
