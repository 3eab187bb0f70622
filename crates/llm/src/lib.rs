//! LLM integration module providing abstraction over different LLM providers
//!
//! This module implements:
//! - Common interface for LLM interactions via the [`Provider`] trait
//! - Three wire protocols: chat-completion (OpenAI, OpenRouter, vLLM),
//!   Anthropic messages, and Ollama generate
//! - Lazy streaming of text deltas over Server-Sent-Events or newline-delimited JSON
//! - A name-keyed registry for constructing backends


mod utils;

pub mod anthropic;
pub mod auth;
pub mod factory;
pub mod ollama;
pub mod openai;
pub mod openrouter;
pub mod sse;
pub mod streaming;
pub mod types;
pub mod vllm;

pub use anthropic::AnthropicClient;
pub use factory::{create_provider, ProviderKind};
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;
pub use openrouter::OpenRouterClient;
pub use types::*;
pub use vllm::VllmClient;

use async_trait::async_trait;

/// Trait for different LLM provider implementations
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry name of the backend
    fn name(&self) -> &'static str;

    /// Send one request and return the whole response text, trimmed
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ApiError>;

    /// Send one streaming request and return its text deltas as they arrive
    async fn stream(&self, request: &CompletionRequest) -> Result<DeltaStream, ApiError>;
}
