use crate::{
    anthropic, openai, openrouter, vllm, AnthropicClient, ApiError, OllamaClient, OpenAIClient,
    OpenRouterClient, Provider, VllmClient,
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Registered backends. The lowercase name is the dispatch key used on the
/// command line and in config files.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[value(name = "anthropic")]
    #[serde(rename = "anthropic")]
    Anthropic,
    #[value(name = "ollama")]
    #[serde(rename = "ollama")]
    Ollama,
    #[value(name = "openai")]
    #[serde(rename = "openai")]
    OpenAI,
    #[value(name = "openrouter")]
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[value(name = "vllm")]
    #[serde(rename = "vllm")]
    Vllm,
}

impl ProviderKind {
    /// All backends, sorted by name
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Anthropic,
        ProviderKind::Ollama,
        ProviderKind::OpenAI,
        ProviderKind::OpenRouter,
        ProviderKind::Vllm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAI => "openai",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Vllm => "vllm",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Environment variable the backend reads its key from, if it uses one
    pub fn api_key_env(self) -> Option<&'static str> {
        match self {
            ProviderKind::Anthropic => Some(anthropic::API_KEY_ENV),
            ProviderKind::Ollama => None,
            ProviderKind::OpenAI => Some(openai::API_KEY_ENV),
            ProviderKind::OpenRouter => Some(openrouter::API_KEY_ENV),
            ProviderKind::Vllm => Some(vllm::API_KEY_ENV),
        }
    }

    pub fn default_base_url(self) -> String {
        match self {
            ProviderKind::Anthropic => AnthropicClient::default_base_url(),
            ProviderKind::Ollama => OllamaClient::default_base_url(),
            ProviderKind::OpenAI => OpenAIClient::default_base_url(),
            ProviderKind::OpenRouter => OpenRouterClient::default_base_url(),
            ProviderKind::Vllm => VllmClient::default_base_url(),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            let available: Vec<_> = Self::ALL.iter().map(|kind| kind.name()).collect();
            format!(
                "unknown provider '{s}' (available: {})",
                available.join(", ")
            )
        })
    }
}

/// Construct the backend for `kind`.
///
/// `base_url` overrides the backend's env var and default; `api_key` overrides the
/// backend's key variable. Missing required keys fail here, before any request.
pub fn create_provider(
    kind: ProviderKind,
    base_url: Option<String>,
    api_key: Option<String>,
) -> Result<Box<dyn Provider>, ApiError> {
    let provider: Box<dyn Provider> = match kind {
        ProviderKind::Anthropic => Box::new(AnthropicClient::new(base_url, api_key)?),
        ProviderKind::Ollama => Box::new(OllamaClient::new(base_url, api_key)?),
        ProviderKind::OpenAI => Box::new(OpenAIClient::new(base_url, api_key)?),
        ProviderKind::OpenRouter => Box::new(OpenRouterClient::new(base_url, api_key)?),
        ProviderKind::Vllm => Box::new(VllmClient::new(base_url, api_key)?),
    };
    Ok(provider)
}
