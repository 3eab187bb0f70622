use super::openai::OpenAIClient;
use crate::auth::BearerAuth;
use crate::{utils, ApiError, CompletionRequest, DeltaStream, Provider};
use async_trait::async_trait;

pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const BASE_URL_ENV: &str = "OPENROUTER_BASE_URL";

pub struct OpenRouterClient {
    inner: OpenAIClient,
}

impl OpenRouterClient {
    pub fn default_base_url() -> String {
        "https://openrouter.ai/api/v1".to_string()
    }

    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Result<Self, ApiError> {
        let api_key = utils::require_api_key(api_key, API_KEY_ENV)?;
        let base_url =
            utils::resolve_base_url(base_url, BASE_URL_ENV, &Self::default_base_url())?;
        Ok(Self {
            inner: OpenAIClient::with_auth(
                "openrouter",
                base_url,
                Box::new(BearerAuth::new(api_key)),
            ),
        })
    }
}

#[async_trait]
impl Provider for OpenRouterClient {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ApiError> {
        // Delegate to inner OpenAI client since the APIs are compatible
        self.inner.complete(request).await
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<DeltaStream, ApiError> {
        self.inner.stream(request).await
    }
}
