use super::openai::OpenAIClient;
use crate::auth::BearerAuth;
use crate::{utils, ApiError, CompletionRequest, DeltaStream, Provider};
use async_trait::async_trait;

pub const API_KEY_ENV: &str = "VLLM_API_KEY";
pub const BASE_URL_ENV: &str = "VLLM_BASE_URL";

/// Sent when no key is configured; vLLM only checks keys when started with `--api-key`
const PLACEHOLDER_API_KEY: &str = "dummy-key";

/// Self-hosted OpenAI-compatible server
pub struct VllmClient {
    inner: OpenAIClient,
}

impl VllmClient {
    pub fn default_base_url() -> String {
        "http://localhost:8000/v1".to_string()
    }

    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Result<Self, ApiError> {
        let api_key = utils::resolve_api_key(api_key, API_KEY_ENV)
            .unwrap_or_else(|| PLACEHOLDER_API_KEY.to_string());
        let base_url =
            utils::resolve_base_url(base_url, BASE_URL_ENV, &Self::default_base_url())?;
        Ok(Self {
            inner: OpenAIClient::with_auth("vllm", base_url, Box::new(BearerAuth::new(api_key))),
        })
    }
}

#[async_trait]
impl Provider for VllmClient {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ApiError> {
        self.inner.complete(request).await
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<DeltaStream, ApiError> {
        self.inner.stream(request).await
    }
}
