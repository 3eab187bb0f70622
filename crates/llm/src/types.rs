use futures::stream::BoxStream;
use std::time::Duration;

/// Sampling temperature sent to every backend
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// One request against a provider: instruction text plus the (already redacted) input window
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_content: String,
    pub model: String,
    /// Passed through to the backend as its output token limit
    pub max_tokens: u32,
    /// Upper bound for the whole call (`complete`) or for connect and each
    /// gap between chunks (`stream`). `None` leaves it to the network stack.
    pub timeout: Option<Duration>,
}

impl CompletionRequest {
    pub fn new(
        system_prompt: impl Into<String>,
        user_content: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_content: user_content.into(),
            model: model.into(),
            max_tokens,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Lazy, single-pass sequence of non-empty text fragments in arrival order.
///
/// Dropping the stream drops the underlying HTTP response and closes the connection.
pub type DeltaStream = BoxStream<'static, Result<String, ApiError>>;

/// Common error types for all LLM providers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{env_var} is not set")]
    MissingApiKey { env_var: &'static str },

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ApiError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ApiError::Timeout(error.to_string())
        } else {
            ApiError::NetworkError(error.to_string())
        }
    }
}
