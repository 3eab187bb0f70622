use crate::auth::{AuthProvider, BearerAuth};
use crate::streaming::{self, Frame, HttpChunkStream};
use crate::{sse, utils, ApiError, CompletionRequest, DeltaStream, Provider, DEFAULT_TEMPERATURE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Client for the chat-completion protocol. Other OpenAI-compatible backends wrap
/// this client and only differ in base URL and credentials.
pub struct OpenAIClient {
    name: &'static str,
    base_url: String,
    auth_provider: Box<dyn AuthProvider>,
}

impl OpenAIClient {
    pub fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }

    /// Resolve base URL and key from arguments or the environment.
    /// Fails without touching the network when no key can be found.
    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Result<Self, ApiError> {
        let api_key = utils::require_api_key(api_key, API_KEY_ENV)?;
        let base_url =
            utils::resolve_base_url(base_url, BASE_URL_ENV, &Self::default_base_url())?;
        Ok(Self::with_auth(
            "openai",
            base_url,
            Box::new(BearerAuth::new(api_key)),
        ))
    }

    /// Constructor for compatible backends; `base_url` must already be normalized
    pub fn with_auth(
        name: &'static str,
        base_url: String,
        auth_provider: Box<dyn AuthProvider>,
    ) -> Self {
        Self {
            name,
            base_url,
            auth_provider,
        }
    }

    fn get_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body(request: &CompletionRequest, stream: bool) -> Result<serde_json::Value, ApiError> {
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_content,
                },
            ],
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: request.max_tokens,
            stream,
        };
        serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))
    }

    fn headers(&self, streaming: bool) -> Vec<(String, String)> {
        let mut headers = self.auth_provider.auth_headers();
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        if streaming {
            headers.push(("Accept".to_string(), "text/event-stream".to_string()));
        }
        headers
    }

    /// Decode one SSE event of a chat-completion stream
    fn decode_event(event: sse::SseEvent) -> Frame {
        let data = event.data.trim();
        if data.is_empty() {
            return Frame::skip();
        }
        if data == "[DONE]" {
            return Frame::stop();
        }
        match serde_json::from_str::<ChatCompletionChunk>(data) {
            Ok(chunk) => Frame::deltas(
                chunk
                    .choices
                    .into_iter()
                    .filter_map(|choice| choice.delta.content)
                    .collect(),
            ),
            Err(e) => {
                debug!("Skipping malformed stream event '{}': {}", data, e);
                Frame::skip()
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAIClient {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ApiError> {
        let body = Self::build_body(request, false)?;
        let response = utils::post_json(
            &self.get_url(),
            &self.headers(false),
            &body,
            request.timeout,
            false,
        )
        .await?;

        let response: ChatCompletionResponse = utils::read_json(response).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ApiError::MalformedResponse("missing choices[0].message.content".to_string())
            })?;

        Ok(content.trim().to_string())
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<DeltaStream, ApiError> {
        let body = Self::build_body(request, true)?;
        let response = utils::post_json(
            &self.get_url(),
            &self.headers(true),
            &body,
            request.timeout,
            true,
        )
        .await?;

        let chunks = HttpChunkStream::new(response, request.timeout);
        let events = sse::events(streaming::lines(Box::new(chunks)));
        Ok(streaming::deltas(events, Self::decode_event))
    }
}
