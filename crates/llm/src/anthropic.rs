use crate::auth::{ApiKeyHeaderAuth, AuthProvider};
use crate::streaming::{self, Frame, HttpChunkStream};
use crate::{sse, utils, ApiError, CompletionRequest, DeltaStream, Provider, DEFAULT_TEMPERATURE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const BASE_URL_ENV: &str = "ANTHROPIC_BASE_URL";
pub const VERSION_ENV: &str = "ANTHROPIC_VERSION";
pub const DEFAULT_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
    stream: bool,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseContentBlock>,
}

impl MessagesResponse {
    /// Concatenated text of the `text` blocks; blocks of other or missing type are skipped
    fn text(self) -> String {
        self.content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ResponseContentBlock {
    #[serde(rename = "type", default)]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type", default)]
    event_type: Option<String>,
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicClient {
    base_url: String,
    auth_provider: Box<dyn AuthProvider>,
}

impl AnthropicClient {
    pub fn default_base_url() -> String {
        "https://api.anthropic.com".to_string()
    }

    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Result<Self, ApiError> {
        let api_key = utils::require_api_key(api_key, API_KEY_ENV)?;
        let base_url =
            utils::resolve_base_url(base_url, BASE_URL_ENV, &Self::default_base_url())?;
        let version = std::env::var(VERSION_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());
        Ok(Self::with_version(base_url, api_key, version))
    }

    /// Build a client with an explicit protocol version; `base_url` must already be normalized
    pub fn with_version(base_url: String, api_key: String, version: String) -> Self {
        Self {
            base_url,
            auth_provider: Box::new(
                ApiKeyHeaderAuth::new("x-api-key", api_key).with_header("anthropic-version", version),
            ),
        }
    }

    fn get_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn headers(&self, streaming: bool) -> Vec<(String, String)> {
        let mut headers = self.auth_provider.auth_headers();
        headers.push(("content-type".to_string(), "application/json".to_string()));
        if streaming {
            headers.push(("accept".to_string(), "text/event-stream".to_string()));
        }
        headers
    }

    fn build_body(request: &CompletionRequest, stream: bool) -> Result<serde_json::Value, ApiError> {
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: &request.system_prompt,
            messages: [UserMessage {
                role: "user",
                content: &request.user_content,
            }],
            stream,
            temperature: DEFAULT_TEMPERATURE,
        };
        serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))
    }

    /// Decode one SSE event of a messages stream.
    ///
    /// The event type comes from the JSON `type` field, falling back to the SSE
    /// `event:` name when the payload does not carry one.
    fn decode_event(event: sse::SseEvent) -> Frame {
        if event.data.trim().is_empty() {
            return if event.event.as_deref() == Some("message_stop") {
                Frame::stop()
            } else {
                Frame::skip()
            };
        }

        let parsed = match serde_json::from_str::<StreamEvent>(&event.data) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Skipping malformed stream event '{}': {}", event.data, e);
                return Frame::skip();
            }
        };

        let event_type = parsed.event_type.as_deref().or(event.event.as_deref());
        match event_type {
            Some("message_stop") => Frame::stop(),
            Some("content_block_delta") => Frame::deltas(
                parsed
                    .delta
                    .and_then(|delta| delta.text)
                    .into_iter()
                    .collect(),
            ),
            _ => Frame::skip(),
        }
    }
}

#[async_trait]
impl Provider for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
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

        let response: MessagesResponse = utils::read_json(response).await?;
        Ok(response.text().trim().to_string())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::tests::ScriptedChunkStream;
    use futures::StreamExt;

    async fn run_script(chunks: &[&[u8]]) -> Vec<String> {
        let events = sse::events(streaming::lines(Box::new(ScriptedChunkStream::new(chunks))));
        streaming::deltas(events, AnthropicClient::decode_event)
            .map(|delta| delta.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_message_stop_first_ends_stream_before_content() {
        let deltas = run_script(&[
            b"event: message_stop\ndata: {}\n\n",
            b"data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"hi\"}}\n\n",
        ])
        .await;
        assert!(deltas.is_empty());
    }

    #[tokio::test]
    async fn test_only_content_block_deltas_are_yielded() {
        let deltas = run_script(&[
            b"event: message_start\ndata: {\"type\":\"message_start\",\"message\":{}}\n\n",
            b"event: ping\ndata: {\"type\":\"ping\"}\n\n",
            b"data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"a\"}}\n\n",
            b"data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{}\"}}\n\n",
            b"data: not json\n\n",
            b"data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"b\"}}\n\n",
            b"data: {\"type\":\"message_stop\"}\n\n",
            b"data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"late\"}}\n\n",
        ])
        .await;
        assert_eq!(deltas, vec!["a", "b"]);
    }

    #[test]
    fn test_untyped_and_tool_blocks_are_skipped() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content":[
                {"text":"no type"},
                {"type":"text","text":"Disk "},
                {"type":"tool_use","id":"t1","name":"df","input":{}},
                {"type":"text","text":"is full."}
            ]}"#,
        )
        .unwrap();
        assert_eq!(response.text(), "Disk is full.");
    }

    #[test]
    fn test_request_body_shape() {
        let request = CompletionRequest::new("sys", "input", "claude-3-5-haiku-latest", 256);
        let body = AnthropicClient::build_body(&request, false).unwrap();
        assert_eq!(body["system"], "sys");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "input");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn test_version_header_sent() {
        let client = AnthropicClient::with_version(
            "http://localhost".to_string(),
            "key".to_string(),
            "2024-01-01".to_string(),
        );
        let headers = client.headers(true);
        assert!(headers.contains(&("x-api-key".to_string(), "key".to_string())));
        assert!(headers.contains(&("anthropic-version".to_string(), "2024-01-01".to_string())));
        assert!(headers.contains(&("accept".to_string(), "text/event-stream".to_string())));
    }
}
