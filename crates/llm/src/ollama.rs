use crate::auth::{AuthProvider, NoAuth};
use crate::streaming::{self, Frame, HttpChunkStream};
use crate::{utils, ApiError, CompletionRequest, DeltaStream, Provider, DEFAULT_TEMPERATURE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const BASE_URL_ENV: &str = "OLLAMA_BASE_URL";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
}

/// Local Ollama server speaking `/api/generate` with newline-delimited JSON streaming
pub struct OllamaClient {
    base_url: String,
    auth_provider: Box<dyn AuthProvider>,
}

impl OllamaClient {
    pub fn default_base_url() -> String {
        "http://localhost:11434".to_string()
    }

    /// Ollama needs no key; `_api_key` is accepted for a uniform constructor shape
    pub fn new(base_url: Option<String>, _api_key: Option<String>) -> Result<Self, ApiError> {
        let base_url =
            utils::resolve_base_url(base_url, BASE_URL_ENV, &Self::default_base_url())?;
        Ok(Self {
            base_url,
            auth_provider: Box::new(NoAuth),
        })
    }

    fn get_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = self.auth_provider.auth_headers();
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        headers
    }

    fn build_body(request: &CompletionRequest, stream: bool) -> Result<serde_json::Value, ApiError> {
        let body = GenerateRequest {
            model: &request.model,
            prompt: format!("{}\n\n{}", request.system_prompt, request.user_content),
            stream,
            options: GenerateOptions {
                num_predict: request.max_tokens,
                temperature: DEFAULT_TEMPERATURE,
            },
        };
        serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))
    }

    /// Decode one line of the newline-delimited JSON stream
    fn decode_line(line: String) -> Frame {
        let line = line.trim();
        if line.is_empty() {
            return Frame::skip();
        }
        match serde_json::from_str::<GenerateResponse>(line) {
            Ok(chunk) => Frame {
                deltas: chunk.response.into_iter().collect(),
                stop: chunk.done,
            },
            Err(e) => {
                debug!("Skipping malformed chunk line '{}': {}", line, e);
                Frame::skip()
            }
        }
    }
}

#[async_trait]
impl Provider for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ApiError> {
        let body = Self::build_body(request, false)?;
        let response =
            utils::post_json(&self.get_url(), &self.headers(), &body, request.timeout, false)
                .await?;

        let response: GenerateResponse = utils::read_json(response).await?;
        Ok(response.response.unwrap_or_default().trim().to_string())
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<DeltaStream, ApiError> {
        let body = Self::build_body(request, true)?;
        let response =
            utils::post_json(&self.get_url(), &self.headers(), &body, request.timeout, true)
                .await?;

        let chunks = HttpChunkStream::new(response, request.timeout);
        Ok(streaming::deltas(
            streaming::lines(Box::new(chunks)),
            Self::decode_line,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::tests::ScriptedChunkStream;
    use futures::StreamExt;

    async fn run_script(chunks: &[&[u8]]) -> Vec<String> {
        let lines = streaming::lines(Box::new(ScriptedChunkStream::new(chunks)));
        streaming::deltas(lines, OllamaClient::decode_line)
            .map(|delta| delta.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_done_line_ends_stream() {
        let deltas = run_script(&[
            b"{\"response\":\"ab\"}\n{\"response\":\"cd\"}\n{\"done\":true}\n{\"response\":\"ef\"}\n",
        ])
        .await;
        assert_eq!(deltas, vec!["ab", "cd"]);
    }

    #[tokio::test]
    async fn test_text_on_done_line_is_kept() {
        let deltas = run_script(&[
            b"{\"response\":\"x\",\"done\":false}\n",
            b"\n{garbage\n",
            b"{\"response\":\"y\",\"done\":true}",
        ])
        .await;
        assert_eq!(deltas, vec!["x", "y"]);
    }

    #[test]
    fn test_prompt_joins_system_and_input() {
        let request = CompletionRequest::new("rules", "log text", "llama3", 128);
        let body = OllamaClient::build_body(&request, true).unwrap();
        assert_eq!(body["prompt"], "rules\n\nlog text");
        assert_eq!(body["options"]["num_predict"], 128);
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_no_key_required() {
        let client = OllamaClient::new(Some("http://127.0.0.1:11434/".to_string()), None).unwrap();
        assert_eq!(client.get_url(), "http://127.0.0.1:11434/api/generate");
    }
}
