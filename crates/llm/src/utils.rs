use crate::ApiError;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, trace};

/// Check the response status and turn any non-success status into an [`ApiError`]
/// carrying the response body.
pub async fn check_response_error(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let response_text = response
        .text()
        .await
        .map_err(|e| ApiError::NetworkError(e.to_string()))?;

    let error = match status {
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimit(response_text),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ApiError::Authentication(response_text)
        }
        StatusCode::BAD_REQUEST => ApiError::InvalidRequest(response_text),
        status if status.is_server_error() => ApiError::ServiceError(response_text),
        _ => ApiError::Unknown(format!("Status {status}: {response_text}")),
    };

    Err(error)
}

/// Validate a base URL and strip any trailing slashes so endpoint paths can be appended.
pub fn normalize_base_url(base_url: &str) -> Result<String, ApiError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let parsed =
        url::Url::parse(trimmed).map_err(|e| ApiError::InvalidBaseUrl(format!("{trimmed}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        scheme => Err(ApiError::InvalidBaseUrl(format!(
            "{trimmed}: unsupported scheme '{scheme}'"
        ))),
    }
}

/// Pick the base URL: explicit override, then the backend's env var, then its default.
pub fn resolve_base_url(
    explicit: Option<String>,
    env_var: &str,
    default: &str,
) -> Result<String, ApiError> {
    let base_url = explicit
        .filter(|url| !url.trim().is_empty())
        .or_else(|| non_empty_env(env_var))
        .unwrap_or_else(|| default.to_string());
    normalize_base_url(&base_url)
}

/// Pick the API key: explicit value first, then the backend's env var.
pub fn resolve_api_key(explicit: Option<String>, env_var: &'static str) -> Option<String> {
    explicit
        .filter(|key| !key.trim().is_empty())
        .or_else(|| non_empty_env(env_var))
}

pub fn require_api_key(
    explicit: Option<String>,
    env_var: &'static str,
) -> Result<String, ApiError> {
    resolve_api_key(explicit, env_var).ok_or(ApiError::MissingApiKey { env_var })
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// POST a JSON body and return the response once its status has been checked.
///
/// For non-streaming calls the timeout bounds the whole exchange including the body.
/// For streaming calls it bounds connecting and receiving the response head; the gaps
/// between body chunks are bounded by [`crate::streaming::HttpChunkStream`].
pub async fn post_json(
    url: &str,
    headers: &[(String, String)],
    body: &serde_json::Value,
    timeout: Option<Duration>,
    streaming: bool,
) -> Result<Response, ApiError> {
    let mut client_builder = Client::builder();
    if let Some(timeout) = timeout {
        client_builder = client_builder.connect_timeout(timeout);
    }
    let client = client_builder.build()?;

    let mut request_builder = client.post(url);
    for (key, value) in headers {
        request_builder = request_builder.header(key.as_str(), value.as_str());
    }
    if !streaming {
        if let Some(timeout) = timeout {
            request_builder = request_builder.timeout(timeout);
        }
    }

    debug!("POST {} (streaming: {})", url, streaming);
    trace!("Request body: {}", body);

    let send = request_builder.json(body).send();
    let response = match (streaming, timeout) {
        (true, Some(timeout)) => tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| {
                ApiError::Timeout(format!(
                    "no response from {url} within {:.1}s",
                    timeout.as_secs_f64()
                ))
            })??,
        _ => send.await?,
    };

    check_response_error(response).await
}

/// Read the full body of a checked response and parse it as JSON.
pub async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response_text = response.text().await?;
    serde_json::from_str(&response_text)
        .map_err(|e| ApiError::MalformedResponse(format!("Failed to parse response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url_trims_trailing_slash() {
        assert_eq!(
            normalize_base_url("http://localhost:8000/v1/").unwrap(),
            "http://localhost:8000/v1"
        );
    }

    #[test]
    fn test_normalize_base_url_rejects_garbage() {
        assert!(matches!(
            normalize_base_url("not a url"),
            Err(ApiError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            normalize_base_url("ftp://example.com"),
            Err(ApiError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_explicit_key_wins_over_env() {
        let key = resolve_api_key(Some("explicit".to_string()), "KULL_TEST_UNSET_KEY_VAR");
        assert_eq!(key.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_missing_key_names_variable() {
        let err = require_api_key(None, "KULL_TEST_UNSET_KEY_VAR").unwrap_err();
        assert_eq!(err.to_string(), "KULL_TEST_UNSET_KEY_VAR is not set");
    }
}
