//! HTTP client for Azure OpenAI deployments behind an API Management gateway.
//!
//! [`GatewayClient`] binds a gateway endpoint, an API version, and a
//! [`GatewayCredential`]. Every request gets the credential's auth header and
//! the `api-version` query parameter.
//!
//! # Example
//!
//! ```rust,no_run
//! use apim_openai_core::auth::GatewayCredential;
//! use apim_openai_core::client::GatewayClient;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GatewayClient::builder()
//!     .endpoint("https://my-apim.azure-api.net")
//!     .api_version("2024-02-15-preview")
//!     .credential(GatewayCredential::default_azure()?)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::auth::GatewayCredential;
use crate::error::{GatewayError, GatewayResult};
use reqwest::Client as HttpClient;
use url::Url;

use std::time::Duration;

/// Default Azure OpenAI data-plane API version.
pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

/// Default connection timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read/response timeout (60 seconds).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Default streaming timeout (5 minutes).
///
/// Applies to the whole streamed response, so it is longer than the read timeout.
pub const DEFAULT_STREAMING_TIMEOUT: Duration = Duration::from_secs(300);

/// Longest error message kept from a response body.
const MAX_ERROR_MESSAGE_LEN: usize = 1000;

const REDACTED: &str = "[REDACTED]";

/// Client for one gateway endpoint.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    pub(crate) http: HttpClient,
    pub(crate) endpoint: Url,
    pub(crate) credential: GatewayCredential,
    pub(crate) api_version: String,
    pub(crate) streaming_timeout: Duration,
}

/// Builder for [`GatewayClient`].
#[derive(Debug, Default)]
pub struct GatewayClientBuilder {
    endpoint: Option<String>,
    credential: Option<GatewayCredential>,
    api_version: Option<String>,
    http_client: Option<HttpClient>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    streaming_timeout: Option<Duration>,
}

impl GatewayClient {
    pub fn builder() -> GatewayClientBuilder {
        GatewayClientBuilder::default()
    }

    /// The gateway base URL, always ending in `/`.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn streaming_timeout(&self) -> Duration {
        self.streaming_timeout
    }

    /// Build the full URL for an API path, including the `api-version` query.
    ///
    /// Paths are resolved relative to the endpoint, so a gateway base path
    /// such as `https://apim.example.net/aoai/` is kept.
    pub fn url(&self, path: &str) -> GatewayResult<Url> {
        let mut url = self
            .endpoint
            .join(path.trim_start_matches('/'))
            .map_err(|e| GatewayError::invalid_endpoint_with_source("failed to construct URL", e))?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    /// Send a POST request with a JSON body and return the successful response.
    ///
    /// Non-2xx responses are turned into [`GatewayError::Api`] or
    /// [`GatewayError::Http`]. Nothing is retried.
    pub async fn post<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> GatewayResult<reqwest::Response> {
        let url = self.url(path)?;
        let (header, value) = self.credential.resolve().await?;

        tracing::trace!(%url, "sending request");
        let response = self
            .http
            .post(url)
            .header(header, value)
            .json(body)
            .send()
            .await?;

        Self::check_response(response).await
    }

    /// Send a POST request whose response body is an event stream.
    ///
    /// Uses the streaming timeout instead of the read timeout. Only the status
    /// line is checked; the caller owns the body.
    pub async fn post_stream<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> GatewayResult<reqwest::Response> {
        let url = self.url(path)?;
        let (header, value) = self.credential.resolve().await?;

        tracing::trace!(%url, "sending streaming request");
        let response = self
            .http
            .post(url)
            .header(header, value)
            .header("Accept", "text/event-stream")
            .timeout(self.streaming_timeout)
            .json(body)
            .send()
            .await?;

        Self::check_response(response).await
    }

    /// Replace bearer tokens and `sk-` keys in `msg` with `[REDACTED]`.
    pub(crate) fn sanitize_error_message(msg: &str) -> String {
        let redacted = redact_after(msg, "Bearer ", true);
        redact_after(&redacted, "sk-", false)
    }

    /// Sanitize, then cap the message at [`MAX_ERROR_MESSAGE_LEN`] bytes.
    pub(crate) fn truncate_message(msg: &str) -> String {
        let sanitized = Self::sanitize_error_message(msg);
        if sanitized.len() <= MAX_ERROR_MESSAGE_LEN {
            return sanitized;
        }

        let mut cut = MAX_ERROR_MESSAGE_LEN;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... (truncated)", &sanitized[..cut])
    }

    async fn check_response(response: reqwest::Response) -> GatewayResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status, "gateway returned an error status");

        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
            if let Some(err_obj) = value.get("error") {
                let code = err_obj
                    .get("code")
                    .and_then(|c| c.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                let message = err_obj
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or(&body);
                return Err(GatewayError::Api {
                    code,
                    message: Self::truncate_message(message),
                });
            }
        }

        Err(GatewayError::http(status, Self::truncate_message(&body)))
    }
}

/// Redact every token that follows `marker`.
///
/// A token runs until whitespace, a quote, or a comma. With `keep_marker`
/// the marker itself stays in the output.
fn redact_after(msg: &str, marker: &str, keep_marker: bool) -> String {
    let is_delim = |c: char| c.is_whitespace() || matches!(c, '"' | '\'' | ',');

    let mut out = String::with_capacity(msg.len());
    let mut rest = msg;
    while let Some(pos) = rest.find(marker) {
        let after = &rest[pos + marker.len()..];
        let token_len = after.find(is_delim).unwrap_or(after.len());

        let mid_word = rest[..pos]
            .chars()
            .next_back()
            .is_some_and(char::is_alphanumeric);

        out.push_str(&rest[..pos]);
        if mid_word || token_len == 0 || after.starts_with(REDACTED) {
            out.push_str(marker);
            rest = after;
            continue;
        }
        if keep_marker {
            out.push_str(marker);
        }
        out.push_str(REDACTED);
        rest = &after[token_len..];
    }
    out.push_str(rest);
    out
}

impl GatewayClientBuilder {
    /// Set the gateway endpoint, e.g. `https://<apim-name>.azure-api.net`.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn credential(mut self, credential: GatewayCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Set the API version. Defaults to [`DEFAULT_API_VERSION`].
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Use a preconfigured HTTP client.
    ///
    /// **Note:** connect and read timeouts set on this builder are ignored
    /// when a custom client is supplied.
    pub fn http_client(mut self, client: HttpClient) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the timeout for streamed responses. Defaults to [`DEFAULT_STREAMING_TIMEOUT`].
    pub fn streaming_timeout(mut self, timeout: Duration) -> Self {
        self.streaming_timeout = Some(timeout);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Fails when the endpoint or credential is missing, the endpoint is not
    /// an absolute `http`/`https` URL, or the HTTP client cannot be created.
    pub fn build(self) -> GatewayResult<GatewayClient> {
        let http = match self.http_client {
            Some(http) => http,
            None => HttpClient::builder()
                .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
                .timeout(self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT))
                .build()?,
        };

        let endpoint_str = self
            .endpoint
            .ok_or_else(|| GatewayError::MissingConfig("endpoint is required".into()))?;

        let mut endpoint = Url::parse(endpoint_str.trim())
            .map_err(|e| GatewayError::invalid_endpoint_with_source("invalid endpoint URL", e))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(GatewayError::invalid_endpoint(format!(
                "unsupported scheme '{}'",
                endpoint.scheme()
            )));
        }
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let credential = self
            .credential
            .ok_or_else(|| GatewayError::MissingConfig("credential is required".into()))?;

        Ok(GatewayClient {
            http,
            endpoint,
            credential,
            api_version: self
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            streaming_timeout: self.streaming_timeout.unwrap_or(DEFAULT_STREAMING_TIMEOUT),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{setup_mock_client, FailingTokenCredential, TEST_TOKEN};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(endpoint: &str) -> GatewayClient {
        GatewayClient::builder()
            .endpoint(endpoint)
            .credential(GatewayCredential::api_key("test"))
            .build()
            .expect("should build")
    }

    #[test]
    fn builder_requires_endpoint() {
        let result = GatewayClient::builder()
            .credential(GatewayCredential::api_key("test"))
            .build();

        assert!(matches!(result.unwrap_err(), GatewayError::MissingConfig(_)));
    }

    #[test]
    fn builder_requires_credential() {
        let result = GatewayClient::builder()
            .endpoint("https://apim.azure-api.net")
            .build();

        let err = result.unwrap_err();
        assert!(matches!(err, GatewayError::MissingConfig(_)));
        assert!(err.to_string().contains("credential"));
    }

    #[test]
    fn builder_invalid_endpoint_url() {
        let result = GatewayClient::builder()
            .endpoint("not a valid url")
            .credential(GatewayCredential::api_key("test"))
            .build();

        assert!(matches!(
            result.unwrap_err(),
            GatewayError::InvalidEndpoint { .. }
        ));
    }

    #[test]
    fn builder_rejects_non_http_scheme() {
        let result = GatewayClient::builder()
            .endpoint("ftp://apim.azure-api.net")
            .credential(GatewayCredential::api_key("test"))
            .build();

        assert!(matches!(
            result.unwrap_err(),
            GatewayError::InvalidEndpoint { source: None, .. }
        ));
    }

    #[test]
    fn builder_defaults() {
        let client = test_client("https://apim.azure-api.net");

        assert_eq!(client.endpoint().as_str(), "https://apim.azure-api.net/");
        assert_eq!(client.api_version(), DEFAULT_API_VERSION);
        assert_eq!(client.streaming_timeout(), DEFAULT_STREAMING_TIMEOUT);
    }

    #[test]
    fn builder_accepts_overrides() {
        let client = GatewayClient::builder()
            .endpoint("https://apim.azure-api.net")
            .credential(GatewayCredential::api_key("test"))
            .api_version("2024-10-21")
            .connect_timeout(Duration::from_secs(5))
            .read_timeout(Duration::from_secs(30))
            .streaming_timeout(Duration::from_secs(120))
            .build()
            .expect("should build");

        assert_eq!(client.api_version(), "2024-10-21");
        assert_eq!(client.streaming_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn custom_http_client_is_accepted() {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .expect("should build custom client");

        let client = GatewayClient::builder()
            .endpoint("https://apim.azure-api.net")
            .credential(GatewayCredential::api_key("test"))
            .http_client(http)
            .read_timeout(Duration::from_secs(99))
            .build()
            .expect("should build");

        assert_eq!(client.endpoint().as_str(), "https://apim.azure-api.net/");
    }

    #[test]
    fn url_appends_api_version() {
        let client = test_client("https://apim.azure-api.net");
        let url = client
            .url("/openai/deployments/gpt-4o-mini/chat/completions")
            .expect("should join");

        assert_eq!(
            url.as_str(),
            "https://apim.azure-api.net/openai/deployments/gpt-4o-mini/chat/completions?api-version=2024-02-15-preview"
        );
    }

    #[test]
    fn url_keeps_gateway_base_path() {
        let client = test_client("https://apim.azure-api.net/aoai");
        let url = client
            .url("/openai/deployments/gpt-4o-mini/chat/completions")
            .expect("should join");

        assert_eq!(
            url.path(),
            "/aoai/openai/deployments/gpt-4o-mini/chat/completions"
        );
    }

    #[test]
    fn client_is_cloneable() {
        let client = test_client("https://apim.azure-api.net");
        let cloned = client.clone();
        assert_eq!(client.endpoint(), cloned.endpoint());
    }

    // --- Wiremock tests ---

    #[tokio::test]
    async fn post_sends_bearer_token_and_api_version() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/openai/deployments/d/chat/completions"))
            .and(query_param("api-version", "2024-02-15-preview"))
            .and(header("Authorization", format!("Bearer {TEST_TOKEN}").as_str()))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let response = client
            .post("/openai/deployments/d/chat/completions", &serde_json::json!({}))
            .await
            .expect("should succeed");

        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn post_with_api_key_sends_api_key_header() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(header("api-key", "key-123"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = GatewayClient::builder()
            .endpoint(server.uri())
            .credential(GatewayCredential::api_key("key-123"))
            .build()
            .expect("should build");

        client
            .post("/echo", &serde_json::json!({}))
            .await
            .expect("should succeed");
    }

    #[tokio::test]
    async fn post_does_not_send_when_token_fails() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = GatewayClient::builder()
            .endpoint(server.uri())
            .credential(GatewayCredential::token_credential(
                FailingTokenCredential::new("no identity available"),
            ))
            .build()
            .expect("should build");

        let err = client
            .post("/echo", &serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Auth(_)));
    }

    #[tokio::test]
    async fn post_401_with_plain_body_is_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let err = client.post("/x", &serde_json::json!({})).await.unwrap_err();

        match err {
            GatewayError::Http { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Unauthorized");
            }
            other => panic!("Expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn post_400_with_error_object_is_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {
                    "code": "DeploymentNotFound",
                    "message": "The API deployment for this resource does not exist."
                }
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let err = client.post("/x", &serde_json::json!({})).await.unwrap_err();

        match err {
            GatewayError::Api { code, message } => {
                assert_eq!(code, "DeploymentNotFound");
                assert_eq!(message, "The API deployment for this resource does not exist.");
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn post_error_object_without_message_falls_back_to_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": {"code": "SomeError"}
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let err = client.post("/x", &serde_json::json!({})).await.unwrap_err();

        match err {
            GatewayError::Api { code, message } => {
                assert_eq!(code, "SomeError");
                assert!(message.contains("SomeError"));
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn post_429_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Rate limit is exceeded."))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let err = client.post("/x", &serde_json::json!({})).await.unwrap_err();

        assert!(matches!(err, GatewayError::Http { status: 429, .. }));
    }

    #[tokio::test]
    async fn post_stream_sets_accept_header() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header("Accept", "text/event-stream"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string("data: [DONE]\n\n"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let response = client
            .post_stream("/x", &serde_json::json!({"stream": true}))
            .await
            .expect("should succeed");

        assert_eq!(response.text().await.unwrap(), "data: [DONE]\n\n");
    }

    #[tokio::test]
    async fn post_stream_error_status_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let err = client
            .post_stream("/x", &serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Http { status: 503, .. }));
    }

    #[tokio::test]
    async fn request_times_out_with_configured_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("OK")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = GatewayClient::builder()
            .endpoint(server.uri())
            .credential(GatewayCredential::api_key("test"))
            .read_timeout(Duration::from_millis(300))
            .build()
            .expect("should build");

        let err = client.post("/slow", &serde_json::json!({})).await.unwrap_err();
        assert!(
            matches!(err, GatewayError::Request(_)),
            "Expected Request error from timeout, got {err:?}"
        );
    }

    // --- Sanitization ---

    #[tokio::test]
    async fn error_sanitization_removes_bearer_tokens() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {
                    "code": "401",
                    "message": "Invalid token: Bearer eyJ0eXAiOiJKV1QiLCJhbGciOi"
                }
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let err = client.post("/x", &serde_json::json!({})).await.unwrap_err();
        let text = err.to_string();

        assert!(!text.contains("eyJ0eXAiOiJKV1QiLCJhbGciOi"), "got: {text}");
        assert!(text.contains("Bearer [REDACTED]"), "got: {text}");
    }

    #[test]
    fn sanitization_preserves_legitimate_errors() {
        let msg = "The API deployment for this resource does not exist.";
        assert_eq!(GatewayClient::sanitize_error_message(msg), msg);
    }

    #[test]
    fn sanitization_multiple_tokens() {
        let msg = "Token Bearer abc123 and key sk-xyz789 both invalid";
        let result = GatewayClient::sanitize_error_message(msg);

        assert_eq!(
            result,
            "Token Bearer [REDACTED] and key [REDACTED] both invalid"
        );
    }

    #[test]
    fn sanitization_ignores_markers_inside_words() {
        let msg = "Use a task-based quota policy";
        assert_eq!(GatewayClient::sanitize_error_message(msg), msg);
    }

    #[test]
    fn sanitization_is_idempotent() {
        let once = GatewayClient::sanitize_error_message("Bearer abc, Bearer def");
        let twice = GatewayClient::sanitize_error_message(&once);

        assert_eq!(once, "Bearer [REDACTED], Bearer [REDACTED]");
        assert_eq!(once, twice);
    }

    #[test]
    fn sanitization_before_truncation() {
        let token = "sk-verylongtokenthatmightbetrimmed123456789";
        let msg = format!("{} token: {}", "x".repeat(990), token);

        let result = GatewayClient::truncate_message(&msg);

        assert!(!result.contains("sk-verylongtoken"));
        assert!(result.ends_with("... (truncated)"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let msg = "é".repeat(MAX_ERROR_MESSAGE_LEN);
        let result = GatewayClient::truncate_message(&msg);

        assert!(result.ends_with("... (truncated)"));
    }
}
