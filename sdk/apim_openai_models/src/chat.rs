//! Chat completion types and API calls for Azure OpenAI deployments.

use crate::stream::{self, ChatCompletionStream};
use apim_openai_core::client::GatewayClient;
use apim_openai_core::error::{GatewayError, GatewayResult};
use apim_openai_core::models::Usage;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// A chat completion request against one deployment.
///
/// The deployment selects the model and is part of the URL, not the body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    #[serde(skip)]
    pub deployment: String,

    pub messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

/// Builder for [`ChatCompletionRequest`].
#[derive(Debug, Default)]
pub struct ChatCompletionRequestBuilder {
    deployment: Option<String>,
    messages: Vec<Message>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    max_tokens: Option<u32>,
    stop: Option<Vec<String>>,
}

impl ChatCompletionRequest {
    pub fn builder() -> ChatCompletionRequestBuilder {
        ChatCompletionRequestBuilder::default()
    }

    /// API path for this request's deployment.
    pub fn path(&self) -> String {
        format!("/openai/deployments/{}/chat/completions", self.deployment)
    }
}

impl ChatCompletionRequestBuilder {
    pub fn deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = Some(deployment.into());
        self
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Build the request.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MissingConfig`] if no deployment was set or
    /// the deployment name is blank, and if no message was added.
    pub fn build(self) -> GatewayResult<ChatCompletionRequest> {
        let deployment = self
            .deployment
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| GatewayError::MissingConfig("deployment is required".into()))?;

        if self.messages.is_empty() {
            return Err(GatewayError::MissingConfig(
                "at least one message is required".into(),
            ));
        }

        Ok(ChatCompletionRequest {
            deployment,
            messages: self.messages,
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            stream: None,
            stop: self.stop,
        })
    }
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
        }
    }
}

/// The role of a message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A chat completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if any.
    pub fn content(&self) -> Option<&str> {
        self.choices.first()?.message.content.as_deref()
    }
}

/// A single choice in a chat completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: Message,
    pub finish_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

/// Send a chat completion request and wait for the full response.
///
/// # Example
///
/// ```rust,no_run
/// # use apim_openai_core::client::GatewayClient;
/// # use apim_openai_models::chat::*;
/// # async fn example(client: &GatewayClient) -> apim_openai_core::error::GatewayResult<()> {
/// let request = ChatCompletionRequest::builder()
///     .deployment("gpt-4o-mini")
///     .message(Message::system("You are a helpful assistant."))
///     .message(Message::user("What is Azure API Management?"))
///     .max_tokens(150)
///     .temperature(0.7)
///     .build()?;
///
/// let response = complete(client, &request).await?;
/// println!("{:?}", response.content());
/// # Ok(())
/// # }
/// ```
///
/// # Tracing
///
/// Emits a span named `apim::chat::complete` with field `deployment`.
#[tracing::instrument(
    name = "apim::chat::complete",
    skip(client, request),
    fields(deployment = %request.deployment)
)]
pub async fn complete(
    client: &GatewayClient,
    request: &ChatCompletionRequest,
) -> GatewayResult<ChatCompletionResponse> {
    tracing::debug!("sending chat completion");

    let response = client.post(&request.path(), request).await?;
    let body = response.json::<ChatCompletionResponse>().await?;

    tracing::debug!(
        model = %body.model,
        choices = body.choices.len(),
        "chat completion received"
    );
    Ok(body)
}

/// Send a chat completion request with `stream: true` and return the chunks
/// as they arrive.
///
/// Errors before the first byte (credential, status) are returned directly;
/// errors while reading come out of the stream.
///
/// # Example
///
/// ```rust,no_run
/// # use apim_openai_core::client::GatewayClient;
/// # use apim_openai_models::chat::*;
/// # use futures::StreamExt;
/// # async fn example(client: &GatewayClient) -> apim_openai_core::error::GatewayResult<()> {
/// let request = ChatCompletionRequest::builder()
///     .deployment("gpt-4o-mini")
///     .message(Message::user("What is Azure API Management?"))
///     .max_tokens(100)
///     .build()?;
///
/// let mut stream = complete_stream(client, &request).await?;
/// while let Some(chunk) = stream.next().await {
///     if let Some(text) = chunk?.content() {
///         print!("{text}");
///     }
/// }
/// # Ok(())
/// # }
/// ```
///
/// # Tracing
///
/// Emits a span named `apim::chat::complete_stream` with field `deployment`.
#[tracing::instrument(
    name = "apim::chat::complete_stream",
    skip(client, request),
    fields(deployment = %request.deployment)
)]
pub async fn complete_stream(
    client: &GatewayClient,
    request: &ChatCompletionRequest,
) -> GatewayResult<ChatCompletionStream> {
    tracing::debug!("starting streamed chat completion");

    let mut request = request.clone();
    request.stream = Some(true);

    let response = client.post_stream(&request.path(), &request).await?;

    tracing::debug!("event stream opened");
    Ok(stream::decode_sse(response.bytes_stream()))
}
