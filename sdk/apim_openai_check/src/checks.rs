//! The two diagnostic checks.
//!
//! Each check acquires its own credential, builds its own client, makes one
//! call, and prints the result. Any failure is printed as a single line and
//! reported as [`CheckOutcome::Failed`]; nothing propagates to the caller.

use crate::config::CheckConfig;
use crate::report;
use apim_openai_core::auth::GatewayCredential;
use apim_openai_core::error::{GatewayError, GatewayResult};
use apim_openai_core::models::Usage;
use apim_openai_models::chat::{self, ChatCompletionRequest, Message};
use apim_openai_models::stream::ChatCompletionChunk;
use futures::StreamExt;
use std::io::{self, Write};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const USER_PROMPT: &str = "What is Azure API Management?";

pub const CHAT_MAX_TOKENS: u32 = 150;
pub const CHAT_TEMPERATURE: f32 = 0.7;
pub const STREAM_MAX_TOKENS: u32 = 100;

/// Source of a fresh credential for each check.
pub trait CredentialProvider {
    fn credential(&self) -> GatewayResult<GatewayCredential>;
}

impl<F> CredentialProvider for F
where
    F: Fn() -> GatewayResult<GatewayCredential>,
{
    fn credential(&self) -> GatewayResult<GatewayCredential> {
        self()
    }
}

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    Failed(String),
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

#[derive(Debug, thiserror::Error)]
enum CheckFailure {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Keep the most recent usage seen in a stream.
pub fn fold_usage(last: Option<Usage>, chunk: &ChatCompletionChunk) -> Option<Usage> {
    chunk.usage.or(last)
}

/// Request a single chat completion and print the model, text, and usage.
#[tracing::instrument(
    name = "apim::check::chat_completion",
    skip_all,
    fields(deployment = %config.deployment())
)]
pub async fn chat_completion(
    config: &CheckConfig,
    credentials: &dyn CredentialProvider,
    out: &mut dyn Write,
) -> CheckOutcome {
    match run_chat_completion(config, credentials, out).await {
        Ok(()) => CheckOutcome::Passed,
        Err(e) => {
            tracing::warn!(error = ?e, "chat completion check failed");
            let message = e.to_string();
            let _ = writeln!(out, "✗ Error during chat completion: {message}");
            CheckOutcome::Failed(message)
        }
    }
}

async fn run_chat_completion(
    config: &CheckConfig,
    credentials: &dyn CredentialProvider,
    out: &mut dyn Write,
) -> Result<(), CheckFailure> {
    let client = config.client(credentials.credential()?)?;

    let request = ChatCompletionRequest::builder()
        .deployment(config.deployment())
        .message(Message::system(SYSTEM_PROMPT))
        .message(Message::user(USER_PROMPT))
        .max_tokens(CHAT_MAX_TOKENS)
        .temperature(CHAT_TEMPERATURE)
        .build()?;

    let response = chat::complete(&client, &request).await?;

    let choice = response
        .choices
        .first()
        .ok_or_else(|| GatewayError::InvalidResponse("response contained no choices".into()))?;
    let usage = response
        .usage
        .ok_or_else(|| GatewayError::InvalidResponse("response did not report usage".into()))?;

    writeln!(out, "✓ Chat completion successful!")?;
    writeln!(out, "\nModel: {}", response.model)?;
    writeln!(
        out,
        "\nResponse:\n{}",
        choice.message.content.as_deref().unwrap_or_default()
    )?;
    report::usage(out, &usage)?;
    Ok(())
}

/// Request a streamed completion and print the fragments as they arrive.
#[tracing::instrument(
    name = "apim::check::streaming_completion",
    skip_all,
    fields(deployment = %config.deployment())
)]
pub async fn streaming_completion(
    config: &CheckConfig,
    credentials: &dyn CredentialProvider,
    out: &mut dyn Write,
) -> CheckOutcome {
    match run_streaming_completion(config, credentials, out).await {
        Ok(()) => CheckOutcome::Passed,
        Err(e) => {
            tracing::warn!(error = ?e, "streaming completion check failed");
            let message = e.to_string();
            let _ = writeln!(out, "\n✗ Error during streaming completion: {message}");
            CheckOutcome::Failed(message)
        }
    }
}

async fn run_streaming_completion(
    config: &CheckConfig,
    credentials: &dyn CredentialProvider,
    out: &mut dyn Write,
) -> Result<(), CheckFailure> {
    writeln!(out, "\n✓ Starting streaming completion...")?;

    let client = config.client(credentials.credential()?)?;

    let request = ChatCompletionRequest::builder()
        .deployment(config.deployment())
        .message(Message::user(USER_PROMPT))
        .max_tokens(STREAM_MAX_TOKENS)
        .build()?;

    let mut stream = chat::complete_stream(&client, &request).await?;

    writeln!(out, "\nStreamed response:")?;
    let mut usage = None;
    let mut fragments = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if let Some(text) = chunk.content() {
            write!(out, "{text}")?;
            out.flush()?;
            fragments += 1;
        }
        usage = fold_usage(usage, &chunk);
    }
    tracing::debug!(fragments, usage_reported = usage.is_some(), "stream complete");

    writeln!(out, "\n")?;
    if let Some(usage) = usage {
        report::usage(out, &usage)?;
    }
    writeln!(out, "\n✓ Streaming completion successful!")?;
    Ok(())
}
