//! # apim_openai_check
//!
//! Diagnostic for Azure OpenAI behind an API Management gateway. Runs a
//! blocking chat completion and a streamed chat completion, prints what came
//! back, and summarizes pass/fail.

pub mod checks;
pub mod config;
pub mod report;

use checks::{CheckOutcome, CredentialProvider};
use config::CheckConfig;
use report::Summary;
use std::io::Write;

/// Number of checks [`run`] performs.
pub const CHECK_COUNT: usize = 2;

/// Run both checks in order and print the banner and summary.
///
/// Output failures while printing the banner or the summary are ignored; the
/// returned [`Summary`] only reflects the checks.
pub async fn run(
    config: &CheckConfig,
    credentials: &dyn CredentialProvider,
    out: &mut dyn Write,
) -> Summary {
    let _ = report::banner(out, config);

    let mut results = Vec::with_capacity(CHECK_COUNT);

    let _ = report::check_header(out, 1, CHECK_COUNT, "chat completion");
    let outcome = checks::chat_completion(config, credentials, out).await;
    results.push(record("chat completion", &outcome));

    let _ = report::check_header(out, 2, CHECK_COUNT, "streaming completion");
    let outcome = checks::streaming_completion(config, credentials, out).await;
    results.push(record("streaming completion", &outcome));

    let summary = Summary::from_results(&results);
    let _ = report::summary(out, &summary);
    let _ = out.flush();

    tracing::info!(passed = summary.passed, total = summary.total, "checks finished");
    summary
}

fn record(check: &str, outcome: &CheckOutcome) -> bool {
    match outcome {
        CheckOutcome::Passed => tracing::info!(check, "check passed"),
        CheckOutcome::Failed(reason) => tracing::info!(check, %reason, "check failed"),
    }
    outcome.passed()
}
