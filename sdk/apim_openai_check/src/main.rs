use apim_openai_check::config::{CheckConfig, ENDPOINT_ENV_VAR};
use apim_openai_core::auth::GatewayCredential;
use std::process::ExitCode;

/// Logs go to stderr so stdout carries only the transcript.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();

    let config = CheckConfig::new(std::env::var(ENDPOINT_ENV_VAR).ok());
    tracing::debug!(endpoint = config.endpoint(), "configuration loaded");

    let mut stdout = std::io::stdout().lock();
    let summary = apim_openai_check::run(&config, &GatewayCredential::default_azure, &mut stdout).await;

    ExitCode::from(summary.exit_code())
}
