//! Configuration for the diagnostic checks.

use apim_openai_core::auth::GatewayCredential;
use apim_openai_core::client::GatewayClient;
use apim_openai_core::error::GatewayResult;

/// Environment variable that overrides [`DEFAULT_APIM_ENDPOINT`].
pub const ENDPOINT_ENV_VAR: &str = "APIM_ENDPOINT";

/// Gateway used when `APIM_ENDPOINT` is not set.
pub const DEFAULT_APIM_ENDPOINT: &str = "https://apim-acc-genaishared-lxpp27stioik4.azure-api.net";

/// Azure OpenAI data-plane API version the checks call.
pub const API_VERSION: &str = "2024-02-15-preview";

/// Deployment the checks call.
pub const DEPLOYMENT_NAME: &str = "gpt-4o-mini-2024-07-18";

/// Immutable settings shared by both checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConfig {
    endpoint: String,
    api_version: String,
    deployment: String,
}

impl CheckConfig {
    /// Build the configuration from an optional endpoint override.
    ///
    /// A missing or blank override falls back to [`DEFAULT_APIM_ENDPOINT`].
    pub fn new(endpoint_override: Option<String>) -> Self {
        let endpoint = endpoint_override
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_APIM_ENDPOINT.to_string());

        Self {
            endpoint,
            api_version: API_VERSION.to_string(),
            deployment: DEPLOYMENT_NAME.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    /// Build a gateway client for this configuration.
    pub fn client(&self, credential: GatewayCredential) -> GatewayResult<GatewayClient> {
        GatewayClient::builder()
            .endpoint(&self.endpoint)
            .api_version(&self.api_version)
            .credential(credential)
            .build()
    }
}
