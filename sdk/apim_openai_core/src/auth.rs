//! Credentials for calling Azure OpenAI through an API Management gateway.
//!
//! Token-based credentials delegate to [`azure_identity`]; this module only
//! binds them to an audience scope and turns them into request headers.

use crate::error::{GatewayError, GatewayResult};
use azure_core::credentials::TokenCredential;
use azure_identity::{DeveloperToolsCredential, ManagedIdentityCredential};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

/// Audience for Azure AI services (Cognitive Services) tokens.
pub const COGNITIVE_SERVICES_SCOPE: &str = "https://cognitiveservices.azure.com/.default";

/// Header used for Azure OpenAI API keys.
pub const API_KEY_HEADER: &str = "api-key";

/// Header used for bearer tokens.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Environment variables set by hosts that expose a managed identity endpoint.
const MANAGED_IDENTITY_ENV_VARS: [&str; 2] = ["IDENTITY_ENDPOINT", "MSI_ENDPOINT"];

/// Credential types supported by the gateway client.
#[derive(Clone)]
pub enum GatewayCredential {
    /// Azure OpenAI API key, sent in the `api-key` header.
    ApiKey(SecretString),

    /// Microsoft Entra ID token provider bound to a scope, sent as a bearer token.
    TokenCredential {
        credential: Arc<dyn TokenCredential>,
        scope: String,
    },
}

impl GatewayCredential {
    /// Create an API key credential.
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey(SecretString::from(key.into()))
    }

    /// Wrap any [`TokenCredential`] as a bearer-token provider for
    /// [`COGNITIVE_SERVICES_SCOPE`].
    pub fn token_credential(credential: Arc<dyn TokenCredential>) -> Self {
        Self::token_credential_with_scope(credential, COGNITIVE_SERVICES_SCOPE)
    }

    /// Wrap any [`TokenCredential`] as a bearer-token provider for `scope`.
    pub fn token_credential_with_scope(
        credential: Arc<dyn TokenCredential>,
        scope: impl Into<String>,
    ) -> Self {
        Self::TokenCredential {
            credential,
            scope: scope.into(),
        }
    }

    /// Pick an Entra ID credential for the current environment.
    ///
    /// Uses the managed identity when the host advertises one through
    /// `IDENTITY_ENDPOINT` or `MSI_ENDPOINT`, otherwise the developer tools
    /// credential (Azure CLI, then Azure Developer CLI).
    pub fn default_azure() -> GatewayResult<Self> {
        let managed = MANAGED_IDENTITY_ENV_VARS
            .iter()
            .any(|var| std::env::var(var).is_ok_and(|v| !v.is_empty()));

        let credential: Arc<dyn TokenCredential> = if managed {
            tracing::debug!("using managed identity credential");
            ManagedIdentityCredential::new(None).map_err(|e| {
                GatewayError::Auth(format!("failed to create managed identity credential: {e}"))
            })?
        } else {
            tracing::debug!("using developer tools credential");
            DeveloperToolsCredential::new(None).map_err(|e| {
                GatewayError::Auth(format!("failed to create developer tools credential: {e}"))
            })?
        };

        Ok(Self::token_credential(credential))
    }

    /// Resolve the credential to a `(header name, header value)` pair.
    ///
    /// Token credentials are asked for a token on every call; caching and
    /// refresh are left to the underlying [`TokenCredential`].
    pub async fn resolve(&self) -> GatewayResult<(&'static str, String)> {
        match self {
            Self::ApiKey(key) => Ok((API_KEY_HEADER, key.expose_secret().to_string())),
            Self::TokenCredential { credential, scope } => {
                let token = credential
                    .get_token(&[scope.as_str()], None)
                    .await
                    .map_err(|e| {
                        GatewayError::Auth(format!("failed to acquire token for {scope}: {e}"))
                    })?;
                Ok((
                    AUTHORIZATION_HEADER,
                    format!("Bearer {}", token.token.secret()),
                ))
            }
        }
    }
}

impl std::fmt::Debug for GatewayCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => write!(f, "GatewayCredential::ApiKey(****)"),
            Self::TokenCredential { scope, .. } => {
                write!(f, "GatewayCredential::TokenCredential({scope})")
            }
        }
    }
}
