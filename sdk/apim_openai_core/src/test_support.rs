//! Test helpers shared with sibling crates through the `test-support` feature.

use crate::auth::GatewayCredential;
use crate::client::GatewayClient;
use azure_core::credentials::{AccessToken, Secret, TokenCredential, TokenRequestOptions};
use azure_core::error::ErrorKind;
use azure_core::time::OffsetDateTime;
use std::sync::{Arc, Mutex};
use wiremock::MockServer;

/// API version used by mock clients.
pub const TEST_API_VERSION: &str = "2024-02-15-preview";

/// Bearer token handed out by [`StaticTokenCredential`] in mock clients.
pub const TEST_TOKEN: &str = "test-token";

/// A [`TokenCredential`] that always returns the same token and records the
/// scopes it was asked for.
#[derive(Debug)]
pub struct StaticTokenCredential {
    token: String,
    scopes: Mutex<Vec<String>>,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            token: token.into(),
            scopes: Mutex::new(Vec::new()),
        })
    }

    /// Scopes requested so far, in call order.
    pub fn requested_scopes(&self) -> Vec<String> {
        self.scopes.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(
        &self,
        scopes: &[&str],
        _options: Option<TokenRequestOptions<'_>>,
    ) -> azure_core::Result<AccessToken> {
        if let Ok(mut seen) = self.scopes.lock() {
            seen.extend(scopes.iter().map(|s| s.to_string()));
        }
        Ok(AccessToken::new(
            Secret::new(self.token.clone()),
            OffsetDateTime::now_utc(),
        ))
    }
}

/// A [`TokenCredential`] whose every token request fails.
#[derive(Debug)]
pub struct FailingTokenCredential {
    message: String,
}

impl FailingTokenCredential {
    pub fn new(message: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            message: message.into(),
        })
    }
}

#[async_trait::async_trait]
impl TokenCredential for FailingTokenCredential {
    async fn get_token(
        &self,
        _scopes: &[&str],
        _options: Option<TokenRequestOptions<'_>>,
    ) -> azure_core::Result<AccessToken> {
        Err(azure_core::Error::new(
            ErrorKind::Credential,
            self.message.clone(),
        ))
    }
}

/// Create a client pointed at a mock server, authenticated with [`TEST_TOKEN`].
pub fn setup_mock_client(server: &MockServer) -> GatewayClient {
    GatewayClient::builder()
        .endpoint(server.uri())
        .api_version(TEST_API_VERSION)
        .credential(GatewayCredential::token_credential(StaticTokenCredential::new(
            TEST_TOKEN,
        )))
        .build()
        .expect("should build client")
}
