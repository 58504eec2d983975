//! # apim_openai_core
//!
//! Credentials, error type, and HTTP client for calling Azure OpenAI
//! deployments through an Azure API Management gateway.
//!
//! - [`auth`] - API key and Microsoft Entra ID bearer-token credentials
//! - [`client`] - [`client::GatewayClient`] and its builder
//! - [`error`] - [`GatewayError`] and [`error::GatewayResult`]
//! - [`models`] - types shared by the API crates

pub mod auth;
pub mod client;
pub mod error;
pub mod models;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::GatewayError;
