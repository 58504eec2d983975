use thiserror::Error;

/// Errors that can occur when talking to Azure OpenAI through the gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The gateway or backend answered with a non-success status and a body
    /// that was not a structured API error.
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// A credential could not be created or a token could not be acquired.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A payload could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request failed at the transport level.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint URL is invalid.
    #[error("Invalid endpoint URL: {message}")]
    InvalidEndpoint {
        message: String,
        #[source]
        source: Option<url::ParseError>,
    },

    /// A required configuration value is missing.
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// The API returned an `{"error": {...}}` response.
    #[error("API error ({code}): {message}")]
    Api { code: String, message: String },

    /// The event stream could not be read or parsed.
    #[error("Stream error: {0}")]
    Stream(String),

    /// The response decoded but lacks something the caller needs.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Build an [`GatewayError::Http`] error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Build an [`GatewayError::InvalidEndpoint`] error that keeps the parse failure.
    pub fn invalid_endpoint_with_source(message: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidEndpoint {
            message: format!("{}: {}", message.into(), source),
            source: Some(source),
        }
    }

    /// Build an [`GatewayError::InvalidEndpoint`] error without an underlying cause.
    pub fn invalid_endpoint(message: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            message: message.into(),
            source: None,
        }
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
