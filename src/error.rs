//! Error types for the gateway.

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("{message}")]
    Unauthorized { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Bridge returned status {status}: {body}")]
    BackendStatus { status: u16, body: String },

    #[error("Malformed bridge response: {message}")]
    MalformedResponse { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl GatewayError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: msg.into(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    pub fn backend_status(status: u16, body: impl Into<String>) -> Self {
        Self::BackendStatus {
            status,
            body: body.into(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// HTTP status reported to the caller for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized { .. } => 401,
            Self::InvalidRequest { .. } => 422,
            Self::BackendStatus { status, .. } => {
                if (100..=999).contains(status) {
                    *status
                } else {
                    502
                }
            }
            _ => 500,
        }
    }

    /// Message safe to show the caller. Internal failures are reported
    /// generically; the full error only goes to the server-side logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthorized { message } | Self::InvalidRequest { message } => message.clone(),
            Self::BackendStatus { body, .. } => body.clone(),
            Self::MalformedResponse { .. } => "Bridge returned a malformed response".to_string(),
            _ => "Internal server error".to_string(),
        }
    }

    /// Machine-readable error kind for the public error body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "authentication_error",
            Self::InvalidRequest { .. } => "invalid_request_error",
            Self::BackendStatus { .. } => "upstream_error",
            _ => "server_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
