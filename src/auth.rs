//! Caller credential resolution.
//!
//! Callers may send their bridge key either directly in `X-API-Key` or as a
//! bearer token in `Authorization`. The key is forwarded unchanged to the
//! bridge; the gateway itself does not authenticate anyone.

use crate::error::{GatewayError, Result};

pub const API_KEY_HEADER: &str = "x-api-key";

const BEARER_PREFIX: &str = "Bearer ";
const MISSING_KEY_MESSAGE: &str =
    "API key is required (Authorization: Bearer <key> or X-API-Key)";

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    ApiKeyHeader,
    Bearer,
    Default,
}

impl CredentialSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApiKeyHeader => "x-api-key",
            Self::Bearer => "bearer",
            Self::Default => "default",
        }
    }
}

/// A credential ready to be forwarded to the bridge.
///
/// `Debug` is implemented by hand so the key never ends up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    key: String,
    source: CredentialSource,
}

impl Credential {
    pub fn expose(&self) -> &str {
        &self.key
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("key", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Resolve the credential for one exchange.
///
/// Precedence: non-empty `X-API-Key`, then a non-empty `Bearer` token, then
/// the configured default.
pub fn resolve_credential(
    authorization: Option<&str>,
    api_key: Option<&str>,
    default_key: Option<&str>,
) -> Result<Credential> {
    if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(Credential {
            key: key.to_string(),
            source: CredentialSource::ApiKeyHeader,
        });
    }

    if let Some(key) = authorization
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|k| !k.is_empty())
    {
        return Ok(Credential {
            key: key.to_string(),
            source: CredentialSource::Bearer,
        });
    }

    if let Some(key) = default_key.filter(|k| !k.is_empty()) {
        return Ok(Credential {
            key: key.to_string(),
            source: CredentialSource::Default,
        });
    }

    Err(GatewayError::unauthorized(MISSING_KEY_MESSAGE))
}

/// Resolve the credential from inbound request headers.
pub fn credential_from_headers(
    headers: &axum::http::HeaderMap,
    default_key: Option<&str>,
) -> Result<Credential> {
    let authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let api_key = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());

    resolve_credential(authorization, api_key, default_key)
}
