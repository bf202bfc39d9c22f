//! HTTP client for the bridge completions endpoint.

use crate::auth::Credential;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::translate::bridge_types::{BridgePayload, BridgeResponse};

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use reqwest::StatusCode;
use std::pin::Pin;
use std::time::Duration;

/// Header carrying the caller's key on the bridge leg.
pub const BRIDGE_KEY_HEADER: &str = "X-API-Key";

/// Upper bound on how much of an error body is read from the bridge.
const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;
/// Length of the error excerpt surfaced to callers and logs.
const ERROR_EXCERPT_CHARS: usize = 500;

/// Raw body of a streaming bridge response.
pub type BridgeByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

#[derive(Debug, Clone)]
pub struct BridgeClient {
    http: reqwest::Client,
    completions_url: String,
    user_agent: String,
}

impl BridgeClient {
    /// Build a client for the configured bridge. Idle connections are not
    /// pooled, so each exchange gets its own connection.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.bridge.request_timeout_secs))
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self::with_http_client(http, config))
    }

    pub fn with_http_client(http: reqwest::Client, config: &GatewayConfig) -> Self {
        Self {
            http,
            completions_url: config.completions_url(),
            user_agent: config.bridge.user_agent.clone(),
        }
    }

    pub fn completions_url(&self) -> &str {
        &self.completions_url
    }

    /// One non-streaming call; returns the decoded bridge body.
    pub async fn complete(
        &self,
        payload: &BridgePayload,
        credential: &Credential,
    ) -> Result<BridgeResponse> {
        let response = self.send(payload, credential).await?;

        let body = response.bytes().await?;
        BridgeResponse::parse(&body).map_err(|e| {
            tracing::error!(error = %e, body_len = body.len(), "Bridge returned invalid JSON");
            GatewayError::malformed(e.to_string())
        })
    }

    /// One streaming call. Fails before any byte is handed out if the bridge
    /// rejects the request.
    pub async fn complete_stream(
        &self,
        mut payload: BridgePayload,
        credential: &Credential,
    ) -> Result<BridgeByteStream> {
        payload.stream = true;
        let response = self.send(&payload, credential).await?;
        Ok(Box::pin(response.bytes_stream()))
    }

    async fn send(
        &self,
        payload: &BridgePayload,
        credential: &Credential,
    ) -> Result<reqwest::Response> {
        tracing::debug!(
            url = %self.completions_url,
            model = %payload.model,
            stream = payload.stream,
            messages = payload.messages.len(),
            "POST bridge completions"
        );

        let response = self
            .http
            .post(&self.completions_url)
            .header(BRIDGE_KEY_HEADER, credential.expose())
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            return Ok(response);
        }

        let excerpt = read_error_excerpt(response).await;
        tracing::error!(status = status.as_u16(), body = %excerpt, "Bridge error");
        Err(GatewayError::backend_status(status.as_u16(), excerpt))
    }
}

async fn read_error_excerpt(response: reqwest::Response) -> String {
    let mut body: Vec<u8> = Vec::new();
    let mut stream = Box::pin(response.bytes_stream());

    while let Some(Ok(chunk)) = stream.next().await {
        let room = MAX_ERROR_BODY_BYTES - body.len();
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if body.len() >= MAX_ERROR_BODY_BYTES {
            break;
        }
    }

    let text = String::from_utf8_lossy(&body);
    if text.trim().is_empty() {
        return "Bridge error".to_string();
    }
    truncate_chars(&text, ERROR_EXCERPT_CHARS).to_string()
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
