use crate::auth::credential_from_headers;
use crate::client::BridgeClient;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::logging::{ExchangeLog, SharedLogger};
use crate::proxy;
use crate::translate::public_types::{ChatCompletionRequest, ErrorResponse, ModelList};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::stream::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const SERVICE_NAME: &str = "bridge-openai-gateway";

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub client: BridgeClient,
    pub logger: SharedLogger,
}

impl AppState {
    pub fn new(config: GatewayConfig, logger: SharedLogger) -> crate::Result<Self> {
        let client = BridgeClient::new(&config)?;
        Ok(Self {
            config,
            client,
            logger,
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/v1/models", get(handle_models))
        .route("/health", get(handle_health))
        .route("/", get(handle_root))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

async fn handle_chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let log = state.logger.exchange();

    match chat_completions(&state, &headers, &body, &log).await {
        Ok(resp) => resp,
        Err(e) => {
            if e.status_code() >= 500 {
                tracing::error!(exchange = log.id(), error = %e, "Chat completion failed");
                log.error("server", format!("Chat completion failed: {e}"));
            }
            e.into_response()
        }
    }
}

async fn chat_completions(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
    log: &ExchangeLog,
) -> crate::Result<Response> {
    let credential = match credential_from_headers(headers, state.config.default_api_key()) {
        Ok(c) => c,
        Err(e) => {
            log.warn("server", "Rejected request without API key");
            return Err(e);
        }
    };

    let req: ChatCompletionRequest = serde_json::from_slice(body)
        .map_err(|e| GatewayError::invalid_request(format!("Invalid request body: {e}")))?;
    req.validate()?;

    log.info(
        "server",
        format!(
            "Request: model={} streaming={} messages={}",
            req.requested_model(&state.config.model_name),
            req.stream,
            req.messages.len()
        ),
    );

    if req.stream {
        let events =
            proxy::proxy_streaming(&req, &credential, &state.config, &state.client, log).await?;
        let sse = events.map(|event| Ok::<_, Infallible>(Event::default().data(event.data())));
        Ok(Sse::new(sse).into_response())
    } else {
        let resp =
            proxy::proxy_non_streaming(&req, &credential, &state.config, &state.client, log)
                .await?;
        Ok(Json(resp).into_response())
    }
}

async fn handle_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    Json(ModelList::single(&state.config.model_name))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": SERVICE_NAME,
        "openai_compatible": "v1",
        "health": "/health",
        "models": "/v1/models",
    }))
}
