use crate::auth::Credential;
use crate::client::BridgeClient;
use crate::config::GatewayConfig;
use crate::error::Result;
use crate::logging::{ExchangeLog, LogLevel};
use crate::translate::public_types::{ChatCompletionRequest, ChatCompletionResponse};
use crate::translate::request::public_to_bridge;
use crate::translate::response::bridge_to_public;
use crate::translate::streaming::{PublicEvent, StreamReframer};

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;

/// Outcome of proxying a streaming request: public events ending in `Done`.
pub type PublicEventStream = Pin<Box<dyn Stream<Item = PublicEvent> + Send>>;

/// Forward a non-streaming chat request to the bridge.
pub async fn proxy_non_streaming(
    req: &ChatCompletionRequest,
    credential: &Credential,
    config: &GatewayConfig,
    client: &BridgeClient,
    log: &ExchangeLog,
) -> Result<ChatCompletionResponse> {
    let requested_model = req.requested_model(&config.model_name);
    let mut payload = public_to_bridge(req, &config.bridge.model, &config.params.forward);
    payload.stream = false;

    log.info(
        "proxy",
        format!(
            "POST {} model={} key_source={}",
            client.completions_url(),
            payload.model,
            credential.source().as_str()
        ),
    );

    let bridge_resp = match client.complete(&payload, credential).await {
        Ok(r) => r,
        Err(e) => {
            log.warn("proxy", format!("Bridge call failed: {e}"));
            return Err(e);
        }
    };

    let resp = bridge_to_public(&bridge_resp, requested_model);

    log.with_context(
        LogLevel::Info,
        "proxy",
        "Completed",
        serde_json::json!({
            "prompt_tokens": resp.usage.prompt_tokens,
            "completion_tokens": resp.usage.completion_tokens,
            "total_tokens": resp.usage.total_tokens,
        }),
    );

    Ok(resp)
}

/// Forward a streaming chat request, returning the public event stream.
pub async fn proxy_streaming(
    req: &ChatCompletionRequest,
    credential: &Credential,
    config: &GatewayConfig,
    client: &BridgeClient,
    log: &ExchangeLog,
) -> Result<PublicEventStream> {
    let requested_model = req.requested_model(&config.model_name).to_string();
    let payload = public_to_bridge(req, &config.bridge.model, &config.params.forward);

    log.info(
        "proxy",
        format!(
            "POST {} model={} key_source={} (streaming)",
            client.completions_url(),
            payload.model,
            credential.source().as_str()
        ),
    );

    let byte_stream = match client.complete_stream(payload, credential).await {
        Ok(s) => s,
        Err(e) => {
            log.warn("proxy", format!("Bridge stream call failed: {e}"));
            return Err(e);
        }
    };

    Ok(Box::pin(reframe_stream(
        byte_stream,
        requested_model,
        log.clone(),
    )))
}

/// Drive a [`StreamReframer`] over a bridge byte stream.
///
/// The upstream stream is dropped as soon as the terminator is seen or the
/// returned stream is dropped, which closes the bridge connection.
pub fn reframe_stream<S, E>(
    byte_stream: S,
    model: String,
    log: ExchangeLog,
) -> impl Stream<Item = PublicEvent> + Send + 'static
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        let mut reframer = StreamReframer::new(&model);

        tokio::pin!(byte_stream);

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    log.error("stream", format!("Bridge stream error: {e}"));
                    break;
                }
            };

            for event in reframer.push(&chunk) {
                yield event;
            }

            if reframer.is_finished() {
                break;
            }
        }

        for event in reframer.finish() {
            yield event;
        }

        log.info(
            "stream",
            format!(
                "Stream completed: chunks={} skipped={}",
                reframer.emitted(),
                reframer.skipped()
            ),
        );
    }
}
