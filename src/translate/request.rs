//! Translate public chat completion requests into bridge payloads.

use super::bridge_types::{BridgeMessage, BridgePayload};
use super::public_types::ChatCompletionRequest;

/// Translate a public request into the bridge payload.
/// Pure function: `backend_model` replaces whatever model the caller asked
/// for, and `forward` names the optional sampling parameters to copy through
/// besides `temperature` and `max_tokens`.
pub fn public_to_bridge(
    req: &ChatCompletionRequest,
    backend_model: &str,
    forward: &[String],
) -> BridgePayload {
    let messages = req
        .messages
        .iter()
        .map(|m| BridgeMessage {
            role: m.role.clone(),
            content: m.content.clone(),
        })
        .collect();

    let forwards = |name: &str| forward.iter().any(|f| f == name);

    BridgePayload {
        messages,
        model: backend_model.to_string(),
        stream: req.stream,
        temperature: req.temperature,
        max_tokens: req.max_tokens,
        top_p: req.top_p.filter(|_| forwards("top_p")),
        n: req.n.filter(|_| forwards("n")),
        stop: req
            .stop
            .clone()
            .filter(|_| forwards("stop"))
            .map(|s| s.into_vec()),
        presence_penalty: req.presence_penalty.filter(|_| forwards("presence_penalty")),
        frequency_penalty: req
            .frequency_penalty
            .filter(|_| forwards("frequency_penalty")),
        user: req.user.clone().filter(|_| forwards("user")),
    }
}
