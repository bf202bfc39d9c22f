use super::bridge_types::BridgeResponse;
use super::public_types::{
    generate_completion_id, ChatCompletionResponse, Choice, ResponseMessage, Usage,
    CHAT_COMPLETION_OBJECT,
};

/// Translate a complete bridge response into a public chat completion.
/// Pure function: `requested_model` is what the caller originally asked for.
///
/// `finish_reason` is always `"stop"` here, whatever the bridge reported.
/// The streaming path forwards the bridge's value instead.
pub fn bridge_to_public(resp: &BridgeResponse, requested_model: &str) -> ChatCompletionResponse {
    let content = resp
        .choices
        .as_deref()
        .and_then(|choices| choices.first())
        .and_then(|c| c.message.as_ref())
        .and_then(|m| m.content.clone())
        .unwrap_or_default();

    let usage = resp.usage.as_ref().map_or_else(Usage::default, |u| Usage {
        prompt_tokens: u.prompt_tokens.unwrap_or(0),
        completion_tokens: u.completion_tokens.unwrap_or(0),
        total_tokens: u.total_tokens.unwrap_or(0),
    });

    ChatCompletionResponse {
        id: resp.id.clone().unwrap_or_else(generate_completion_id),
        object: CHAT_COMPLETION_OBJECT.to_string(),
        created: resp
            .created
            .unwrap_or_else(|| chrono::Utc::now().timestamp()),
        model: requested_model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ResponseMessage {
                role: "assistant".to_string(),
                content,
            },
            finish_reason: "stop".to_string(),
        }],
        usage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> BridgeResponse {
        BridgeResponse::parse(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_simple_text_response() {
        let resp = parse(
            r#"{"choices":[{"message":{"content":"hello"}}],
                "usage":{"prompt_tokens":3,"completion_tokens":1,"total_tokens":4}}"#,
        );
        let result = bridge_to_public(&resp, "deepseek-v3");

        assert_eq!(result.object, "chat.completion");
        assert_eq!(result.model, "deepseek-v3");
        assert_eq!(result.choices.len(), 1);
        assert_eq!(result.choices[0].index, 0);
        assert_eq!(result.choices[0].message.role, "assistant");
        assert_eq!(result.choices[0].message.content, "hello");
        assert_eq!(result.choices[0].finish_reason, "stop");
        assert_eq!(
            result.usage,
            Usage {
                prompt_tokens: 3,
                completion_tokens: 1,
                total_tokens: 4
            }
        );
        assert!(result.id.starts_with("chatcmpl-"));
    }

    #[test]
    fn test_bridge_finish_reason_is_not_propagated() {
        let resp = parse(
            r#"{"id":"abc","created":42,"model":"org/backend",
                "choices":[{"message":{"content":"x"},"finish_reason":"length"}]}"#,
        );
        let result = bridge_to_public(&resp, "public");
        assert_eq!(result.choices[0].finish_reason, "stop");
        assert_eq!(result.id, "abc");
        assert_eq!(result.created, 42);
        assert_eq!(result.model, "public");
    }

    #[test]
    fn test_empty_body_gets_defaults() {
        let result = bridge_to_public(&parse("{}"), "public");
        assert_eq!(result.choices[0].message.content, "");
        assert_eq!(result.usage, Usage::default());
        assert!(result.created > 0);

        let result = bridge_to_public(&parse(r#"{"choices":[]}"#), "public");
        assert_eq!(result.choices[0].message.content, "");
    }

    #[test]
    fn test_null_content_becomes_empty() {
        let resp = parse(r#"{"choices":[{"message":{"content":null}}]}"#);
        let result = bridge_to_public(&resp, "public");
        assert_eq!(result.choices[0].message.content, "");
    }

    #[test]
    fn test_wrong_typed_fields_fall_back() {
        let resp = parse(
            r#"{"id":7,"created":1700000000.9,"choices":[{"message":{"content":"hello"}}],
                "usage":{"prompt_tokens":3,"completion_tokens":"one","total_tokens":4}}"#,
        );
        let result = bridge_to_public(&resp, "public");
        assert_eq!(result.id, "7");
        assert_eq!(result.created, 1_700_000_000);
        assert_eq!(result.choices[0].message.content, "hello");
        assert_eq!(result.usage.prompt_tokens, 3);
        assert_eq!(result.usage.completion_tokens, 0);
        assert_eq!(result.usage.total_tokens, 4);

        let result = bridge_to_public(&parse(r#"{"choices":"nope","usage":[]}"#), "public");
        assert_eq!(result.choices[0].message.content, "");
        assert_eq!(result.usage, Usage::default());
        assert!(result.id.starts_with("chatcmpl-"));
    }
}
