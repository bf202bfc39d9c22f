//! Wire types for the bridge completions backend.
//!
//! The request side is what we POST. The response side is lenient: every
//! field is optional, a wrong-typed field reads as absent, and the
//! translators fill in defaults.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Request types (what we send TO the bridge)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgePayload {
    pub messages: Vec<BridgeMessage>,
    pub model: String,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub role: String,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Response types (what we receive FROM the bridge)
// ---------------------------------------------------------------------------

/// Complete body of a non-streaming bridge response.
///
/// Decoding never fails on shape: a field of the wrong type reads as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeResponse {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub created: Option<i64>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub choices: Option<Vec<BridgeChoice>>,
    #[serde(default, deserialize_with = "lenient::value")]
    pub usage: Option<BridgeUsage>,
}

impl BridgeResponse {
    /// Decode a response body. Errors only when the body is not JSON.
    pub fn parse(body: &[u8]) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_slice(body)?;
        Ok(from_object(value))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeChoice {
    #[serde(default, deserialize_with = "lenient::value")]
    pub message: Option<BridgeChoiceMessage>,
    #[serde(default, deserialize_with = "lenient::value")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeChoiceMessage {
    #[serde(default, deserialize_with = "lenient::value")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient::value")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeUsage {
    #[serde(default, deserialize_with = "lenient::count")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub completion_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub total_tokens: Option<u64>,
}

// ---------------------------------------------------------------------------
// Streaming chunk types
// ---------------------------------------------------------------------------

/// One decoded `data:` line of the bridge event stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeChunk {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub created: Option<i64>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub choices: Option<Vec<BridgeChunkChoice>>,
}

impl BridgeChunk {
    /// Decode one event payload. Errors only when the payload is not JSON.
    pub fn parse(payload: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(payload)?;
        Ok(from_object(value))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeChunkChoice {
    #[serde(default)]
    pub delta: Option<Value>,
    #[serde(default, deserialize_with = "lenient::value")]
    pub finish_reason: Option<String>,
}

/// Anything other than a JSON object decodes to the all-absent default.
fn from_object<T: DeserializeOwned + Default>(value: Value) -> T {
    if value.is_object() {
        serde_json::from_value(value).unwrap_or_default()
    } else {
        T::default()
    }
}

/// Field deserializers that read a wrong-typed value as `None`.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn value<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let v = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(v).ok())
    }

    /// Ids are kept as text; numeric ids are stringified.
    pub fn id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    /// Unix seconds; fractional values are truncated.
    pub fn timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        })
    }

    pub fn count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            _ => None,
        })
    }

    /// A non-array reads as `None`; an element of the wrong shape keeps its
    /// position as the all-absent default.
    pub fn list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => Some(items.into_iter().map(super::from_object).collect()),
            _ => None,
        })
    }
}
