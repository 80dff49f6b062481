//! Host-side decoding of client value messages
//!
//! A value message may carry a coercion tag (the `name:type_hint` wire key).
//! Tagged payloads decode through the named codec registered here; untagged
//! payloads fall back to default type inference over the JSON shape. Decode
//! failures surface as typed [`BridgeError::CoercionFailure`] values instead
//! of crashing the bridge.

use std::collections::HashMap;

use serde_json::Value;

use crate::bus::ValueMessage;
use crate::error::{BridgeError, Result};

/// A decoded host-side value.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    /// Structured payload left as JSON by default inference
    Json(Value),
    /// Payload interpreted by a named codec
    Custom { codec: String, value: Value },
}

/// Decoder for one coercion tag.
pub type Codec = Box<dyn Fn(&Value) -> Result<DecodedValue>>;

/// Named codecs keyed by coercion tag.
#[derive(Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Codec>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the decoder for `tag`. Re-registration replaces the
    /// previous decoder with a warning.
    pub fn register(&mut self, tag: impl Into<String>, codec: Codec) {
        let tag = tag.into();
        if self.codecs.insert(tag.clone(), codec).is_some() {
            tracing::warn!(tag = %tag, "replacing existing codec");
        }
    }

    /// Decode one value message. Untagged messages go through default
    /// inference; tagged messages require a registered codec.
    pub fn decode(&self, message: &ValueMessage) -> Result<DecodedValue> {
        match &message.type_hint {
            None => Ok(default_inference(&message.value)),
            Some(tag) => {
                let codec = self.codecs.get(tag).ok_or_else(|| BridgeError::CoercionFailure {
                    codec: tag.clone(),
                    message: "no codec registered for tag".to_string(),
                })?;
                codec(&message.value).map_err(|e| match e {
                    failure @ BridgeError::CoercionFailure { .. } => failure,
                    other => BridgeError::CoercionFailure {
                        codec: tag.clone(),
                        message: other.to_string(),
                    },
                })
            }
        }
    }
}

/// Default inference: mirror the JSON shape without interpretation.
pub fn default_inference(value: &Value) -> DecodedValue {
    match value {
        Value::Null => DecodedValue::Null,
        Value::Bool(b) => DecodedValue::Bool(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) => DecodedValue::Number(f),
            None => DecodedValue::Json(value.clone()),
        },
        Value::String(s) => DecodedValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => DecodedValue::Json(value.clone()),
    }
}

/// Split a wire key into (channel name, coercion tag). The tag is
/// everything after the first colon; absence means default inference.
pub fn parse_wire_key(key: &str) -> (&str, Option<&str>) {
    match key.split_once(':') {
        Some((name, hint)) if !hint.is_empty() => (name, Some(hint)),
        _ => (key, None),
    }
}
