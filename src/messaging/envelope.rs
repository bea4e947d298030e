//! # Bus Envelope
//!
//! Payloads travel as JSON, base64-encoded into the `data` field of a
//! [`PubsubMessage`]. Decoding reverses both steps before the consuming stage
//! validates the payload.

use crate::messaging::errors::{MessagingError, MessagingResult};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Attribute naming the source filename a message belongs to
pub const ATTR_ORIGIN: &str = "origin";
/// Attribute naming the target language of a message
pub const ATTR_LANG: &str = "lang";
/// Attribute carrying a deterministic key for duplicate detection
pub const ATTR_IDEMPOTENCY_KEY: &str = "idempotency_key";

/// A message as carried by the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubsubMessage {
    /// Assigned by the bus on publish; empty until then
    #[serde(default)]
    pub message_id: String,
    /// Base64-encoded JSON payload
    pub data: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<DateTime<Utc>>,
}

impl PubsubMessage {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Size of the decoded payload in bytes
    pub fn payload_len(&self) -> usize {
        // base64 expands 3 bytes into 4 characters
        let padding = self.data.chars().rev().take_while(|c| *c == '=').count();
        (self.data.len() / 4 * 3).saturating_sub(padding)
    }
}

/// JSON-encode then base64-encode a payload
pub fn encode_payload<T: Serialize>(payload: &T) -> MessagingResult<PubsubMessage> {
    let json = serde_json::to_vec(payload)
        .map_err(|e| MessagingError::message_serialization(e.to_string()))?;
    Ok(PubsubMessage {
        message_id: String::new(),
        data: general_purpose::STANDARD.encode(json),
        attributes: HashMap::new(),
        publish_time: None,
    })
}

/// Base64-decode then JSON-parse a payload
pub fn decode_payload<T: DeserializeOwned>(message: &PubsubMessage) -> MessagingResult<T> {
    let bytes = general_purpose::STANDARD.decode(message.data.as_bytes())?;
    let payload = serde_json::from_slice(&bytes)?;
    Ok(payload)
}

/// Attributes identifying one logical per-language message.
///
/// The key depends only on the stage, filename and language, so a rerun of
/// the same upload republishes messages with identical keys.
pub fn routing_attributes(stage: &str, filename: &str, lang: &str) -> HashMap<String, String> {
    let mut hasher = Sha256::new();
    hasher.update(stage.as_bytes());
    hasher.update([0u8]);
    hasher.update(filename.as_bytes());
    hasher.update([0u8]);
    hasher.update(lang.as_bytes());
    let key = format!("{:x}", hasher.finalize());

    HashMap::from([
        (ATTR_ORIGIN.to_string(), filename.to_string()),
        (ATTR_LANG.to_string(), lang.to_string()),
        (ATTR_IDEMPOTENCY_KEY.to_string(), key),
    ])
}
