// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Codec for the flat JSON payloads exchanged over the bus.
//!
//! A payload is a single JSON object with a mandatory `name` tag plus the
//! fields of the named variant. Error events additionally carry a numeric
//! `error_code`, written here from the variant and ignored on decode.

use serde_json::Value;
use thiserror::Error;

use crate::action::Action;
use crate::event::Event;
use crate::registry::{self, TagRegistry};

/// Why a wire payload failed to decode.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload has no name field")]
    MissingName,
    #[error("unknown wire tag {tag:?}")]
    UnknownTag { tag: String },
    #[error("malformed {tag:?} payload: {reason}")]
    MalformedPayload { tag: String, reason: String },
}

/// Encode an action for the wire.
pub fn encode_action(action: &Action) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(action)
}

/// Encode an event for the wire, stamping `error_code` onto error
/// variants.
pub fn encode_event(event: &Event) -> serde_json::Result<Vec<u8>> {
    let mut value = serde_json::to_value(event)?;
    if let (Some(code), Value::Object(map)) = (event.error_code(), &mut value) {
        map.insert("error_code".to_string(), Value::from(code.code()));
    }
    serde_json::to_vec(&value)
}

/// Decode an action payload through the action registry.
pub fn decode_action(payload: &[u8]) -> Result<Action, DecodeError> {
    decode_with(registry::actions(), payload)
}

/// Decode an event payload through the event registry.
pub fn decode_event(payload: &[u8]) -> Result<Event, DecodeError> {
    decode_with(registry::events(), payload)
}

fn decode_with<T>(registry: &TagRegistry<T>, payload: &[u8]) -> Result<T, DecodeError> {
    let value: Value = serde_json::from_slice(payload)?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    let tag = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingName)?
        .to_string();
    registry.decode_value(&tag, value)
}
