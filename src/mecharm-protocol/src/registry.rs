// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Wire type registries: the closed mapping from payload tags to message
//! decoders.
//!
//! Both sides of the protocol consult the same registries, so an action
//! encodes on the controller exactly as the device expects to decode it.
//! The registries are built once per process; registering the same tag
//! twice is a startup defect and panics immediately rather than silently
//! overriding an existing decoder.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde_json::Value;

use crate::action::{self, Action};
use crate::codec::DecodeError;
use crate::event::{self, Event};

/// Decoder for one registered tag. The value still carries its `name`
/// field when the decoder runs.
pub type DecodeFn<T> = fn(Value) -> serde_json::Result<T>;

/// Immutable tag-to-decoder table for one message family.
pub struct TagRegistry<T> {
    family: &'static str,
    decoders: BTreeMap<&'static str, DecodeFn<T>>,
}

impl<T> TagRegistry<T> {
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            decoders: BTreeMap::new(),
        }
    }

    /// Register a decoder under a wire tag. Panics if the tag is already
    /// taken: two message types must never share a name.
    pub fn register(&mut self, tag: &'static str, decode: DecodeFn<T>) {
        if self.decoders.insert(tag, decode).is_some() {
            panic!("duplicate {} tag registered: {:?}", self.family, tag);
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    /// Registered tags in sorted order.
    pub fn tags(&self) -> Vec<&'static str> {
        self.decoders.keys().copied().collect()
    }

    /// Decode a parsed payload whose tag was already extracted. An
    /// unregistered tag is a decode error, never a panic.
    pub fn decode_value(&self, tag: &str, value: Value) -> Result<T, DecodeError> {
        let decode = self
            .decoders
            .get(tag)
            .ok_or_else(|| DecodeError::UnknownTag {
                tag: tag.to_string(),
            })?;
        decode(value).map_err(|err| DecodeError::MalformedPayload {
            tag: tag.to_string(),
            reason: err.to_string(),
        })
    }
}

fn decode_action_value(value: Value) -> serde_json::Result<Action> {
    serde_json::from_value(value)
}

fn decode_event_value(value: Value) -> serde_json::Result<Event> {
    serde_json::from_value(value)
}

fn build_action_registry() -> TagRegistry<Action> {
    let mut registry = TagRegistry::new("action");
    registry.register(action::tags::BEGIN_SESSION, decode_action_value);
    registry.register(action::tags::EXIT_SESSION, decode_action_value);
    registry.register(action::tags::MOVE, decode_action_value);
    registry.register(action::tags::MOVE_JOINT, decode_action_value);
    registry
}

fn build_event_registry() -> TagRegistry<Event> {
    let mut registry = TagRegistry::new("event");
    registry.register(event::tags::SESSION_CREATED, decode_event_value);
    registry.register(event::tags::SESSION_BUSY, decode_event_value);
    registry.register(event::tags::BAD_ACTION, decode_event_value);
    registry.register(event::tags::NO_CURRENT_SESSION, decode_event_value);
    registry.register(event::tags::SESSION_TIMEOUT, decode_event_value);
    registry.register(event::tags::SESSION_READY, decode_event_value);
    registry.register(event::tags::SESSION_DESTROYED, decode_event_value);
    registry.register(event::tags::MOVE_PROGRESS, decode_event_value);
    registry.register(event::tags::MOVE_COMPLETE, decode_event_value);
    registry.register(event::tags::MOVE_ERROR, decode_event_value);
    registry.register(event::tags::DEVICE_STATUS, decode_event_value);
    registry
}

/// The process-wide action registry.
pub fn actions() -> &'static TagRegistry<Action> {
    static REGISTRY: OnceLock<TagRegistry<Action>> = OnceLock::new();
    REGISTRY.get_or_init(build_action_registry)
}

/// The process-wide event registry.
pub fn events() -> &'static TagRegistry<Event> {
    static REGISTRY: OnceLock<TagRegistry<Event>> = OnceLock::new();
    REGISTRY.get_or_init(build_event_registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registries_cover_every_tag() {
        let actions = actions();
        for tag in [
            action::tags::BEGIN_SESSION,
            action::tags::EXIT_SESSION,
            action::tags::MOVE,
            action::tags::MOVE_JOINT,
        ] {
            assert!(actions.contains(tag), "action registry missing {}", tag);
        }

        let events = events();
        for tag in [
            event::tags::SESSION_CREATED,
            event::tags::SESSION_BUSY,
            event::tags::BAD_ACTION,
            event::tags::NO_CURRENT_SESSION,
            event::tags::SESSION_TIMEOUT,
            event::tags::SESSION_READY,
            event::tags::SESSION_DESTROYED,
            event::tags::MOVE_PROGRESS,
            event::tags::MOVE_COMPLETE,
            event::tags::MOVE_ERROR,
            event::tags::DEVICE_STATUS,
        ] {
            assert!(events.contains(tag), "event registry missing {}", tag);
        }
        assert_eq!(actions.tags().len(), 4);
        assert_eq!(events.tags().len(), 11);
    }

    #[test]
    fn test_unknown_tag_is_an_error_not_a_panic() {
        let value: Value = serde_json::json!({ "name": "self_destruct" });
        let err = actions().decode_value("self_destruct", value).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownTag { tag } if tag == "self_destruct"));
    }

    #[test]
    #[should_panic(expected = "duplicate action tag")]
    fn test_duplicate_registration_panics() {
        let mut registry = TagRegistry::new("action");
        registry.register(action::tags::MOVE, decode_action_value);
        registry.register(action::tags::MOVE, decode_action_value);
    }

    #[test]
    fn test_tags_are_sorted_and_stable() {
        let tags = actions().tags();
        let mut sorted = tags.clone();
        sorted.sort();
        assert_eq!(tags, sorted);
    }
}
