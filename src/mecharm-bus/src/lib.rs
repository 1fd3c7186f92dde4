// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Transport channel abstraction between the engine and the outside
//! world.
//!
//! The engine never talks to a broker directly; it publishes and
//! subscribes through [`Bus`]. `LocalBus` is the in-memory implementation
//! used by tests and single-process setups. An external broker client
//! implements the same trait and is wired in at the edge.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::broadcast;

/// One message seen on a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Bytes,
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus channel closed")]
    Closed,
    #[error("bus transport error: {0}")]
    Transport(String),
}

pub type BusResult<T> = Result<T, BusError>;

/// Publish/subscribe channel surface consumed by the engine and the
/// controllers. Subscriptions are broadcast receivers: every subscriber
/// of a topic sees every message published after it subscribed.
pub trait Bus: Send + Sync {
    fn subscribe(&self, topic: &str) -> broadcast::Receiver<BusMessage>;
    fn publish(&self, topic: &str, payload: Bytes) -> BusResult<()>;
}

/// In-memory bus. Publishing to a topic nobody subscribed to succeeds
/// and drops the payload, which is what a broker does.
#[derive(Debug, Default)]
pub struct LocalBus {
    topics: RwLock<HashMap<String, broadcast::Sender<BusMessage>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<BusMessage> {
        let mut topics = self.topics.write().expect("bus topic map poisoned");
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }
}

impl Bus for LocalBus {
    fn subscribe(&self, topic: &str) -> broadcast::Receiver<BusMessage> {
        self.sender_for(topic).subscribe()
    }

    fn publish(&self, topic: &str, payload: Bytes) -> BusResult<()> {
        let sender = self.sender_for(topic);
        // send only fails when there is no receiver; a broker accepts
        // publishes to unsubscribed topics, so mirror that here.
        let _ = sender.send(BusMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }
}
