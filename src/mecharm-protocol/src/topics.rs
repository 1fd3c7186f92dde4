// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Deterministic topic layout binding one device to the bus.
//!
//! Down-topics carry actions toward the device, up-topics carry events
//! away from it. The per-session pair exists from SessionCreated to
//! SessionDestroyed.

/// Topic names for one device id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRouter {
    device_id: String,
}

impl TopicRouter {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Actions from any controller to the device.
    pub fn device_down(&self) -> String {
        format!("device/{}/down", self.device_id)
    }

    /// Broadcast events from the device.
    pub fn device_up(&self) -> String {
        format!("device/{}/up", self.device_id)
    }

    /// Actions scoped to one session.
    pub fn session_down(&self, session_id: u64) -> String {
        format!("device/{}/session/{}/down", self.device_id, session_id)
    }

    /// Events scoped to one session.
    pub fn session_up(&self, session_id: u64) -> String {
        format!("device/{}/session/{}/up", self.device_id, session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_layout() {
        let topics = TopicRouter::new("arm0");
        assert_eq!(topics.device_down(), "device/arm0/down");
        assert_eq!(topics.device_up(), "device/arm0/up");
        assert_eq!(topics.session_down(1), "device/arm0/session/1/down");
        assert_eq!(topics.session_up(12), "device/arm0/session/12/up");
    }

    #[test]
    fn test_distinct_devices_never_share_topics() {
        let a = TopicRouter::new("arm0");
        let b = TopicRouter::new("arm1");
        assert_ne!(a.device_down(), b.device_down());
        assert_ne!(a.session_up(1), b.session_up(1));
    }
}
