// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Events published by the device (JSON, `name`-tagged).
//!
//! Events are immutable records. An event that answers an action carries
//! the action's id, never a copy of the action itself; error events carry
//! a stable numeric `error_code` on the wire, derived from the variant.

use serde::{Deserialize, Serialize};

use mecharm_core::error::ErrorCode;
use mecharm_core::motion::{MoveTarget, Position};
use mecharm_core::session::{ActionId, SessionInfo};

/// Wire tags for the event family.
pub mod tags {
    pub const SESSION_CREATED: &str = "session_created";
    pub const SESSION_BUSY: &str = "session_busy";
    pub const BAD_ACTION: &str = "bad_action";
    pub const NO_CURRENT_SESSION: &str = "no_current_session";
    pub const SESSION_TIMEOUT: &str = "session_timeout";
    pub const SESSION_READY: &str = "session_ready";
    pub const SESSION_DESTROYED: &str = "session_destroyed";
    pub const MOVE_PROGRESS: &str = "move_progress";
    pub const MOVE_COMPLETE: &str = "move_complete";
    pub const MOVE_ERROR: &str = "move_error";
    pub const DEVICE_STATUS: &str = "device_status";
}

/// Event published by the device in response to actions, worker progress
/// or supervisor decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Event {
    /// A lease was issued to the requesting controller.
    SessionCreated {
        action_id: ActionId,
        session: SessionInfo,
    },
    /// A lease request was refused; `holder` is the current owner.
    SessionBusy { action_id: ActionId, holder: String },
    /// The action could not be decoded or failed validation. The id is
    /// absent when the payload was too broken to extract one.
    BadAction {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action_id: Option<ActionId>,
        reason: String,
    },
    /// A session-scoped action named no live session.
    NoCurrentSession { action_id: ActionId },
    /// The active session was revoked after inactivity.
    SessionTimeout { session: SessionInfo, idle_ms: u64 },
    /// The pipeline is drained; the session accepts the next action.
    SessionReady { session: SessionInfo },
    /// The session ended. exit_code 0 is a clean controller-requested
    /// exit; a timeout teardown carries the timeout error code.
    SessionDestroyed { session: SessionInfo, exit_code: i32 },
    /// Periodic snapshot of an executing move.
    MoveProgress {
        action_id: ActionId,
        session: SessionInfo,
        progress_seq: u32,
        current_position: Position,
        target_position: MoveTarget,
    },
    /// The move reached its target.
    MoveComplete {
        action_id: ActionId,
        session: SessionInfo,
        final_position: Position,
    },
    /// The move failed; the session itself stays alive.
    MoveError {
        action_id: ActionId,
        session: SessionInfo,
        reason: String,
    },
    /// Broadcast availability snapshot on the device channel.
    DeviceStatus {
        idle: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        controller: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Position>,
    },
}

impl Event {
    /// The stable wire code for error events; None otherwise. The codec
    /// writes it onto the payload, so the field is present on the wire
    /// exactly for error events.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::BadAction { .. } => Some(ErrorCode::BadAction),
            Self::SessionBusy { .. } => Some(ErrorCode::SessionBusy),
            Self::NoCurrentSession { .. } => Some(ErrorCode::NoCurrentSession),
            Self::SessionTimeout { .. } => Some(ErrorCode::SessionTimeout),
            Self::MoveError { .. } => Some(ErrorCode::MoveError),
            _ => None,
        }
    }

    /// The wire tag, for logs and registry checks.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => tags::SESSION_CREATED,
            Self::SessionBusy { .. } => tags::SESSION_BUSY,
            Self::BadAction { .. } => tags::BAD_ACTION,
            Self::NoCurrentSession { .. } => tags::NO_CURRENT_SESSION,
            Self::SessionTimeout { .. } => tags::SESSION_TIMEOUT,
            Self::SessionReady { .. } => tags::SESSION_READY,
            Self::SessionDestroyed { .. } => tags::SESSION_DESTROYED,
            Self::MoveProgress { .. } => tags::MOVE_PROGRESS,
            Self::MoveComplete { .. } => tags::MOVE_COMPLETE,
            Self::MoveError { .. } => tags::MOVE_ERROR,
            Self::DeviceStatus { .. } => tags::DEVICE_STATUS,
        }
    }

    /// The id of the action this event answers, if any.
    pub fn action_id(&self) -> Option<ActionId> {
        match self {
            Self::SessionCreated { action_id, .. }
            | Self::SessionBusy { action_id, .. }
            | Self::NoCurrentSession { action_id }
            | Self::MoveProgress { action_id, .. }
            | Self::MoveComplete { action_id, .. }
            | Self::MoveError { action_id, .. } => Some(*action_id),
            Self::BadAction { action_id, .. } => *action_id,
            Self::SessionTimeout { .. }
            | Self::SessionReady { .. }
            | Self::SessionDestroyed { .. }
            | Self::DeviceStatus { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionInfo {
        SessionInfo {
            session_id: 1,
            device_client_id: "arm0".to_string(),
            remote_client_id: "ctrl-1".to_string(),
        }
    }

    #[test]
    fn test_error_code_only_on_error_variants() {
        let cases: Vec<(Event, Option<u16>)> = vec![
            (
                Event::SessionCreated {
                    action_id: ActionId(1),
                    session: session(),
                },
                None,
            ),
            (
                Event::SessionBusy {
                    action_id: ActionId(1),
                    holder: "ctrl-1".to_string(),
                },
                Some(400),
            ),
            (
                Event::BadAction {
                    action_id: None,
                    reason: "not json".to_string(),
                },
                Some(300),
            ),
            (
                Event::NoCurrentSession {
                    action_id: ActionId(2),
                },
                Some(401),
            ),
            (
                Event::SessionTimeout {
                    session: session(),
                    idle_ms: 30_000,
                },
                Some(402),
            ),
            (Event::SessionReady { session: session() }, None),
            (
                Event::SessionDestroyed {
                    session: session(),
                    exit_code: 0,
                },
                None,
            ),
            (
                Event::MoveError {
                    action_id: ActionId(3),
                    session: session(),
                    reason: "stalled".to_string(),
                },
                Some(500),
            ),
            (
                Event::DeviceStatus {
                    idle: true,
                    controller: None,
                    position: None,
                },
                None,
            ),
        ];
        for (event, code) in cases {
            assert_eq!(
                event.error_code().map(|c| c.code()),
                code,
                "wrong error code for {}",
                event.name()
            );
        }
    }

    #[test]
    fn test_event_names_match_wire_tags() {
        let event = Event::MoveComplete {
            action_id: ActionId(9),
            session: session(),
            final_position: Position::origin(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""name":"move_complete""#));
    }

    #[test]
    fn test_device_status_omits_empty_fields() {
        let event = Event::DeviceStatus {
            idle: true,
            controller: None,
            position: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("controller"));
        assert!(!json.contains("position"));
    }

    #[test]
    fn test_action_id_reference() {
        let event = Event::MoveProgress {
            action_id: ActionId(4),
            session: session(),
            progress_seq: 2,
            current_position: Position::origin(),
            target_position: MoveTarget::Angles { degrees: [0.0; 6] },
        };
        assert_eq!(event.action_id(), Some(ActionId(4)));
        assert_eq!(
            Event::SessionReady { session: session() }.action_id(),
            None
        );
    }
}
