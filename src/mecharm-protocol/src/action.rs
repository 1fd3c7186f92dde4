// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Actions sent by remote controllers (JSON, `name`-tagged).

use serde::{Deserialize, Serialize};

use mecharm_core::motion::MoveTarget;
use mecharm_core::session::ActionId;

/// Wire tags for the action family. Registered in the action registry and
/// used verbatim on the wire.
pub mod tags {
    pub const BEGIN_SESSION: &str = "begin_session";
    pub const EXIT_SESSION: &str = "exit_session";
    pub const MOVE: &str = "move";
    pub const MOVE_JOINT: &str = "move_joint";
}

/// Action sent by a remote controller. Session-scoped actions carry the
/// id of the lease they run under; the engine matches it against the
/// active session before anything reaches the arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Action {
    /// Ask for an exclusive session on the device channel.
    BeginSession { id: ActionId, requested_by: String },
    /// Close the named session. exit_code 0 is a clean shutdown.
    ExitSession {
        id: ActionId,
        session_id: u64,
        exit_code: i32,
    },
    /// Move the whole arm to a target posture. A missing speed falls back
    /// to the server's configured default.
    Move {
        id: ActionId,
        session_id: u64,
        target: MoveTarget,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<u8>,
    },
    /// Move a single joint to an absolute angle in degrees.
    MoveJoint {
        id: ActionId,
        session_id: u64,
        joint_index: u8,
        angle: f64,
        speed: u8,
    },
}

impl Action {
    /// The id assigned by the issuing controller.
    pub fn id(&self) -> ActionId {
        match self {
            Self::BeginSession { id, .. }
            | Self::ExitSession { id, .. }
            | Self::Move { id, .. }
            | Self::MoveJoint { id, .. } => *id,
        }
    }

    /// The session the action runs under; None for BeginSession.
    pub fn session_id(&self) -> Option<u64> {
        match self {
            Self::BeginSession { .. } => None,
            Self::ExitSession { session_id, .. }
            | Self::Move { session_id, .. }
            | Self::MoveJoint { session_id, .. } => Some(*session_id),
        }
    }

    /// The wire tag, for logs and registry checks.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BeginSession { .. } => tags::BEGIN_SESSION,
            Self::ExitSession { .. } => tags::EXIT_SESSION,
            Self::Move { .. } => tags::MOVE,
            Self::MoveJoint { .. } => tags::MOVE_JOINT,
        }
    }
}
