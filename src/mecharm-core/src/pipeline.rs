// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Job and update types flowing between the session engine and the arm
//! worker thread.

use crate::motion::{MoveTarget, Position};
use crate::session::{ActionId, SessionInfo};

/// What an accepted motion action asks of the arm. A single-joint move
/// is resolved against the live posture by the worker, which is the only
/// place that knows it.
#[derive(Debug, Clone)]
pub enum MotionCommand {
    /// Full-arm move to a target posture.
    Target(MoveTarget),
    /// Absolute move of one joint, the others held in place.
    Joint { joint_index: u8, angle: f64 },
}

/// One accepted motion action, queued for the worker in arrival order.
#[derive(Debug, Clone)]
pub struct MotionJob {
    pub action_id: ActionId,
    pub session: SessionInfo,
    pub command: MotionCommand,
    pub speed: u8,
}

/// Outcome stream for a job: zero or more Progress updates followed by
/// exactly one terminal Complete or Failed.
#[derive(Debug, Clone)]
pub enum MotionUpdate {
    Progress {
        action_id: ActionId,
        session: SessionInfo,
        progress_seq: u32,
        current_position: Position,
        target_position: MoveTarget,
    },
    Complete {
        action_id: ActionId,
        session: SessionInfo,
        final_position: Position,
    },
    Failed {
        action_id: ActionId,
        session: SessionInfo,
        reason: String,
    },
}

impl MotionUpdate {
    /// Terminal updates retire the in-flight job; progress does not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }

    pub fn action_id(&self) -> ActionId {
        match self {
            Self::Progress { action_id, .. }
            | Self::Complete { action_id, .. }
            | Self::Failed { action_id, .. } => *action_id,
        }
    }

    pub fn session(&self) -> &SessionInfo {
        match self {
            Self::Progress { session, .. }
            | Self::Complete { session, .. }
            | Self::Failed { session, .. } => session,
        }
    }
}
