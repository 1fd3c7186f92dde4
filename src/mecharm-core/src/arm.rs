// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Actuator capability surface implemented by arm backends.

use serde::{Deserialize, Serialize};

use crate::motion::{MoveTarget, Position};
use crate::DynResult;

/// How a backend reaches the arm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArmAccess {
    Serial { path: String, baud: u32 },
    Sim,
}

/// Static info describing an arm backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmInfo {
    pub manufacturer: String,
    pub model: String,
    pub revision: String,
    pub capabilities: ArmCapabilities,
    pub access: ArmAccess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmCapabilities {
    pub joints: u8,
    /// Backend accepts raw servo encoder targets.
    pub servo_targets: bool,
    /// Backend accepts Cartesian targets and resolves its own kinematics.
    pub cartesian_targets: bool,
    /// Backend reports motion state while a move runs, enabling progress
    /// events. Without it every move completes blind.
    pub motion_feedback: bool,
    pub max_speed: u8,
}

/// Common interface for arm backends.
pub trait Arm {
    fn info(&self) -> &ArmInfo;
}

/// Blocking actuator operations every backend implements.
///
/// Calls may block on the serial line and are not reentrant. The engine
/// never touches a driver directly: exactly one worker thread owns it and
/// serializes every call.
pub trait ArmDriver: Arm + Send {
    /// Read the current posture.
    fn current_position(&mut self) -> DynResult<Position>;

    /// Start moving toward a target. Returns once the firmware accepted
    /// the command; the arm keeps moving on its own afterwards.
    fn begin_motion(&mut self, target: &MoveTarget, speed: u8) -> DynResult<()>;

    /// Whether a motion is still running.
    fn is_moving(&mut self) -> DynResult<bool>;

    /// Halt motion in place.
    fn stop(&mut self) -> DynResult<()>;
}
