// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod arm;
pub mod error;
pub mod motion;
pub mod pipeline;
pub mod session;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use arm::{Arm, ArmAccess, ArmCapabilities, ArmDriver, ArmInfo};
pub use error::ErrorCode;
pub use motion::{CartesianPose, MoveTarget, Position, JOINT_COUNT};
pub use pipeline::{MotionCommand, MotionJob, MotionUpdate};
pub use session::{ActionId, ActionIdGen, LeaseError, SessionInfo, SessionMachine, SessionState};
