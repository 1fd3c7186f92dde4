// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Simulated arm backend for development and testing.
//!
//! Holds posture in memory and fakes motion by interpolating toward the
//! target over a fixed number of is_moving polls. No hardware or serial
//! port required.

use mecharm_core::arm::{Arm, ArmAccess, ArmCapabilities, ArmDriver, ArmInfo};
use mecharm_core::motion::{CartesianPose, MoveTarget, Position, JOINT_COUNT};
use mecharm_core::DynResult;

pub struct SimArm {
    info: ArmInfo,
    position: Position,
    start: Position,
    target: Option<Position>,
    steps_total: u32,
    steps_done: u32,
    fail_on_motion: Option<String>,
}

impl SimArm {
    pub fn new() -> Self {
        Self::with_steps(3)
    }

    /// A sim arm whose every move settles after `steps` is_moving polls.
    /// Zero steps means moves complete instantly.
    pub fn with_steps(steps: u32) -> Self {
        Self {
            info: ArmInfo {
                manufacturer: "Sim".to_string(),
                model: "sim6".to_string(),
                revision: "1.0".to_string(),
                capabilities: ArmCapabilities {
                    joints: JOINT_COUNT as u8,
                    servo_targets: true,
                    cartesian_targets: true,
                    motion_feedback: true,
                    max_speed: 100,
                },
                access: ArmAccess::Sim,
            },
            position: Position::origin(),
            start: Position::origin(),
            target: None,
            steps_total: steps,
            steps_done: 0,
            fail_on_motion: None,
        }
    }

    /// A sim arm whose begin_motion always fails, for exercising the move
    /// error path.
    pub fn failing(reason: &str) -> Self {
        let mut arm = Self::new();
        arm.fail_on_motion = Some(reason.to_string());
        arm
    }

    fn resolve_target(&self, target: &MoveTarget) -> Position {
        match target {
            MoveTarget::Cartesian { pose } => Position {
                joints: self.position.joints,
                coords: *pose,
            },
            MoveTarget::Servos { values } => {
                let mut joints = [0.0; JOINT_COUNT];
                for (joint, value) in joints.iter_mut().zip(values.iter()) {
                    // encoder 2048 is the joint's zero, 4096 steps per turn
                    *joint = (f64::from(*value) - 2048.0) * 360.0 / 4096.0;
                }
                Position {
                    joints,
                    coords: forward_coords(&joints),
                }
            }
            MoveTarget::Angles { .. } | MoveTarget::Radians { .. } => {
                let joints = target.as_degrees().unwrap_or(self.position.joints);
                Position {
                    joints,
                    coords: forward_coords(&joints),
                }
            }
        }
    }
}

impl Default for SimArm {
    fn default() -> Self {
        Self::new()
    }
}

/// Toy forward map. Tests only need coords that move when joints do.
fn forward_coords(joints: &[f64; JOINT_COUNT]) -> CartesianPose {
    CartesianPose {
        head: [joints[0], joints[1], joints[2]],
        orientation: [joints[3], joints[4], joints[5]],
    }
}

fn lerp(a: &Position, b: &Position, t: f64) -> Position {
    let mut joints = [0.0; JOINT_COUNT];
    for (i, out) in joints.iter_mut().enumerate() {
        *out = a.joints[i] + (b.joints[i] - a.joints[i]) * t;
    }
    let mut head = [0.0; 3];
    let mut orientation = [0.0; 3];
    for i in 0..3 {
        head[i] = a.coords.head[i] + (b.coords.head[i] - a.coords.head[i]) * t;
        orientation[i] =
            a.coords.orientation[i] + (b.coords.orientation[i] - a.coords.orientation[i]) * t;
    }
    Position {
        joints,
        coords: CartesianPose { head, orientation },
    }
}

impl Arm for SimArm {
    fn info(&self) -> &ArmInfo {
        &self.info
    }
}

impl ArmDriver for SimArm {
    fn current_position(&mut self) -> DynResult<Position> {
        Ok(self.position)
    }

    fn begin_motion(&mut self, target: &MoveTarget, speed: u8) -> DynResult<()> {
        if let Some(reason) = &self.fail_on_motion {
            return Err(reason.clone().into());
        }
        self.start = self.position;
        self.target = Some(self.resolve_target(target));
        self.steps_done = 0;
        tracing::debug!("sim motion to {} target at speed {}", target.kind(), speed);
        Ok(())
    }

    fn is_moving(&mut self) -> DynResult<bool> {
        let Some(target) = self.target else {
            return Ok(false);
        };
        if self.steps_done >= self.steps_total {
            self.position = target;
            self.target = None;
            return Ok(false);
        }
        self.steps_done += 1;
        let t = f64::from(self.steps_done) / f64::from(self.steps_total);
        self.position = lerp(&self.start, &target, t);
        if self.steps_done >= self.steps_total {
            self.position = target;
            self.target = None;
            Ok(false)
        } else {
            Ok(true)
        }
    }

    fn stop(&mut self) -> DynResult<()> {
        self.target = None;
        Ok(())
    }
}
