// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Bounds checks applied to decoded actions before they reach the
//! pipeline. A violation maps to a BadAction rejection; nothing invalid
//! is ever handed to a driver.

use thiserror::Error;

use mecharm_core::motion::MoveTarget;

use crate::action::Action;

pub const SPEED_MIN: u8 = 1;
pub const SPEED_MAX: u8 = 100;
pub const JOINT_MIN: u8 = 1;
pub const JOINT_MAX: u8 = 6;
pub const ANGLE_LIMIT_DEG: f64 = 180.0;
pub const SERVO_MAX: u16 = 4096;
/// Head reach per axis in millimeters, with margin over the arm's
/// 270 mm working radius.
pub const REACH_LIMIT_MM: f64 = 350.0;

/// Why an action failed validation. The Display form becomes the
/// BadAction reason on the wire.
#[derive(Debug, Error, PartialEq)]
pub enum ValidateError {
    #[error("joint index {index} out of range 1..=6")]
    JointIndex { index: u8 },
    #[error("angle {angle} out of range -180..=180 for joint {joint}")]
    AngleRange { joint: u8, angle: f64 },
    #[error("radians {radians} out of range -pi..=pi for joint {joint}")]
    RadianRange { joint: u8, radians: f64 },
    #[error("servo value {value} out of range 0..=4096 for joint {joint}")]
    ServoRange { joint: u8, value: u16 },
    #[error("speed {speed} out of range 1..=100")]
    SpeedRange { speed: u8 },
    #[error("{axis} coordinate {mm} mm outside the +/-350 mm reach")]
    ReachRange { axis: char, mm: f64 },
    #[error("orientation {angle} out of range -180..=180 on {axis}")]
    OrientationRange { axis: char, angle: f64 },
}

/// Validate every field of an action that carries physical bounds.
pub fn validate_action(action: &Action) -> Result<(), ValidateError> {
    match action {
        Action::BeginSession { .. } | Action::ExitSession { .. } => Ok(()),
        Action::Move { target, speed, .. } => {
            if let Some(speed) = speed {
                validate_speed(*speed)?;
            }
            validate_target(target)
        }
        Action::MoveJoint {
            joint_index,
            angle,
            speed,
            ..
        } => {
            if !(JOINT_MIN..=JOINT_MAX).contains(joint_index) {
                return Err(ValidateError::JointIndex {
                    index: *joint_index,
                });
            }
            if angle.abs() > ANGLE_LIMIT_DEG {
                return Err(ValidateError::AngleRange {
                    joint: *joint_index,
                    angle: *angle,
                });
            }
            validate_speed(*speed)
        }
    }
}

pub fn validate_speed(speed: u8) -> Result<(), ValidateError> {
    if (SPEED_MIN..=SPEED_MAX).contains(&speed) {
        Ok(())
    } else {
        Err(ValidateError::SpeedRange { speed })
    }
}

/// Validate a full-arm target against the joint and reach limits.
pub fn validate_target(target: &MoveTarget) -> Result<(), ValidateError> {
    match target {
        MoveTarget::Angles { degrees } => {
            for (i, angle) in degrees.iter().enumerate() {
                if angle.abs() > ANGLE_LIMIT_DEG {
                    return Err(ValidateError::AngleRange {
                        joint: i as u8 + 1,
                        angle: *angle,
                    });
                }
            }
            Ok(())
        }
        MoveTarget::Radians { radians } => {
            for (i, rad) in radians.iter().enumerate() {
                if rad.abs() > std::f64::consts::PI {
                    return Err(ValidateError::RadianRange {
                        joint: i as u8 + 1,
                        radians: *rad,
                    });
                }
            }
            Ok(())
        }
        MoveTarget::Servos { values } => {
            for (i, value) in values.iter().enumerate() {
                if *value > SERVO_MAX {
                    return Err(ValidateError::ServoRange {
                        joint: i as u8 + 1,
                        value: *value,
                    });
                }
            }
            Ok(())
        }
        MoveTarget::Cartesian { pose } => {
            for (axis, mm) in ['x', 'y', 'z'].into_iter().zip(pose.head) {
                if mm.abs() > REACH_LIMIT_MM {
                    return Err(ValidateError::ReachRange { axis, mm });
                }
            }
            for (axis, angle) in ['x', 'y', 'z'].into_iter().zip(pose.orientation) {
                if angle.abs() > ANGLE_LIMIT_DEG {
                    return Err(ValidateError::OrientationRange { axis, angle });
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mecharm_core::motion::CartesianPose;
    use mecharm_core::session::ActionId;

    fn move_joint(joint_index: u8, angle: f64, speed: u8) -> Action {
        Action::MoveJoint {
            id: ActionId(1),
            session_id: 1,
            joint_index,
            angle,
            speed,
        }
    }

    #[test]
    fn test_joint_index_bounds() {
        assert!(validate_action(&move_joint(1, 0.0, 50)).is_ok());
        assert!(validate_action(&move_joint(6, 0.0, 50)).is_ok());
        assert_eq!(
            validate_action(&move_joint(0, 0.0, 50)),
            Err(ValidateError::JointIndex { index: 0 })
        );
        assert_eq!(
            validate_action(&move_joint(7, 0.0, 50)),
            Err(ValidateError::JointIndex { index: 7 })
        );
    }

    #[test]
    fn test_angle_bounds() {
        assert!(validate_action(&move_joint(3, 180.0, 50)).is_ok());
        assert!(validate_action(&move_joint(3, -180.0, 50)).is_ok());
        assert!(matches!(
            validate_action(&move_joint(3, 180.5, 50)),
            Err(ValidateError::AngleRange { joint: 3, .. })
        ));
    }

    #[test]
    fn test_speed_bounds() {
        assert!(validate_speed(1).is_ok());
        assert!(validate_speed(100).is_ok());
        assert_eq!(validate_speed(0), Err(ValidateError::SpeedRange { speed: 0 }));
        assert_eq!(
            validate_speed(101),
            Err(ValidateError::SpeedRange { speed: 101 })
        );
    }

    #[test]
    fn test_move_without_speed_skips_speed_check() {
        let action = Action::Move {
            id: ActionId(1),
            session_id: 1,
            target: MoveTarget::Angles { degrees: [0.0; 6] },
            speed: None,
        };
        assert!(validate_action(&action).is_ok());
    }

    #[test]
    fn test_servo_bounds() {
        assert!(validate_target(&MoveTarget::Servos {
            values: [0, 4096, 2048, 1, 4095, 3000],
        })
        .is_ok());
        assert_eq!(
            validate_target(&MoveTarget::Servos {
                values: [0, 0, 0, 4097, 0, 0],
            }),
            Err(ValidateError::ServoRange {
                joint: 4,
                value: 4097
            })
        );
    }

    #[test]
    fn test_radian_bounds() {
        assert!(validate_target(&MoveTarget::Radians {
            radians: [std::f64::consts::PI, 0.0, 0.0, 0.0, 0.0, 0.0],
        })
        .is_ok());
        assert!(matches!(
            validate_target(&MoveTarget::Radians {
                radians: [3.2, 0.0, 0.0, 0.0, 0.0, 0.0],
            }),
            Err(ValidateError::RadianRange { joint: 1, .. })
        ));
    }

    #[test]
    fn test_reach_bounds() {
        assert!(validate_target(&MoveTarget::Cartesian {
            pose: CartesianPose {
                head: [350.0, -350.0, 100.0],
                orientation: [0.0, 0.0, 0.0],
            },
        })
        .is_ok());
        assert!(matches!(
            validate_target(&MoveTarget::Cartesian {
                pose: CartesianPose {
                    head: [0.0, 400.0, 0.0],
                    orientation: [0.0, 0.0, 0.0],
                },
            }),
            Err(ValidateError::ReachRange { axis: 'y', .. })
        ));
        assert!(matches!(
            validate_target(&MoveTarget::Cartesian {
                pose: CartesianPose {
                    head: [0.0, 0.0, 0.0],
                    orientation: [0.0, 0.0, 200.0],
                },
            }),
            Err(ValidateError::OrientationRange { axis: 'z', .. })
        ));
    }

    #[test]
    fn test_reason_strings_are_wire_friendly() {
        let err = validate_speed(0).unwrap_err();
        assert_eq!(err.to_string(), "speed 0 out of range 1..=100");
    }
}
