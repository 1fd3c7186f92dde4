// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Posture and motion target types shared by the wire protocol and the
//! arm drivers.

use serde::{Deserialize, Serialize};

/// Number of joints on the supported arms.
pub const JOINT_COUNT: usize = 6;

/// Cartesian pose of the arm head: x/y/z in millimeters plus rx/ry/rz
/// Euler angles in degrees, laid out the way the firmware reports coords.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartesianPose {
    pub head: [f64; 3],
    pub orientation: [f64; 3],
}

impl CartesianPose {
    pub fn zero() -> Self {
        Self {
            head: [0.0; 3],
            orientation: [0.0; 3],
        }
    }
}

/// Full measured posture: per-joint angles in degrees plus the Cartesian
/// pose derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub joints: [f64; JOINT_COUNT],
    pub coords: CartesianPose,
}

impl Position {
    /// All joints at zero degrees.
    pub fn origin() -> Self {
        Self {
            joints: [0.0; JOINT_COUNT],
            coords: CartesianPose::zero(),
        }
    }
}

/// Where a move should end up. Each target carries exactly one
/// representation; there is no way to construct a mixed or empty one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MoveTarget {
    /// Per-joint angles in degrees.
    Angles { degrees: [f64; JOINT_COUNT] },
    /// Per-joint angles in radians.
    Radians { radians: [f64; JOINT_COUNT] },
    /// Raw servo encoder values.
    Servos { values: [u16; JOINT_COUNT] },
    /// Cartesian head pose.
    Cartesian { pose: CartesianPose },
}

impl MoveTarget {
    /// Joint-space angles in degrees, for targets that have a direct
    /// joint-space form. Cartesian and raw-servo targets return None;
    /// resolving those requires the arm's own kinematics.
    pub fn as_degrees(&self) -> Option<[f64; JOINT_COUNT]> {
        match self {
            Self::Angles { degrees } => Some(*degrees),
            Self::Radians { radians } => {
                let mut degrees = [0.0; JOINT_COUNT];
                for (out, rad) in degrees.iter_mut().zip(radians.iter()) {
                    *out = rad.to_degrees();
                }
                Some(degrees)
            }
            Self::Servos { .. } | Self::Cartesian { .. } => None,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Angles { .. } => "angles",
            Self::Radians { .. } => "radians",
            Self::Servos { .. } => "servos",
            Self::Cartesian { .. } => "cartesian",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_target_tagged_encoding() {
        let target = MoveTarget::Angles {
            degrees: [0.0, 15.0, -30.0, 0.0, 45.0, 90.0],
        };
        let json = serde_json::to_string(&target).unwrap();
        assert!(json.contains(r#""kind":"angles""#));
        assert!(json.contains(r#""degrees""#));
    }

    #[test]
    fn test_move_target_round_trip() {
        let targets = vec![
            MoveTarget::Angles {
                degrees: [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            },
            MoveTarget::Radians {
                radians: [0.0, 0.5, -0.5, 1.0, -1.0, 3.0],
            },
            MoveTarget::Servos {
                values: [2048, 2048, 1024, 3072, 0, 4096],
            },
            MoveTarget::Cartesian {
                pose: CartesianPose {
                    head: [150.0, -60.0, 220.0],
                    orientation: [0.0, 90.0, -45.0],
                },
            },
        ];
        for target in targets {
            let json = serde_json::to_string(&target).unwrap();
            let decoded: MoveTarget = serde_json::from_str(&json).unwrap();
            assert_eq!(decoded, target, "round trip failed for {:?}", target);
        }
    }

    #[test]
    fn test_move_target_rejects_unknown_kind() {
        let json = r#"{"kind":"teleport","degrees":[0,0,0,0,0,0]}"#;
        assert!(serde_json::from_str::<MoveTarget>(json).is_err());
    }

    #[test]
    fn test_as_degrees_converts_radians() {
        let target = MoveTarget::Radians {
            radians: [std::f64::consts::PI, 0.0, 0.0, 0.0, 0.0, -std::f64::consts::FRAC_PI_2],
        };
        let degrees = target.as_degrees().unwrap();
        assert!((degrees[0] - 180.0).abs() < 1e-9);
        assert!((degrees[5] + 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_as_degrees_none_for_cartesian() {
        let target = MoveTarget::Cartesian {
            pose: CartesianPose::zero(),
        };
        assert!(target.as_degrees().is_none());
    }
}
