// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Backend for Elephant Robotics MyCobot / mechArm serial control.
//!
//! Speaks the firmware's framed command protocol over a blocking serial
//! port. Every call runs on the engine's single worker thread, so plain
//! blocking reads with a deadline are fine here.

use std::io::Read;
use std::io::Write;
use std::time::Duration;

use tokio_serial::SerialPort;

use mecharm_core::arm::{Arm, ArmAccess, ArmCapabilities, ArmDriver, ArmInfo};
use mecharm_core::motion::{CartesianPose, MoveTarget, Position, JOINT_COUNT};
use mecharm_core::DynResult;

pub struct MyCobotArm {
    port: Box<dyn SerialPort>,
    info: ArmInfo,
}

impl MyCobotArm {
    const READ_TIMEOUT: Duration = Duration::from_millis(800);

    pub fn new(path: &str, baud: u32) -> DynResult<Self> {
        let port = tokio_serial::new(path, baud)
            .timeout(Self::READ_TIMEOUT)
            .open()?;
        let info = ArmInfo {
            manufacturer: "Elephant Robotics".to_string(),
            model: "mechArm 270".to_string(),
            revision: "".to_string(),
            capabilities: ArmCapabilities {
                joints: JOINT_COUNT as u8,
                servo_targets: true,
                cartesian_targets: true,
                motion_feedback: true,
                max_speed: 100,
            },
            access: ArmAccess::Serial {
                path: path.to_string(),
                baud,
            },
        };
        Ok(Self { port, info })
    }

    /// Read all six joint angles in degrees.
    pub fn get_angles(&mut self) -> DynResult<[f64; JOINT_COUNT]> {
        let data = self.command(CMD_GET_ANGLES, &[], 2 * JOINT_COUNT)?;
        let mut degrees = [0.0; JOINT_COUNT];
        for (i, angle) in degrees.iter_mut().enumerate() {
            *angle = f64::from(read_i16(&data, 2 * i)) / 100.0;
        }
        Ok(degrees)
    }

    /// Read the Cartesian head pose.
    pub fn get_coords(&mut self) -> DynResult<CartesianPose> {
        let data = self.command(CMD_GET_COORDS, &[], 12)?;
        let mut head = [0.0; 3];
        let mut orientation = [0.0; 3];
        for i in 0..3 {
            // x/y/z in 0.1 mm, rx/ry/rz in centidegrees
            head[i] = f64::from(read_i16(&data, 2 * i)) / 10.0;
            orientation[i] = f64::from(read_i16(&data, 6 + 2 * i)) / 100.0;
        }
        Ok(CartesianPose { head, orientation })
    }

    /// Command a move of all six joints.
    pub fn send_angles(&mut self, degrees: &[f64; JOINT_COUNT], speed: u8) -> DynResult<()> {
        self.write_frame(CMD_SEND_ANGLES, &angles_payload(degrees, speed))
    }

    /// Command a Cartesian move; the firmware runs its own kinematics.
    pub fn send_coords(&mut self, pose: &CartesianPose, speed: u8) -> DynResult<()> {
        self.write_frame(CMD_SEND_COORDS, &coords_payload(pose, speed))
    }

    /// Command raw servo encoder targets.
    pub fn set_encoders(&mut self, values: &[u16; JOINT_COUNT], speed: u8) -> DynResult<()> {
        self.write_frame(CMD_SET_ENCODERS, &encoders_payload(values, speed))
    }

    /// Whether the firmware reports a motion in progress.
    pub fn check_moving(&mut self) -> DynResult<bool> {
        let data = self.command(CMD_IS_MOVING, &[], 1)?;
        Ok(data[0] != 0)
    }

    /// Halt motion in place. Fire-and-forget, the firmware sends no reply.
    pub fn halt(&mut self) -> DynResult<()> {
        self.write_frame(CMD_STOP, &[])
    }

    fn command(&mut self, cmd: u8, data: &[u8], reply_len: usize) -> DynResult<Vec<u8>> {
        self.write_frame(cmd, data)?;
        self.read_reply(cmd, reply_len)
    }

    fn write_frame(&mut self, cmd: u8, data: &[u8]) -> DynResult<()> {
        let frame = encode_frame(cmd, data);
        tracing::trace!("mycobot tx cmd 0x{:02X} ({} data bytes)", cmd, data.len());
        self.port.write_all(&frame)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read one reply frame for `want_cmd`. The port timeout bounds every
    /// read, so a silent firmware surfaces as an error instead of a hang.
    fn read_reply(&mut self, want_cmd: u8, want_len: usize) -> DynResult<Vec<u8>> {
        // Hunt for the two-byte header; the firmware occasionally emits
        // noise between frames.
        let mut prev = 0u8;
        loop {
            let byte = self.read_byte()?;
            if prev == FRAME_HEADER && byte == FRAME_HEADER {
                break;
            }
            prev = byte;
        }
        let len = usize::from(self.read_byte()?);
        if len < 2 {
            return Err("mycobot reply frame too short".into());
        }
        let mut body = vec![0u8; len];
        self.port.read_exact(&mut body)?;
        let cmd = body[0];
        if body[len - 1] != FRAME_FOOTER {
            return Err(format!("mycobot reply missing footer (cmd 0x{:02X})", cmd).into());
        }
        if cmd != want_cmd {
            return Err(format!(
                "mycobot replied to 0x{:02X} while waiting for 0x{:02X}",
                cmd, want_cmd
            )
            .into());
        }
        let data = body[1..len - 1].to_vec();
        if data.len() != want_len {
            return Err(format!(
                "mycobot reply for 0x{:02X} carried {} data bytes, expected {}",
                cmd,
                data.len(),
                want_len
            )
            .into());
        }
        Ok(data)
    }

    fn read_byte(&mut self) -> DynResult<u8> {
        let mut buf = [0u8; 1];
        self.port.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

impl Arm for MyCobotArm {
    fn info(&self) -> &ArmInfo {
        &self.info
    }
}

impl ArmDriver for MyCobotArm {
    fn current_position(&mut self) -> DynResult<Position> {
        let joints = self.get_angles()?;
        let coords = self.get_coords()?;
        Ok(Position { joints, coords })
    }

    fn begin_motion(&mut self, target: &MoveTarget, speed: u8) -> DynResult<()> {
        match target {
            MoveTarget::Angles { degrees } => self.send_angles(degrees, speed),
            MoveTarget::Radians { .. } => {
                let degrees = target
                    .as_degrees()
                    .ok_or("radian target with no joint-space form")?;
                self.send_angles(&degrees, speed)
            }
            MoveTarget::Servos { values } => self.set_encoders(values, speed),
            MoveTarget::Cartesian { pose } => self.send_coords(pose, speed),
        }
    }

    fn is_moving(&mut self) -> DynResult<bool> {
        self.check_moving()
    }

    fn stop(&mut self) -> DynResult<()> {
        self.halt()
    }
}

fn encode_frame(cmd: u8, data: &[u8]) -> Vec<u8> {
    // length counts the command byte, the data and the footer
    let mut frame = Vec::with_capacity(data.len() + 5);
    frame.push(FRAME_HEADER);
    frame.push(FRAME_HEADER);
    frame.push((data.len() + 2) as u8);
    frame.push(cmd);
    frame.extend_from_slice(data);
    frame.push(FRAME_FOOTER);
    frame
}

fn angles_payload(degrees: &[f64; JOINT_COUNT], speed: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(2 * JOINT_COUNT + 1);
    for angle in degrees {
        push_i16(&mut data, centi(*angle));
    }
    data.push(speed);
    data
}

fn coords_payload(pose: &CartesianPose, speed: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(14);
    for mm in pose.head {
        push_i16(&mut data, deci(mm));
    }
    for angle in pose.orientation {
        push_i16(&mut data, centi(angle));
    }
    data.push(speed);
    data.push(MODE_LINEAR);
    data
}

fn encoders_payload(values: &[u16; JOINT_COUNT], speed: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(2 * JOINT_COUNT + 1);
    for value in values {
        data.extend_from_slice(&value.to_be_bytes());
    }
    data.push(speed);
    data
}

/// Degrees to centidegrees, clamped to the int16 wire range.
fn centi(value: f64) -> i16 {
    (value * 100.0).round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

/// Millimeters to the firmware's 0.1 mm unit.
fn deci(value: f64) -> i16 {
    (value * 10.0).round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

fn push_i16(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn read_i16(data: &[u8], offset: usize) -> i16 {
    i16::from_be_bytes([data[offset], data[offset + 1]])
}

// Command codes per the MyCobot serial protocol.
const FRAME_HEADER: u8 = 0xFE;
const FRAME_FOOTER: u8 = 0xFA;
const CMD_GET_ANGLES: u8 = 0x20;
const CMD_SEND_ANGLES: u8 = 0x22;
const CMD_GET_COORDS: u8 = 0x23;
const CMD_SEND_COORDS: u8 = 0x25;
const CMD_STOP: u8 = 0x29;
const CMD_IS_MOVING: u8 = 0x2B;
const CMD_SET_ENCODERS: u8 = 0x3A;
const MODE_LINEAR: u8 = 0x01;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        // bare query: fe fe 02 20 fa
        assert_eq!(encode_frame(CMD_GET_ANGLES, &[]), vec![0xFE, 0xFE, 0x02, 0x20, 0xFA]);

        let frame = encode_frame(CMD_SEND_ANGLES, &[0x01, 0x02, 0x03]);
        assert_eq!(frame[2], 5, "length covers cmd, data and footer");
        assert_eq!(frame.last(), Some(&0xFA));
    }

    #[test]
    fn test_angles_payload_scaling() {
        let data = angles_payload(&[90.0, -90.0, 0.0, 0.0, 0.0, 0.0], 50);
        assert_eq!(data.len(), 13);
        assert_eq!(read_i16(&data, 0), 9000);
        assert_eq!(read_i16(&data, 2), -9000);
        assert_eq!(data[12], 50);
    }

    #[test]
    fn test_coords_payload_scaling() {
        let pose = CartesianPose {
            head: [150.5, -60.0, 220.0],
            orientation: [0.0, 90.0, -45.0],
        };
        let data = coords_payload(&pose, 40);
        assert_eq!(data.len(), 14);
        assert_eq!(read_i16(&data, 0), 1505);
        assert_eq!(read_i16(&data, 2), -600);
        assert_eq!(read_i16(&data, 8), 9000);
        assert_eq!(data[12], 40);
        assert_eq!(data[13], MODE_LINEAR);
    }

    #[test]
    fn test_encoders_payload_layout() {
        let data = encoders_payload(&[2048, 0, 4096, 1, 2, 3], 20);
        assert_eq!(data.len(), 13);
        assert_eq!(u16::from_be_bytes([data[0], data[1]]), 2048);
        assert_eq!(u16::from_be_bytes([data[4], data[5]]), 4096);
        assert_eq!(data[12], 20);
    }

    #[test]
    fn test_centi_round_trips_firmware_values() {
        assert_eq!(centi(12.34), 1234);
        assert_eq!(centi(-180.0), -18000);
        assert_eq!(f64::from(read_i16(&centi(45.67).to_be_bytes(), 0)) / 100.0, 45.67);
    }

    #[test]
    fn test_centi_clamps_out_of_range() {
        assert_eq!(centi(400.0), i16::MAX);
        assert_eq!(centi(-400.0), i16::MIN);
    }
}
