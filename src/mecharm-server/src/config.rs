// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for mecharm-server.
//!
//! Config is loaded from the `[mecharm-server]` section of `mecharm.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./mecharm.toml`
//! 3. `~/.config/mecharm/mecharm.toml`
//! 4. `/etc/mecharm/mecharm.toml`

use serde::{Deserialize, Serialize};

use mecharm_app::ConfigFile;
use mecharm_protocol::validate::{SPEED_MAX, SPEED_MIN};

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Arm backend configuration
    pub arm: ArmConfig,
    /// Session and motion behavior
    pub behavior: BehaviorConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Device id used in bus topics (`device/<id>/...`)
    pub device_id: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            device_id: "arm0".to_string(),
            log_level: None,
        }
    }
}

/// Arm backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmConfig {
    /// Arm model (e.g., "mycobot", "sim")
    pub model: Option<String>,
    /// Speed applied to moves that do not name one (percent)
    pub default_speed: u8,
    /// How the backend reaches the arm
    pub access: AccessConfig,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            model: None,
            default_speed: 50,
            access: AccessConfig::default(),
        }
    }
}

/// Arm access configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Access type: "serial" or "sim"
    #[serde(rename = "type")]
    pub access_type: Option<String>,
    /// Serial device path
    pub port: Option<String>,
    /// Serial baud rate
    pub baud: Option<u32>,
}

/// Behavior configuration for sessions and motion feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Poll interval in milliseconds while a move runs; sets the cadence
    /// of move_progress events
    pub progress_poll_ms: u64,
    /// Idle time in milliseconds before an inactive session is revoked
    pub inactivity_timeout_ms: u64,
    /// Queued move count past which accepted actions are logged as
    /// backed up
    pub queue_warn_depth: usize,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            progress_poll_ms: 200,
            inactivity_timeout_ms: 30_000,
            queue_warn_depth: 4,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        if self.general.device_id.trim().is_empty() {
            return Err("[general].device_id must not be empty".to_string());
        }
        if self.general.device_id.contains('/') {
            return Err(
                "[general].device_id must not contain '/' (it is embedded in bus topics)"
                    .to_string(),
            );
        }

        if !(SPEED_MIN..=SPEED_MAX).contains(&self.arm.default_speed) {
            return Err(format!(
                "[arm].default_speed must be in range {}..={}",
                SPEED_MIN, SPEED_MAX
            ));
        }
        validate_access(&self.arm.access)?;

        if self.behavior.progress_poll_ms == 0 {
            return Err("[behavior].progress_poll_ms must be > 0".to_string());
        }
        if self.behavior.inactivity_timeout_ms == 0 {
            return Err("[behavior].inactivity_timeout_ms must be > 0".to_string());
        }

        Ok(())
    }

    /// Generate an example configuration wrapped under the `[mecharm-server]`
    /// section header, suitable for use in a combined `mecharm.toml` file.
    pub fn example_combined_toml() -> String {
        #[derive(serde::Serialize)]
        struct Wrapper {
            #[serde(rename = "mecharm-server")]
            inner: ServerConfig,
        }
        let example = ServerConfig {
            general: GeneralConfig {
                device_id: "arm0".to_string(),
                log_level: Some("info".to_string()),
            },
            arm: ArmConfig {
                model: Some("mycobot".to_string()),
                default_speed: 50,
                access: AccessConfig {
                    access_type: Some("serial".to_string()),
                    port: Some("/dev/ttyAMA0".to_string()),
                    baud: Some(1_000_000),
                },
            },
            behavior: BehaviorConfig::default(),
        };
        toml::to_string_pretty(&Wrapper { inner: example }).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

fn validate_access(access: &AccessConfig) -> Result<(), String> {
    let serial_fields_set = access.port.is_some() || access.baud.is_some();
    if access.access_type.is_none() && !serial_fields_set {
        return Ok(());
    }

    match access.access_type.as_deref().unwrap_or("serial") {
        "serial" => {
            if access.port.as_deref().unwrap_or("").trim().is_empty() {
                return Err(
                    "[arm.access].port must be set for serial access ([arm.access].type='serial')"
                        .to_string(),
                );
            }
            if access.baud.unwrap_or(0) == 0 {
                return Err(
                    "[arm.access].baud must be > 0 for serial access ([arm.access].type='serial')"
                        .to_string(),
                );
            }
        }
        "sim" => {}
        other => {
            return Err(format!(
                "[arm.access].type '{}' is invalid (expected 'serial' or 'sim')",
                other
            ))
        }
    }
    Ok(())
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "mecharm-server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.general.device_id, "arm0");
        assert_eq!(config.general.log_level, None);
        assert_eq!(config.arm.model, None);
        assert_eq!(config.arm.default_speed, 50);
        assert_eq!(config.arm.access.access_type, None);
        assert_eq!(config.behavior.progress_poll_ms, 200);
        assert_eq!(config.behavior.inactivity_timeout_ms, 30_000);
        assert_eq!(config.behavior.queue_warn_depth, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[arm]
model = "mycobot"

[arm.access]
type = "serial"
port = "/dev/ttyAMA0"
baud = 1000000
"#;

        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.arm.model, Some("mycobot".to_string()));
        assert_eq!(config.arm.access.port, Some("/dev/ttyAMA0".to_string()));
        assert_eq!(config.arm.access.baud, Some(1_000_000));
        assert_eq!(config.general.device_id, "arm0", "defaults fill the rest");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[general]
device_id = "bench-arm"
log_level = "debug"

[arm]
model = "sim"
default_speed = 30

[arm.access]
type = "sim"

[behavior]
progress_poll_ms = 100
inactivity_timeout_ms = 5000
queue_warn_depth = 2
"#;

        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.device_id, "bench-arm");
        assert_eq!(config.general.log_level, Some("debug".to_string()));
        assert_eq!(config.arm.model, Some("sim".to_string()));
        assert_eq!(config.arm.default_speed, 30);
        assert_eq!(config.arm.access.access_type, Some("sim".to_string()));
        assert_eq!(config.behavior.progress_poll_ms, 100);
        assert_eq!(config.behavior.inactivity_timeout_ms, 5000);
        assert_eq!(config.behavior.queue_warn_depth, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_example_combined_toml_parses() {
        let example = ServerConfig::example_combined_toml();
        let table: toml::Table = toml::from_str(&example).unwrap();
        let section = toml::to_string(table.get("mecharm-server").unwrap()).unwrap();
        let config: ServerConfig = toml::from_str(&section).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_invalid_log_level() {
        let mut config = ServerConfig::default();
        config.general.log_level = Some("verbose".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_slash_in_device_id() {
        let mut config = ServerConfig::default();
        config.general.device_id = "lab/arm0".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_speed() {
        let mut config = ServerConfig::default();
        config.arm.default_speed = 0;
        assert!(config.validate().is_err());
        config.arm.default_speed = 101;
        assert!(config.validate().is_err());
        config.arm.default_speed = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut config = ServerConfig::default();
        config.behavior.progress_poll_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.behavior.inactivity_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_serial_access_requires_port_and_baud() {
        let mut config = ServerConfig::default();
        config.arm.access.access_type = Some("serial".to_string());
        assert!(config.validate().is_err());

        config.arm.access.port = Some("/dev/ttyAMA0".to_string());
        assert!(config.validate().is_err());

        config.arm.access.baud = Some(1_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_access_type() {
        let mut config = ServerConfig::default();
        config.arm.access.access_type = Some("tcp".to_string());
        assert!(config.validate().is_err());
    }
}
