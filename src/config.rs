// Timeouts, tags, serial settings and board layout
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::device::Pin;
use crate::sensors::Debounce;

// Runtime loop frequency, matched to the 100Hz UART-RVC output rate
pub const LOOP_HZ: u64 = 100;
pub const MAX_LOOP_HZ: u64 = 1000;

// No IMU frame for this long marks the IMU stale
pub const IMU_TIMEOUT: Duration = Duration::from_millis(250);

// IMU serial link (BNO08x UART-RVC runs at 115200 baud)
pub const IMU_PORT: &str = "/dev/ttyUSB0";
pub const IMU_BAUDRATE: u32 = 115_200;
pub const SERIAL_TIMEOUT_MS: u64 = 10;

// Wheel speed pulses closer than this are treated as bounce
pub const BOUNCE_TIME_MS: u64 = 100;
// No pulse for this long means the wheel is stopped
pub const STALL_TIMEOUT_MS: u64 = 2000;

// Distance covered per wheel revolution, for the odometer
pub const WHEEL_CIRCUMFERENCE_M: f32 = 1.6;

// Device tree tags
pub const TAG_MAIN: &str = "main";
pub const TAG_WSC: &str = "wsc"; // wheel speed controller
pub const TAG_POWER: &str = "power"; // pedals
pub const TAG_IMU: &str = "imu";
pub const TAG_ODOMETER: &str = "odometer";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImuConfig {
    pub enabled: bool,
    pub port: String,
    pub baud_rate: u32,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: IMU_PORT.to_string(),
            baud_rate: IMU_BAUDRATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WheelSpeedConfig {
    pub tag: String,
    pub pin: Pin,
    #[serde(default)]
    pub debounce: Debounce,
    #[serde(default = "default_stall_timeout")]
    pub stall_timeout_ms: u64,
}

fn default_stall_timeout() -> u64 {
    STALL_TIMEOUT_MS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PedalConfig {
    pub tag: String,
    pub pin: Pin,
    /// Normalized reading at rest
    pub rest_value: f32,
    /// Normalized travel from rest to full press
    pub max_value: f32,
}

/// Board layout loaded from JSON; missing fields fall back to the defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub loop_hz: u64,
    pub imu: ImuConfig,
    pub wheel_speed: Vec<WheelSpeedConfig>,
    pub pedals: Vec<PedalConfig>,
    pub wheel_circumference_m: f32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            loop_hz: LOOP_HZ,
            imu: ImuConfig::default(),
            wheel_speed: vec![
                WheelSpeedConfig {
                    tag: "front".to_string(),
                    pin: 2,
                    debounce: Debounce::default(),
                    stall_timeout_ms: STALL_TIMEOUT_MS,
                },
                WheelSpeedConfig {
                    tag: "rear".to_string(),
                    pin: 3,
                    debounce: Debounce::default(),
                    stall_timeout_ms: STALL_TIMEOUT_MS,
                },
            ],
            pedals: vec![
                PedalConfig {
                    tag: "throttle".to_string(),
                    pin: 14,
                    rest_value: 0.1,
                    max_value: 0.8,
                },
                PedalConfig {
                    tag: "brake".to_string(),
                    pin: 15,
                    rest_value: 0.1,
                    max_value: 0.8,
                },
            ],
            wheel_circumference_m: WHEEL_CIRCUMFERENCE_M,
        }
    }
}

impl BoardConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check a config that did not come through `from_json` (e.g. CLI overrides)
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loop_hz == 0 || self.loop_hz > MAX_LOOP_HZ {
            return Err(ConfigError::Invalid(format!(
                "loop_hz must be in 1..={}, got {}",
                MAX_LOOP_HZ, self.loop_hz
            )));
        }
        if let Some(pedal) = self.pedals.iter().find(|p| p.max_value == 0.0) {
            return Err(ConfigError::Invalid(format!(
                "pedal `{}` has zero max_value",
                pedal.tag
            )));
        }
        Ok(())
    }

    pub fn loop_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.loop_hz.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = BoardConfig::from_json("{}").unwrap();
        assert_eq!(config, BoardConfig::default());
        assert_eq!(config.loop_period(), Duration::from_millis(10));
    }

    #[test]
    fn test_partial_config() {
        let json = r#"{
            "loop_hz": 200,
            "imu": { "port": "/dev/ttyAMA0" },
            "wheel_speed": [
                { "tag": "left", "pin": 5, "debounce": { "kind": "edge" } },
                { "tag": "right", "pin": 6,
                  "debounce": { "kind": "time_gated", "interval_ms": 40 } }
            ],
            "pedals": []
        }"#;
        let config = BoardConfig::from_json(json).unwrap();
        assert_eq!(config.loop_hz, 200);
        assert_eq!(config.imu.port, "/dev/ttyAMA0");
        assert_eq!(config.imu.baud_rate, IMU_BAUDRATE);
        assert_eq!(config.wheel_speed[0].debounce, Debounce::Edge);
        assert_eq!(
            config.wheel_speed[1].debounce,
            Debounce::TimeGated { interval_ms: 40 }
        );
        assert_eq!(config.wheel_speed[1].stall_timeout_ms, STALL_TIMEOUT_MS);
        assert!(config.pedals.is_empty());
    }

    #[test]
    fn test_fastest_loop_rate_has_nonzero_period() {
        let mut config = BoardConfig::default();
        config.loop_hz = MAX_LOOP_HZ;
        assert!(config.validate().is_ok());
        assert_eq!(config.loop_period(), Duration::from_millis(1));

        config.loop_hz = MAX_LOOP_HZ + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_loop_rate_rejected() {
        assert!(matches!(
            BoardConfig::from_json(r#"{ "loop_hz": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            BoardConfig::from_json(r#"{ "loop_hz": 5000 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            BoardConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
