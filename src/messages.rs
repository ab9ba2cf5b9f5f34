// Define reading and report types produced by the device tree

use serde::{Serialize, Serializer};

/// Raw orientation unit: hundredths of a degree
pub const DEGREE_SCALE: f32 = 0.01;
/// Raw acceleration unit: milli-g, converted to m/s²
pub const MILLI_G_TO_MS2: f32 = 0.0098067;

/// One decoded IMU sample: orientation in degrees, acceleration in m/s²
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MotionRecord {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub x_accel: f32,
    pub y_accel: f32,
    pub z_accel: f32,
}

impl MotionRecord {
    /// Scale raw wire values [yaw, pitch, roll, x, y, z]
    pub fn from_raw(raw: [i16; 6]) -> Self {
        Self {
            yaw: raw[0] as f32 * DEGREE_SCALE,
            pitch: raw[1] as f32 * DEGREE_SCALE,
            roll: raw[2] as f32 * DEGREE_SCALE,
            x_accel: raw[3] as f32 * MILLI_G_TO_MS2,
            y_accel: raw[4] as f32 * MILLI_G_TO_MS2,
            z_accel: raw[5] as f32 * MILLI_G_TO_MS2,
        }
    }
}

/// Value produced by `Sensor::read`
///
/// Leaves return a scalar or a motion record; controllers return a snapshot
/// of their children keyed by tag, in attach order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    Scalar(f32),
    Motion(MotionRecord),
    Snapshot(#[serde(serialize_with = "serialize_snapshot")] Vec<(String, Reading)>),
}

impl Reading {
    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            Reading::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_motion(&self) -> Option<&MotionRecord> {
        match self {
            Reading::Motion(record) => Some(record),
            _ => None,
        }
    }

    /// Child reading of a snapshot by tag
    pub fn get(&self, tag: &str) -> Option<&Reading> {
        match self {
            Reading::Snapshot(entries) => entries
                .iter()
                .find(|(entry_tag, _)| entry_tag == tag)
                .map(|(_, reading)| reading),
            _ => None,
        }
    }

    /// Descend through nested snapshots
    pub fn at(&self, path: &[&str]) -> Option<&Reading> {
        path.iter().try_fold(self, |reading, tag| reading.get(tag))
    }
}

// Snapshots go out as JSON objects, keeping attach order
fn serialize_snapshot<S: Serializer>(
    entries: &[(String, Reading)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(entries.iter().map(|(tag, reading)| (tag, reading)))
}

/// Health status reported with every cycle
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    ImuStale,
    ImuDisabled,
}

/// One line of runtime output per polling cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub health: RuntimeHealth,
    pub mileage: f32,
    pub readings: Reading,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_applies_wire_scales() {
        let record = MotionRecord::from_raw([500, -200, 0, 100, 0, -50]);
        assert!((record.yaw - 5.0).abs() < 1e-5);
        assert!((record.pitch + 2.0).abs() < 1e-5);
        assert!((record.x_accel - 0.98067).abs() < 1e-5);
        assert!((record.z_accel + 0.490335).abs() < 1e-5);
    }

    #[test]
    fn test_snapshot_serializes_as_object() {
        let reading = Reading::Snapshot(vec![
            ("front".to_string(), Reading::Scalar(120.0)),
            (
                "power".to_string(),
                Reading::Snapshot(vec![("throttle".to_string(), Reading::Scalar(0.5))]),
            ),
        ]);
        let json = serde_json::to_string(&reading).unwrap();
        assert_eq!(json, r#"{"front":120.0,"power":{"throttle":0.5}}"#);
    }

    #[test]
    fn test_reading_path_lookup() {
        let reading = Reading::Snapshot(vec![(
            "wsc".to_string(),
            Reading::Snapshot(vec![("rear".to_string(), Reading::Scalar(42.0))]),
        )]);
        assert_eq!(reading.at(&["wsc", "rear"]).and_then(Reading::as_scalar), Some(42.0));
        assert!(reading.at(&["wsc", "front"]).is_none());
        assert!(Reading::Scalar(1.0).get("x").is_none());
    }

    #[test]
    fn test_health_serialization() {
        let json = serde_json::to_string(&RuntimeHealth::ImuStale).unwrap();
        assert_eq!(json, "\"imu_stale\"");
    }
}
