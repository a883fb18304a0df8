//! Device orientation bucketing and rotation compensation.
//!
//! Raw accelerometer degrees are collapsed into three coarse buckets so the
//! UI and the JPEG/recorder rotation only react when the device actually
//! changes posture, not at every degree near a boundary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceOrientation {
    Portrait,
    LandscapeLeft,
    LandscapeRight,
}

/// Bucket raw sensor degrees. The ranges are intentionally narrower than a
/// quarter turn so the bucket is sticky around the 45-degree diagonals.
pub fn bucket_degrees(degrees: i32) -> DeviceOrientation {
    match degrees.rem_euclid(360) {
        75..=134 => DeviceOrientation::LandscapeRight,
        225..=289 => DeviceOrientation::LandscapeLeft,
        _ => DeviceOrientation::Portrait,
    }
}

/// Degrees to add to the sensor orientation when writing JPEG metadata.
pub fn compensate_device_rotation(orientation: DeviceOrientation) -> u32 {
    match orientation {
        DeviceOrientation::LandscapeLeft => 270,
        DeviceOrientation::LandscapeRight => 90,
        DeviceOrientation::Portrait => 0,
    }
}

/// Final orientation stamped on a still capture.
pub fn jpeg_orientation(sensor_orientation: u32, device_orientation: DeviceOrientation) -> u32 {
    (sensor_orientation + compensate_device_rotation(device_orientation)) % 360
}

/// Recorder orientation hint for sensors mounted at 90 degrees, keyed by the
/// display rotation in degrees.
fn default_recorder_hint(display_rotation: u32) -> Option<u32> {
    match display_rotation {
        0 => Some(90),
        90 => Some(0),
        180 => Some(270),
        270 => Some(180),
        _ => None,
    }
}

/// Inverse table, for sensors mounted at 270 degrees.
fn inverse_recorder_hint(display_rotation: u32) -> Option<u32> {
    match display_rotation {
        0 => Some(270),
        90 => Some(180),
        180 => Some(90),
        270 => Some(0),
        _ => None,
    }
}

/// Orientation hint applied to a video recording. Sensors mounted at other
/// angles get no hint, matching the hardware convention.
pub fn recorder_orientation_hint(sensor_orientation: u32, display_rotation: u32) -> Option<u32> {
    match sensor_orientation {
        90 => default_recorder_hint(display_rotation),
        270 => inverse_recorder_hint(display_rotation),
        _ => None,
    }
}

/// Tracks the last handled orientation bucket and only reports changes.
#[derive(Debug, Clone)]
pub struct OrientationWatcher {
    last: DeviceOrientation,
}

impl Default for OrientationWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl OrientationWatcher {
    pub fn new() -> Self {
        Self {
            last: DeviceOrientation::Portrait,
        }
    }

    /// Feed a raw orientation reading. Returns the new bucket when it
    /// differs from the last handled one, otherwise `None`.
    pub fn update(&mut self, raw_degrees: i32) -> Option<DeviceOrientation> {
        let bucket = bucket_degrees(raw_degrees);
        if bucket == self.last {
            None
        } else {
            self.last = bucket;
            Some(bucket)
        }
    }

    pub fn last_handled(&self) -> DeviceOrientation {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = DeviceOrientation::Portrait;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(bucket_degrees(80), DeviceOrientation::LandscapeRight);
        assert_eq!(bucket_degrees(280), DeviceOrientation::LandscapeLeft);
        assert_eq!(bucket_degrees(10), DeviceOrientation::Portrait);
        assert_eq!(bucket_degrees(74), DeviceOrientation::Portrait);
        assert_eq!(bucket_degrees(75), DeviceOrientation::LandscapeRight);
        assert_eq!(bucket_degrees(134), DeviceOrientation::LandscapeRight);
        assert_eq!(bucket_degrees(135), DeviceOrientation::Portrait);
        assert_eq!(bucket_degrees(225), DeviceOrientation::LandscapeLeft);
        assert_eq!(bucket_degrees(289), DeviceOrientation::LandscapeLeft);
        assert_eq!(bucket_degrees(290), DeviceOrientation::Portrait);
    }

    #[test]
    fn test_watcher_hysteresis() {
        let mut watcher = OrientationWatcher::new();
        assert_eq!(watcher.update(80), Some(DeviceOrientation::LandscapeRight));
        // Same bucket, no update.
        assert_eq!(watcher.update(85), None);
        assert_eq!(watcher.last_handled(), DeviceOrientation::LandscapeRight);
        assert_eq!(watcher.update(10), Some(DeviceOrientation::Portrait));
    }

    #[test]
    fn test_jpeg_orientation_wraps() {
        assert_eq!(jpeg_orientation(90, DeviceOrientation::LandscapeLeft), 0);
        assert_eq!(jpeg_orientation(90, DeviceOrientation::Portrait), 90);
        assert_eq!(jpeg_orientation(270, DeviceOrientation::LandscapeRight), 0);
    }

    #[test]
    fn test_recorder_hint_tables() {
        assert_eq!(recorder_orientation_hint(90, 0), Some(90));
        assert_eq!(recorder_orientation_hint(90, 90), Some(0));
        assert_eq!(recorder_orientation_hint(270, 0), Some(270));
        assert_eq!(recorder_orientation_hint(270, 270), Some(0));
        assert_eq!(recorder_orientation_hint(0, 0), None);
    }

    #[test]
    fn test_negative_degrees_normalized() {
        assert_eq!(bucket_degrees(-80), DeviceOrientation::LandscapeLeft);
    }
}
