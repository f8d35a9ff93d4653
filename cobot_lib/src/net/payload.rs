//! Pose line codec.
//!
//! One line per write: `<pose>;<J1>,<J2>,<J3>,<J4><suffix>` in ASCII, with
//! no terminator. The receiver frames on write boundaries.

use crate::types::{HandPose, JointAngles, LEGACY_PAYLOAD_SUFFIX};

/// Base angle limit applied after rounding.
pub const J1_PAYLOAD_LIMIT: f64 = 150.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFormat {
    suffix: String,
}

impl PayloadFormat {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn encode(&self, pose: HandPose, angles: &JointAngles) -> String {
        let base = round_degrees(angles.base).clamp(-J1_PAYLOAD_LIMIT, J1_PAYLOAD_LIMIT);
        format!(
            "{};{},{},{},{}{}",
            pose.label(),
            format_degrees(base),
            format_degrees(round_degrees(angles.shoulder)),
            format_degrees(round_degrees(angles.elbow)),
            format_degrees(round_degrees(angles.wrist)),
            self.suffix
        )
    }
}

impl Default for PayloadFormat {
    fn default() -> Self {
        Self::new(LEGACY_PAYLOAD_SUFFIX)
    }
}

/// Rounds to the nearest whole degree, ties to even.
pub fn round_degrees(value: f64) -> f64 {
    value.round_ties_even()
}

fn format_degrees(value: f64) -> String {
    if value.is_finite() {
        // `as` saturates and maps -0.0 to 0
        (value as i64).to_string()
    } else {
        "0".to_string()
    }
}
