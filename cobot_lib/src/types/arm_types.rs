use eyre::Result;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Shoulder-to-elbow link length of the reference cobot.
pub const DEFAULT_A23: f64 = 136.0;
/// Elbow-to-wrist link length of the reference cobot.
pub const DEFAULT_A34: f64 = 99.0;

/// Joint angles reported to the arm controller, in degrees.
///
/// `shoulder` is the externally reported J2, already offset by -180 from the
/// solver's raw value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointAngles {
    pub base: f64,
    pub shoulder: f64,
    pub elbow: f64,
    pub wrist: f64,
}

impl JointAngles {
    pub fn new(base: f64, shoulder: f64, elbow: f64, wrist: f64) -> Self {
        Self {
            base,
            shoulder,
            elbow,
            wrist,
        }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.base, self.shoulder, self.elbow, self.wrist]
    }

    pub fn is_finite(&self) -> bool {
        self.as_array().iter().all(|a| a.is_finite())
    }
}

/// Link lengths of the planar part of the arm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmGeometry {
    a23: f64,
    a34: f64,
}

impl ArmGeometry {
    pub fn new(a23: f64, a34: f64) -> Result<Self> {
        for (name, value) in [("a23", a23), ("a34", a34)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(eyre::eyre!(
                    "Link length {} must be a positive number, got {}",
                    name,
                    value
                ));
            }
        }

        Ok(Self { a23, a34 })
    }

    pub fn a23(&self) -> f64 {
        self.a23
    }

    pub fn a34(&self) -> f64 {
        self.a34
    }

    /// Longest reach of the planar chain (fully extended).
    pub fn max_reach(&self) -> f64 {
        self.a23 + self.a34
    }

    /// Shortest reach of the planar chain (fully folded).
    pub fn min_reach(&self) -> f64 {
        (self.a23 - self.a34).abs()
    }
}

impl Default for ArmGeometry {
    fn default() -> Self {
        Self {
            a23: DEFAULT_A23,
            a34: DEFAULT_A34,
        }
    }
}

/// End-effector target in world coordinates (y is up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetPose {
    pub position: Vector3<f64>,
}

impl TargetPose {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Vector3::new(x, y, z),
        }
    }

    pub fn from_vector(position: Vector3<f64>) -> Self {
        Self { position }
    }
}
