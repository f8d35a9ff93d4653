use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Gesture reported by the hand classifier.
///
/// The wire label of each variant is fixed; the arm controller matches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HandPose {
    #[default]
    None,
    Fist,
    OpenPalm,
    #[serde(rename = "OK")]
    Ok,
    Point,
}

impl HandPose {
    pub const ALL: [HandPose; 5] = [
        HandPose::None,
        HandPose::Fist,
        HandPose::OpenPalm,
        HandPose::Ok,
        HandPose::Point,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            HandPose::None => "None",
            HandPose::Fist => "Fist",
            HandPose::OpenPalm => "OpenPalm",
            HandPose::Ok => "OK",
            HandPose::Point => "Point",
        }
    }
}

impl fmt::Display for HandPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for HandPose {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        HandPose::ALL
            .iter()
            .copied()
            .find(|pose| pose.label() == trimmed)
            .ok_or_else(|| eyre::eyre!("Unknown hand pose label: {:?}", trimmed))
    }
}

/// Palm position of one tracked hand, in tracker coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandSample {
    pub position: [f64; 3],
}

impl HandSample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: [x, y, z],
        }
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.position[0], self.position[1], self.position[2])
    }
}

/// One tick of hand tracking output. Either hand may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HandFrame {
    #[serde(default)]
    pub right: Option<HandSample>,
    #[serde(default)]
    pub left: Option<HandSample>,
}

impl HandFrame {
    /// The hand that drives the arm: right if tracked, else left.
    pub fn active_hand(&self) -> Option<&HandSample> {
        self.right.as_ref().or(self.left.as_ref())
    }
}
