use crate::types::{HandConfig, HandFrame, TargetPose};
use nalgebra::Vector3;
use tracing::debug;

/// Turns tracked palm positions into arm targets.
///
/// x and z are taken relative to a recentering offset; y stays absolute so the
/// arm height follows the real hand height above the tracker.
#[derive(Debug, Clone)]
pub struct HandMapper {
    config: HandConfig,
    offset: Vector3<f64>,
    last_hand: Option<Vector3<f64>>,
}

impl HandMapper {
    pub fn new(config: HandConfig) -> Self {
        Self {
            config,
            offset: Vector3::zeros(),
            last_hand: None,
        }
    }

    /// Uses the most recently seen hand position as the new zero.
    /// Returns false when no hand has been seen yet.
    pub fn recenter(&mut self) -> bool {
        match self.last_hand {
            Some(hand) => {
                self.offset = hand;
                debug!(
                    "Recentered hand offset to ({:.3}, {:.3}, {:.3})",
                    hand.x, hand.y, hand.z
                );
                true
            }
            None => false,
        }
    }

    /// Scaled hand position before the height clamp.
    pub fn hand_position(&self, hand: &Vector3<f64>) -> Vector3<f64> {
        let gain = self.config.xy_sensitivity * self.config.input_multiplier;
        Vector3::new(
            (hand.x - self.offset.x) * gain,
            hand.y * self.config.z_sensitivity * self.config.input_multiplier,
            (hand.z - self.offset.z) * gain,
        )
    }

    /// Maps one frame to a target, or `None` when neither hand is tracked.
    pub fn map(&mut self, frame: &HandFrame) -> Option<TargetPose> {
        let hand = frame.active_hand()?.to_vector();
        self.last_hand = Some(hand);

        let mut position = self.hand_position(&hand);
        position.y = position.y.clamp(self.config.height_min, self.config.height_max);
        Some(TargetPose::from_vector(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HandSample;

    fn frame(right: Option<[f64; 3]>, left: Option<[f64; 3]>) -> HandFrame {
        HandFrame {
            right: right.map(|[x, y, z]| HandSample::new(x, y, z)),
            left: left.map(|[x, y, z]| HandSample::new(x, y, z)),
        }
    }

    #[test]
    fn test_no_hand_no_target() {
        let mut mapper = HandMapper::new(HandConfig::default());
        assert!(mapper.map(&frame(None, None)).is_none());
        assert!(!mapper.recenter());
    }

    #[test]
    fn test_height_clamped_into_band() {
        let mut mapper = HandMapper::new(HandConfig::default());

        let low = mapper.map(&frame(Some([0.1, 0.1, 0.2]), None)).unwrap();
        assert_eq!(low.position.y, 0.35);

        let high = mapper.map(&frame(Some([0.1, 0.9, 0.2]), None)).unwrap();
        assert_eq!(high.position.y, 0.5);

        let mid = mapper.map(&frame(Some([0.1, 0.42, 0.2]), None)).unwrap();
        assert!((mid.position.y - 0.42).abs() < 1e-12);
        assert!((mid.position.x - 0.1).abs() < 1e-12);
        assert!((mid.position.z - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_sensitivity_and_multiplier() {
        let config = HandConfig {
            input_multiplier: 2.0,
            xy_sensitivity: 1.5,
            z_sensitivity: 0.25,
            ..HandConfig::default()
        };
        let mapper = HandMapper::new(config);
        let scaled = mapper.hand_position(&Vector3::new(0.1, 0.8, -0.2));
        assert!((scaled.x - 0.3).abs() < 1e-12);
        assert!((scaled.y - 0.4).abs() < 1e-12);
        assert!((scaled.z + 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_recenter_zeroes_xz_only() {
        let mut mapper = HandMapper::new(HandConfig::default());
        mapper.map(&frame(Some([0.3, 0.45, -0.1]), None));
        assert!(mapper.recenter());

        let target = mapper.map(&frame(Some([0.3, 0.45, -0.1]), None)).unwrap();
        assert!(target.position.x.abs() < 1e-12);
        assert!(target.position.z.abs() < 1e-12);
        assert!((target.position.y - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_falls_back_to_left_hand() {
        let mut mapper = HandMapper::new(HandConfig::default());
        let target = mapper.map(&frame(None, Some([-0.2, 0.4, 0.1]))).unwrap();
        assert!((target.position.x + 0.2).abs() < 1e-12);
    }
}
