// Analytic inverse kinematics for the 4-joint cobot
//
// J1 rotates the whole arm about the vertical axis. J2, J3 and J4 are
// revolute joints in the vertical plane that J1 points at. The planar
// sub-problem is solved with the law of cosines on the triangle formed by
// the two links and the line from J2 to the target.

use crate::types::{ArmGeometry, JointAngles};
use nalgebra::Vector3;

/// Converts tracker units (normalized) into link-length units.
pub const INPUT_SCALE: f64 = 500.0;

/// Physical travel limit applied to base headings beyond 180 degrees.
pub const J1_TRAVEL_LIMIT: f64 = 165.0;

/// Offset between the solver's J2 and the angle the controller expects.
pub const J2_REPORT_OFFSET: f64 = 180.0;

/// Intermediate quantities of the planar solve, in degrees and scaled units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarSolution {
    /// Distance from J2 to the target.
    pub reach: f64,
    /// Polar angle of the target above the horizontal.
    pub alpha_h: f64,
    /// `90 - alpha_h`, shared by J2 and J4.
    pub delta: f64,
    /// Angle at J2 between the first link and the target line.
    pub a: f64,
    /// Angle at the elbow between the two links.
    pub b: f64,
    /// Remaining triangle angle at the wrist.
    pub c: f64,
    /// acos argument for `a` before clamping.
    pub cos_a_raw: f64,
    /// acos argument for `b` before clamping.
    pub cos_b_raw: f64,
    pub j2: f64,
    pub j3: f64,
    pub j4: f64,
}

/// Full solver output for one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkSolution {
    /// Look-rotation yaw in [0, 360).
    pub heading: f64,
    /// Heading after the J1 travel clamp.
    pub joint1: f64,
    pub planar: PlanarSolution,
}

impl IkSolution {
    /// J2 as the solver produced it (before the report offset).
    pub fn j2_raw(&self) -> f64 {
        self.planar.j2
    }

    /// J2 as reported to the controller.
    pub fn j2(&self) -> f64 {
        self.planar.j2 - J2_REPORT_OFFSET
    }

    pub fn j3(&self) -> f64 {
        self.planar.j3
    }

    pub fn j4(&self) -> f64 {
        self.planar.j4
    }

    pub fn joint_angles(&self) -> JointAngles {
        JointAngles::new(self.joint1, self.j2(), self.j3(), self.j4())
    }
}

/// Closed-form IK for the base-yaw + 3-link planar arm.
///
/// Stateless: every call is a pure function of base, target and geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cobot3dIk {
    geometry: ArmGeometry,
}

impl Cobot3dIk {
    pub fn new(geometry: ArmGeometry) -> Self {
        Self { geometry }
    }

    pub fn solve(&self, base: &Vector3<f64>, target: &Vector3<f64>) -> IkSolution {
        let heading = joint1_heading(base, target);

        let offset = target - base;
        let horizontal = Vector3::new(offset.x, 0.0, offset.z).norm();
        let vertical = offset.y;

        let planar = self.solve_planar(horizontal * INPUT_SCALE, vertical * INPUT_SCALE);

        IkSolution {
            heading,
            joint1: clamp_joint1(heading),
            planar,
        }
    }

    /// Solves J2..J4 for a target given directly in scaled plane
    /// coordinates (`hx` horizontal, `hz` vertical).
    pub fn solve_planar(&self, hx: f64, hz: f64) -> PlanarSolution {
        let a23 = self.geometry.a23();
        let a34 = self.geometry.a34();

        let reach = (hx * hx + hz * hz).sqrt();
        let alpha_h = hz.atan2(hx).to_degrees();

        let cos_a_raw = (a34 * a34 - a23 * a23 - reach * reach) / (-2.0 * a23 * reach);
        let cos_b_raw = (reach * reach - a23 * a23 - a34 * a34) / (-2.0 * a23 * a34);

        // Out-of-range arguments mean the target is unreachable; clamping
        // yields the nearest reachable pose.
        let a = clamp_unit(cos_a_raw).acos().to_degrees();
        let b = clamp_unit(cos_b_raw).acos().to_degrees();
        let c = 180.0 - a - b;

        let delta = 90.0 - alpha_h;

        PlanarSolution {
            reach,
            alpha_h,
            delta,
            a,
            b,
            c,
            cos_a_raw,
            cos_b_raw,
            j2: a + delta,
            j3: b - 180.0,
            j4: 180.0 - delta + c,
        }
    }

    /// Wrist position in scaled plane coordinates for raw J2 and J3.
    ///
    /// Each link points straight up at zero rotation and tilts toward the
    /// target as its cumulative joint rotation grows.
    pub fn planar_forward(&self, j2_raw: f64, j3: f64) -> (f64, f64) {
        let upper = (90.0 - j2_raw).to_radians();
        let fore = (90.0 - j2_raw - j3).to_radians();

        let x = self.geometry.a23() * upper.cos() + self.geometry.a34() * fore.cos();
        let z = self.geometry.a23() * upper.sin() + self.geometry.a34() * fore.sin();
        (x, z)
    }
}

/// Yaw of the horizontal look vector from base to target, in [0, 360).
///
/// A target directly above or below the base has no heading and yields 0.
pub fn joint1_heading(base: &Vector3<f64>, target: &Vector3<f64>) -> f64 {
    let dx = target.x - base.x;
    let dz = target.z - base.z;
    if dx == 0.0 && dz == 0.0 {
        return 0.0;
    }

    let heading = dx.atan2(dz).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative angles
    if heading >= 360.0 {
        0.0
    } else {
        heading
    }
}

/// J1 as exposed to the controller.
pub fn joint1_angle(base: &Vector3<f64>, target: &Vector3<f64>) -> f64 {
    clamp_joint1(joint1_heading(base, target))
}

/// Headings in [0, 180] pass through; anything else is wrapped by -360 and
/// held inside the travel limit. The range is intentionally asymmetric.
pub fn clamp_joint1(heading: f64) -> f64 {
    if (0.0..=180.0).contains(&heading) {
        heading
    } else {
        (heading - 360.0).clamp(-J1_TRAVEL_LIMIT, J1_TRAVEL_LIMIT)
    }
}

fn clamp_unit(value: f64) -> f64 {
    // NaN only shows up for a zero-length reach with equal links
    if value.is_nan() {
        1.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-4;

    fn solver() -> Cobot3dIk {
        Cobot3dIk::new(ArmGeometry::default())
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_reachable_targets_round_trip() {
        let ik = solver();
        let geometry = ArmGeometry::default();

        for &(hx, hz) in &[
            (150.0, 50.0),
            (100.0, -80.0),
            (40.0, 10.0),
            (0.0, 200.0),
            (230.0, 0.0),
            (-60.0, 120.0),
        ] {
            let sol = ik.solve_planar(hx, hz);
            assert!(sol.reach >= geometry.min_reach() && sol.reach <= geometry.max_reach());
            assert!((-1.0..=1.0).contains(&sol.cos_a_raw));
            assert!((-1.0..=1.0).contains(&sol.cos_b_raw));

            // Law of cosines on the elbow angle gives the reach back
            let b = (sol.j3 + 180.0).to_radians();
            let reach = (geometry.a23().powi(2) + geometry.a34().powi(2)
                - 2.0 * geometry.a23() * geometry.a34() * b.cos())
            .sqrt();
            assert_close(reach, sol.reach);

            // Forward chain lands on the target
            let (x, z) = ik.planar_forward(sol.j2, sol.j3);
            assert_close(x, hx);
            assert_close(z, hz);

            assert_close(sol.a + sol.b + sol.c, 180.0);
        }
    }

    #[test]
    fn test_wrist_always_points_down() {
        let ik = solver();
        for &(hx, hz) in &[(150.0, 50.0), (120.0, -30.0), (500.0, 500.0), (5.0, 0.0)] {
            let sol = ik.solve_planar(hx, hz);
            assert_close(sol.j2 + sol.j3 + sol.j4, 180.0);
        }
    }

    #[test]
    fn test_shared_delta() {
        let sol = solver().solve_planar(150.0, 50.0);
        assert_close(sol.delta, 90.0 - sol.alpha_h);
        assert_close(sol.j2, sol.a + sol.delta);
        assert_close(sol.j4, 180.0 - sol.delta + sol.c);
    }

    #[test]
    fn test_fully_extended() {
        let ik = solver();
        let base = Vector3::zeros();
        // 0.47 world units scale to H = a23 + a34
        let target = Vector3::new(0.0, 0.0, 0.47);

        let sol = ik.solve(&base, &target);
        assert_close(sol.planar.reach, 235.0);
        assert_close(sol.planar.a, 0.0);
        assert_close(sol.planar.b, 180.0);
        assert_close(sol.planar.c, 0.0);
        assert_close(sol.heading, 0.0);
        assert_close(sol.j2_raw(), 90.0);
        assert_close(sol.j2(), -90.0);
        assert_close(sol.j3(), 0.0);
        assert_close(sol.j4(), 90.0);
        assert!(sol.joint_angles().is_finite());
    }

    #[test]
    fn test_exactly_at_max_reach_in_plane() {
        let sol = solver().solve_planar(235.0, 0.0);
        assert_close(sol.a, 0.0);
        assert_close(sol.b, 180.0);
        assert_close(sol.j3, 0.0);
    }

    #[test]
    fn test_unreachable_far_target_saturates() {
        let ik = solver();
        let far = ik.solve_planar(1000.0, 0.0);
        assert!(far.cos_a_raw > 1.0);
        assert!(far.cos_b_raw < -1.0);
        assert_close(far.a, 0.0);
        assert_close(far.b, 180.0);

        let extended = ik.solve_planar(235.0, 0.0);
        assert_close(far.j2, extended.j2);
        assert_close(far.j3, extended.j3);
        assert_close(far.j4, extended.j4);

        // Same thing through the scaled 3-D entry point: 2.0 * 500 = 1000
        let sol = ik.solve(&Vector3::zeros(), &Vector3::new(0.0, 0.0, 2.0));
        assert_close(sol.planar.reach, 1000.0);
        assert_close(sol.j3(), 0.0);
    }

    #[test]
    fn test_unreachable_near_target_is_finite() {
        let ik = solver();
        let near = ik.solve_planar(10.0, 0.0);
        assert!(near.cos_a_raw > 1.0 || near.cos_b_raw > 1.0);
        assert!(near.j2.is_finite() && near.j3.is_finite() && near.j4.is_finite());

        let origin = ik.solve_planar(0.0, 0.0);
        assert!(origin.j2.is_finite() && origin.j3.is_finite() && origin.j4.is_finite());

        let equal = Cobot3dIk::new(ArmGeometry::new(100.0, 100.0).unwrap()).solve_planar(0.0, 0.0);
        assert!(equal.a.is_finite() && equal.b.is_finite());
    }

    #[test]
    fn test_heading_quadrants() {
        let base = Vector3::zeros();
        assert_close(joint1_heading(&base, &Vector3::new(0.0, 0.3, 1.0)), 0.0);
        assert_close(joint1_heading(&base, &Vector3::new(1.0, 0.3, 0.0)), 90.0);
        assert_close(joint1_heading(&base, &Vector3::new(0.0, 0.3, -1.0)), 180.0);
        assert_close(joint1_heading(&base, &Vector3::new(-1.0, 0.3, 0.0)), 270.0);
        assert_close(joint1_heading(&base, &Vector3::new(0.0, 5.0, 0.0)), 0.0);
    }

    #[test]
    fn test_joint1_asymmetric_clamp() {
        // [0, 180] untouched
        assert_close(clamp_joint1(0.0), 0.0);
        assert_close(clamp_joint1(120.0), 120.0);
        assert_close(clamp_joint1(180.0), 180.0);
        // beyond 180 wraps negative, held at -165
        assert_close(clamp_joint1(270.0), -90.0);
        assert_close(clamp_joint1(190.0), -165.0);
        assert_close(clamp_joint1(359.0), -1.0);

        let base = Vector3::new(1.0, 0.0, 1.0);
        let left = Vector3::new(0.0, 0.4, 1.0);
        assert_close(joint1_angle(&base, &left), -90.0);
    }

    #[test]
    fn test_joint1_idempotent_and_bounded() {
        let base = Vector3::new(0.2, 0.1, -0.3);
        for i in 0..72 {
            let theta = (i as f64 * 5.0).to_radians();
            let target = Vector3::new(base.x + theta.sin(), 0.4, base.z + theta.cos());
            let first = joint1_angle(&base, &target);
            let second = joint1_angle(&base, &target);
            assert_eq!(first, second);
            assert!((-J1_TRAVEL_LIMIT..=180.0).contains(&first), "{first}");
        }
    }

    #[test]
    fn test_base_offset_is_subtracted() {
        let ik = solver();
        let base = Vector3::new(1.0, 0.2, -2.0);
        let target = base + Vector3::new(0.0, 0.1, 0.3);

        let sol = ik.solve(&base, &target);
        let direct = ik.solve_planar(0.3 * INPUT_SCALE, 0.1 * INPUT_SCALE);
        assert_close(sol.planar.j2, direct.j2);
        assert_close(sol.planar.j3, direct.j3);
        assert_close(sol.planar.j4, direct.j4);
    }
}
