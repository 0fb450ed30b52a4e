//! Device-space to host-space pose conversion.
//!
//! The host frame uses the Z, X, Y Euler order common to game engines
//! (`q = qY * qX * qZ`, angles in degrees). Each camera model carries a fixed
//! [`AxisCorrection`] profile that is applied to that Euler decomposition before
//! the quaternion is rebuilt. Positions are negated on all three axes.

use crate::types::{AxisCorrection, CameraModel, Pose};
use crate::{Result, XslamError};
use std::time::{Duration, Instant};

/// Default time an unchanged pose is still considered live tracking.
pub const DEFAULT_STALE_WINDOW: Duration = Duration::from_millis(500);

impl CameraModel {
    /// Axis-correction profile for this camera model.
    pub fn correction(self) -> AxisCorrection {
        match self {
            CameraModel::Unknown => AxisCorrection::empty(),
            CameraModel::Xr50 => AxisCorrection::NEGATE_X | AxisCorrection::NEGATE_Y,
            CameraModel::Ds80 => {
                AxisCorrection::NEGATE_X | AxisCorrection::NEGATE_Y | AxisCorrection::ADD_180_Z
            }
            CameraModel::Ds60 => {
                AxisCorrection::NEGATE_X | AxisCorrection::NEGATE_Y | AxisCorrection::ADD_180_Y
            }
            CameraModel::Xr50Mirrored => AxisCorrection::NEGATE_Z | AxisCorrection::ADD_180_Y,
        }
    }
}

impl AxisCorrection {
    /// Apply the corrections to Euler angles `[x, y, z]` in degrees.
    pub fn apply(self, euler: [f64; 3]) -> [f64; 3] {
        let [mut x, mut y, mut z] = euler;
        if self.contains(AxisCorrection::NEGATE_X) {
            x = -x;
        }
        if self.contains(AxisCorrection::NEGATE_Y) {
            y = -y;
        }
        if self.contains(AxisCorrection::NEGATE_Z) {
            z = -z;
        }
        if self.contains(AxisCorrection::ADD_180_X) {
            x += 180.0;
        }
        if self.contains(AxisCorrection::ADD_180_Y) {
            y += 180.0;
        }
        if self.contains(AxisCorrection::ADD_180_Z) {
            z += 180.0;
        }
        [x, y, z]
    }
}

/// Decompose quaternion `[qx, qy, qz, qw]` into Euler angles `[x, y, z]` in degrees.
///
/// From the rotation matrix of `qY * qX * qZ`:
///   x = asin(-R[1][2])          = asin(2(wx - yz))
///   y = atan2(R[0][2], R[2][2]) = atan2(2(xz + wy), 1 - 2(x² + y²))
///   z = atan2(R[1][0], R[1][1]) = atan2(2(xy + wz), 1 - 2(x² + z²))
/// At the ±90° pitch singularity z is pinned to 0 and y absorbs the roll.
pub fn quaternion_to_euler(q: [f64; 4]) -> [f64; 3] {
    let [x, y, z, w] = q;
    let sin_x = (2.0 * (w * x - y * z)).clamp(-1.0, 1.0);
    let ex = sin_x.asin();

    let (ey, ez) = if sin_x.abs() < 1.0 - 1e-9 {
        let ey = (2.0 * (x * z + w * y)).atan2(1.0 - 2.0 * (x * x + y * y));
        let ez = (2.0 * (x * y + w * z)).atan2(1.0 - 2.0 * (x * x + z * z));
        (ey, ez)
    } else {
        let ey = (-2.0 * (x * z - w * y)).atan2(1.0 - 2.0 * (y * y + z * z));
        (ey, 0.0)
    };

    [ex.to_degrees(), ey.to_degrees(), ez.to_degrees()]
}

/// Build a unit quaternion `[qx, qy, qz, qw]` from Euler angles in degrees.
pub fn euler_to_quaternion(euler: [f64; 3]) -> [f64; 4] {
    let half = |deg: f64| {
        let r = deg.to_radians() * 0.5;
        (r.sin(), r.cos())
    };
    let (sx, cx) = half(euler[0]);
    let (sy, cy) = half(euler[1]);
    let (sz, cz) = half(euler[2]);

    let qx = [sx, 0.0, 0.0, cx];
    let qy = [0.0, sy, 0.0, cy];
    let qz = [0.0, 0.0, sz, cz];
    normalize(multiply(multiply(qy, qx), qz))
}

/// Hamilton product `a * b` for `[x, y, z, w]` quaternions.
fn multiply(a: [f64; 4], b: [f64; 4]) -> [f64; 4] {
    let [ax, ay, az, aw] = a;
    let [bx, by, bz, bw] = b;
    [
        aw * bx + ax * bw + ay * bz - az * by,
        aw * by - ax * bz + ay * bw + az * bx,
        aw * bz + ax * by - ay * bx + az * bw,
        aw * bw - ax * bx - ay * by - az * bz,
    ]
}

fn normalize(q: [f64; 4]) -> [f64; 4] {
    let norm = q.iter().map(|c| c * c).sum::<f64>().sqrt();
    if norm <= f64::EPSILON {
        return [0.0, 0.0, 0.0, 1.0];
    }
    [q[0] / norm, q[1] / norm, q[2] / norm, q[3] / norm]
}

/// Convert a device-space pose into the host frame for `model`.
pub fn to_target_space(pose: &Pose, model: CameraModel) -> Pose {
    let correction = model.correction();
    let orientation = if correction.is_empty() {
        pose.orientation
    } else {
        euler_to_quaternion(correction.apply(quaternion_to_euler(pose.orientation)))
    };

    Pose {
        position: [-pose.position[0], -pose.position[1], -pose.position[2]],
        orientation,
        confidence: pose.confidence,
        timestamp_us: pose.timestamp_us,
    }
}

/// Detects a tracker that keeps repeating the same pose after losing tracking.
///
/// An identical pose is accepted until `window` has passed since the pose last
/// changed; after that it is reported as [`XslamError::PoseStale`].
#[derive(Debug)]
pub struct StalenessGate {
    window: Duration,
    last: Option<(Pose, Instant)>,
}

impl StalenessGate {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Forget the previously applied pose.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Record `pose` observed at monotonic time `now`.
    pub fn observe(&mut self, pose: Pose, now: Instant) -> Result<Pose> {
        if let Some((prev, changed_at)) = &self.last {
            if prev.same_placement(&pose) {
                if now.saturating_duration_since(*changed_at) < self.window {
                    return Ok(pose);
                }
                return Err(XslamError::PoseStale);
            }
        }
        self.last = Some((pose, now));
        Ok(pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f64], b: &[f64]) {
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-9, "{:?} != {:?}", a, b);
        }
    }

    /// Quaternions q and -q encode the same rotation.
    fn assert_same_rotation(a: [f64; 4], b: [f64; 4]) {
        let dot: f64 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert!((dot.abs() - 1.0).abs() < 1e-9, "{:?} vs {:?}", a, b);
    }

    fn pose(position: [f64; 3], orientation: [f64; 4]) -> Pose {
        Pose {
            position,
            orientation,
            confidence: 1.0,
            timestamp_us: 42,
        }
    }

    #[test]
    fn test_identity_euler() {
        assert_close(&quaternion_to_euler([0.0, 0.0, 0.0, 1.0]), &[0.0, 0.0, 0.0]);
        assert_close(&euler_to_quaternion([0.0, 0.0, 0.0]), &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_single_axis_rotations() {
        let s = std::f64::consts::FRAC_1_SQRT_2;
        assert_close(&euler_to_quaternion([90.0, 0.0, 0.0]), &[s, 0.0, 0.0, s]);
        assert_close(&euler_to_quaternion([0.0, 90.0, 0.0]), &[0.0, s, 0.0, s]);
        assert_close(&euler_to_quaternion([0.0, 0.0, 90.0]), &[0.0, 0.0, s, s]);
    }

    #[test]
    fn test_euler_round_trip() {
        for euler in [[10.0, 20.0, 30.0], [-45.0, 170.0, -120.0], [89.0, -5.0, 60.0]] {
            let q = euler_to_quaternion(euler);
            assert_close(&quaternion_to_euler(q), &euler);
        }
    }

    #[test]
    fn test_gimbal_lock_is_stable() {
        let q = euler_to_quaternion([90.0, 30.0, 0.0]);
        let e = quaternion_to_euler(q);
        assert!((e[0] - 90.0).abs() < 1e-4);
        assert_same_rotation(euler_to_quaternion(e), q);
    }

    #[test]
    fn test_negations_are_involutions() {
        let euler = [12.5, -33.0, 71.25];
        for flag in [
            AxisCorrection::NEGATE_X,
            AxisCorrection::NEGATE_Y,
            AxisCorrection::NEGATE_Z,
        ] {
            assert_eq!(flag.apply(flag.apply(euler)), euler);
        }

        let q = euler_to_quaternion(euler);
        let flip = AxisCorrection::NEGATE_X;
        let twice = euler_to_quaternion(flip.apply(quaternion_to_euler(euler_to_quaternion(
            flip.apply(quaternion_to_euler(q)),
        ))));
        assert_same_rotation(twice, q);
    }

    #[test]
    fn test_corrections_apply_in_order() {
        let c = AxisCorrection::NEGATE_Y | AxisCorrection::ADD_180_Y;
        // Negation first, then the half-turn.
        assert_eq!(c.apply([0.0, 30.0, 0.0]), [0.0, 150.0, 0.0]);
    }

    #[test]
    fn test_unknown_model_only_flips_position() {
        let q = euler_to_quaternion([5.0, 10.0, 15.0]);
        let out = to_target_space(&pose([1.0, -2.0, 3.0], q), CameraModel::Unknown);
        assert_eq!(out.position, [-1.0, 2.0, -3.0]);
        assert_eq!(out.orientation, q);
        assert_eq!(out.timestamp_us, 42);
    }

    #[test]
    fn test_xr50_profile_mirrors_pitch_and_yaw() {
        let q = euler_to_quaternion([20.0, 40.0, 60.0]);
        let out = to_target_space(&pose([0.0; 3], q), CameraModel::Xr50);
        assert_close(&quaternion_to_euler(out.orientation), &[-20.0, -40.0, 60.0]);
    }

    #[test]
    fn test_ds80_profile_adds_half_turn_roll() {
        let q = euler_to_quaternion([0.0, 0.0, 10.0]);
        let out = to_target_space(&pose([0.0; 3], q), CameraModel::Ds80);
        assert_same_rotation(out.orientation, euler_to_quaternion([0.0, 0.0, 190.0]));
    }

    #[test]
    fn test_staleness_window() {
        let mut gate = StalenessGate::new(Duration::from_millis(500));
        let t0 = Instant::now();
        let p = pose([1.0, 2.0, 3.0], [0.0, 0.0, 0.0, 1.0]);

        assert!(gate.observe(p, t0).is_ok());
        assert!(gate.observe(p, t0 + Duration::from_millis(200)).is_ok());
        assert!(gate.observe(p, t0 + Duration::from_millis(499)).is_ok());
        assert!(matches!(
            gate.observe(p, t0 + Duration::from_millis(500)),
            Err(XslamError::PoseStale)
        ));

        // A change revives tracking and restarts the window.
        let moved = pose([1.0, 2.0, 3.5], [0.0, 0.0, 0.0, 1.0]);
        let t1 = t0 + Duration::from_millis(600);
        assert!(gate.observe(moved, t1).is_ok());
        assert!(gate.observe(moved, t1 + Duration::from_millis(100)).is_ok());
    }

    #[test]
    fn test_staleness_ignores_timestamp_and_confidence() {
        let mut gate = StalenessGate::new(Duration::from_millis(10));
        let t0 = Instant::now();
        let p = pose([0.5; 3], [0.0, 0.0, 0.0, 1.0]);
        let mut later = p;
        later.timestamp_us += 1000;
        later.confidence = 0.2;

        gate.observe(p, t0).unwrap();
        assert!(gate.observe(later, t0 + Duration::from_millis(20)).is_err());

        gate.reset();
        assert!(gate.observe(later, t0 + Duration::from_millis(30)).is_ok());
    }
}
