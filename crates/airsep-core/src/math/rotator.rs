//! Euler-angle rotation applied to direction vectors.

use super::Vector3;

/// Roll/pitch/yaw in degrees, composed as an intrinsic X-Y-Z rotation.
///
/// Vectors are treated as row vectors, so the composed matrix is applied
/// as `v * Rx * Ry * Rz`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rotator {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Rotator {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Rotate a vector by this rotator.
    pub fn rotate(&self, v: Vector3) -> Vector3 {
        let (sx, cx) = self.roll.to_radians().sin_cos();
        let (sy, cy) = self.pitch.to_radians().sin_cos();
        let (sz, cz) = self.yaw.to_radians().sin_cos();

        // Rows of Rx*Ry*Rz for a row-vector transform.
        let r0 = Vector3::new(cy * cz, -cy * sz, sy);
        let r1 = Vector3::new(cx * sz + cz * sx * sy, cx * cz - sx * sy * sz, -cy * sx);
        let r2 = Vector3::new(sx * sz - cx * cz * sy, cz * sx + cx * sy * sz, cx * cy);

        r0 * v.x + r1 * v.y + r2 * v.z
    }
}

/// Wrap an angle in degrees into `[0, 360)`.
pub fn wrap_degrees(degrees: f64) -> f64 {
    let mut angle = degrees % 360.0;
    if angle < 0.0 {
        angle += 360.0;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vector3, b: Vector3) -> bool {
        a.distance(&b) < 1e-9
    }

    #[test]
    fn identity_rotation_keeps_forward() {
        let dir = Rotator::default().rotate(Vector3::FORWARD);
        assert!(close(dir, Vector3::FORWARD));
    }

    #[test]
    fn yaw_rotates_in_the_map_plane() {
        let dir = Rotator::new(0.0, 0.0, 90.0).rotate(Vector3::FORWARD);
        assert!(close(dir, Vector3::new(0.0, -1.0, 0.0)));
    }

    #[test]
    fn positive_pitch_climbs() {
        let dir = Rotator::new(0.0, 30.0, 0.0).rotate(Vector3::FORWARD);
        assert!(dir.z > 0.0);
        assert!((dir.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn roll_alone_leaves_forward_untouched() {
        // Rolling about the longitudinal axis does not move the nose.
        let dir = Rotator::new(45.0, 0.0, 0.0).rotate(Vector3::FORWARD);
        assert!(close(dir, Vector3::FORWARD));
    }

    #[test]
    fn wrap_degrees_lands_in_range() {
        assert_eq!(wrap_degrees(0.0), 0.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_eq!(wrap_degrees(725.0), 5.0);
        assert_eq!(wrap_degrees(-90.0), 270.0);
    }
}
