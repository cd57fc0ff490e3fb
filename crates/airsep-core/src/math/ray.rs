//! Nearest-approach geometry between two motion rays.

use super::Vector3;

/// Parallel-direction guard for the nearest-approach solution. With
/// normalized directions the denominator is sin² of the angle between them.
const PARALLEL_EPSILON: f64 = 1e-12;

/// A parametrized line: origin plus a direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    origin: Vector3,
    direction: Vector3,
}

impl Ray {
    pub fn new(origin: Vector3, direction: Vector3) -> Self {
        Self { origin, direction }
    }

    pub fn origin(&self) -> Vector3 {
        self.origin
    }

    pub fn direction(&self) -> Vector3 {
        self.direction
    }

    /// The point on this ray nearest to `other`.
    ///
    /// `None` when the solution is undefined: either direction has zero
    /// length, or the rays are parallel/collinear.
    pub fn nearest_point_to(&self, other: &Ray) -> Option<Vector3> {
        let d1 = self.direction;
        let d2 = other.direction;
        let w = other.origin - self.origin;

        let p = d1.dot(&d2);
        let q = d1.dot(&w);
        let r = d2.dot(&w);
        let s = d1.dot(&d1);
        let t = d2.dot(&d2);

        if s == 0.0 || t == 0.0 {
            return None;
        }

        let denom = s * t - p * p;
        if denom.abs() < PARALLEL_EPSILON {
            return None;
        }

        let along = (q * t - p * r) / denom;
        Some(self.origin + d1 * along)
    }

    /// Shortest distance between two rays, taken between their mutual
    /// nearest points. `None` on degenerate geometry.
    pub fn shortest_distance(a: &Ray, b: &Ray) -> Option<f64> {
        let on_a = a.nearest_point_to(b)?;
        let on_b = b.nearest_point_to(a)?;
        Some(on_a.distance(&on_b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_rays_meet_at_the_intersection() {
        let a = Ray::new(Vector3::ZERO, Vector3::new(1.0, 0.0, 0.0));
        let b = Ray::new(Vector3::new(2.0, -1.0, 0.0), Vector3::new(0.0, 1.0, 0.0));

        let on_a = a.nearest_point_to(&b).unwrap();
        let on_b = b.nearest_point_to(&a).unwrap();
        assert!(on_a.distance(&Vector3::new(2.0, 0.0, 0.0)) < 1e-9);
        assert!(on_b.distance(&Vector3::new(2.0, 0.0, 0.0)) < 1e-9);
        assert!(Ray::shortest_distance(&a, &b).unwrap() < 1e-9);
    }

    #[test]
    fn skew_rays_report_their_gap() {
        let a = Ray::new(Vector3::ZERO, Vector3::new(1.0, 0.0, 0.0));
        let b = Ray::new(Vector3::new(0.0, 3.0, 4.0), Vector3::new(0.0, 1.0, 0.0));

        let dist = Ray::shortest_distance(&a, &b).unwrap();
        assert!((dist - 4.0).abs() < 1e-9);
    }

    #[test]
    fn parallel_rays_have_no_nearest_point() {
        let a = Ray::new(Vector3::ZERO, Vector3::new(1.0, 0.0, 0.0));
        let b = Ray::new(Vector3::new(0.0, 5.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(a.nearest_point_to(&b), None);
        assert_eq!(Ray::shortest_distance(&a, &b), None);
    }

    #[test]
    fn head_on_collinear_rays_are_degenerate() {
        let a = Ray::new(Vector3::ZERO, Vector3::new(1.0, 0.0, 0.0));
        let b = Ray::new(Vector3::new(5.0, 0.0, 0.0), Vector3::new(-1.0, 0.0, 0.0));
        assert_eq!(a.nearest_point_to(&b), None);
    }

    #[test]
    fn zero_length_direction_is_degenerate() {
        let a = Ray::new(Vector3::ZERO, Vector3::ZERO);
        let b = Ray::new(Vector3::new(1.0, 1.0, 1.0), Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(a.nearest_point_to(&b), None);
        assert_eq!(b.nearest_point_to(&a), None);
    }
}
