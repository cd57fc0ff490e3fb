//! 3D position/direction value type.

use std::ops::{Add, Mul, Neg, Sub};

/// A point or direction in 3D space. X/Y span the map plane, Z is altitude.
/// Distances are kilometers throughout.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };

    /// Canonical forward direction an aircraft points at before any rotation.
    pub const FORWARD: Vector3 = Vector3 { x: 1.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit-length copy. The zero vector normalizes to itself.
    pub fn normalized(&self) -> Vector3 {
        let len = self.length();
        if len == 0.0 {
            return *self;
        }
        Vector3::new(self.x / len, self.y / len, self.z / len)
    }

    /// Straight-line (slant) distance.
    pub fn distance(&self, other: &Vector3) -> f64 {
        (*other - *self).length()
    }

    /// Planar distance, ignoring altitude.
    pub fn xy_distance(&self, other: &Vector3) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Vertical distance, absolute.
    pub fn z_distance(&self, other: &Vector3) -> f64 {
        (other.z - self.z).abs()
    }

    /// Copy with altitude zeroed out.
    pub fn planar(&self) -> Vector3 {
        Vector3::new(self.x, self.y, 0.0)
    }
}

impl Add for Vector3 {
    type Output = Vector3;

    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vector3 {
    type Output = Vector3;

    fn mul(self, scale: f64) -> Vector3 {
        Vector3::new(self.x * scale, self.y * scale, self.z * scale)
    }
}

impl Neg for Vector3 {
    type Output = Vector3;

    fn neg(self) -> Vector3 {
        Vector3::new(-self.x, -self.y, -self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_is_unit_length() {
        let v = Vector3::new(3.0, 4.0, 12.0);
        assert!((v.normalized().length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_vector_normalizes_to_itself() {
        assert_eq!(Vector3::ZERO.normalized(), Vector3::ZERO);
    }

    #[test]
    fn planar_and_vertical_distances_split_the_slant() {
        let a = Vector3::new(0.0, 0.0, 1.0);
        let b = Vector3::new(3.0, 4.0, 3.0);
        assert!((a.xy_distance(&b) - 5.0).abs() < 1e-12);
        assert!((a.z_distance(&b) - 2.0).abs() < 1e-12);
        assert!((a.distance(&b) - 29.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn operators_are_componentwise() {
        let a = Vector3::new(1.0, -2.0, 3.0);
        let b = Vector3::new(0.5, 0.5, 0.5);
        assert_eq!(a + b, Vector3::new(1.5, -1.5, 3.5));
        assert_eq!(a - b, Vector3::new(0.5, -2.5, 2.5));
        assert_eq!(a * 2.0, Vector3::new(2.0, -4.0, 6.0));
        assert_eq!(-a, Vector3::new(-1.0, 2.0, -3.0));
    }
}
