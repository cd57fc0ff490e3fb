//! Flight math: 3D vectors, Euler-angle rotation, and ray geometry.

mod ray;
mod rotator;
mod vector;

pub use ray::Ray;
pub use rotator::{wrap_degrees, Rotator};
pub use vector::Vector3;
