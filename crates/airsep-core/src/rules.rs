//! Separation thresholds for the collision engine.

use serde::{Deserialize, Serialize};

/// Distance bands used to classify aircraft pairs, in kilometers.
///
/// The bands nest: panic inside disturbance inside notice. `fatal_km` is a
/// slant distance; the rest are split into horizontal and vertical limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeparationRules {
    /// Outer pre-check band, horizontal
    pub notice_horizontal_km: f64,
    /// Outer pre-check band, vertical
    pub notice_vertical_km: f64,
    /// WARN band, horizontal
    pub disturbance_horizontal_km: f64,
    /// WARN band, vertical
    pub disturbance_vertical_km: f64,
    /// PANIC band, horizontal
    pub panic_horizontal_km: f64,
    /// PANIC band, vertical
    pub panic_vertical_km: f64,
    /// Hard-violation slant distance
    pub fatal_km: f64,
    /// Two aircraft closer than this vertically share a flight level
    pub same_level_vertical_km: f64,
}

impl Default for SeparationRules {
    fn default() -> Self {
        Self {
            notice_horizontal_km: 15.0,
            notice_vertical_km: 0.4572,      // 1500 ft
            disturbance_horizontal_km: 9.0,
            disturbance_vertical_km: 0.3048, // 1000 ft
            panic_horizontal_km: 1.0,
            panic_vertical_km: 0.15,
            fatal_km: 0.05,
            same_level_vertical_km: 0.1524,  // 500 ft
        }
    }
}
