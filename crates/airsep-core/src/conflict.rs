//! Pairwise collision assessment over a registry snapshot.
//!
//! Classifies every unordered aircraft pair into a threat level from the
//! current separation and the predicted separation at nearest approach
//! along both motion rays.

use chrono::{DateTime, Utc};

use crate::aircraft::{Aircraft, ThreatLevel};
use crate::math::Vector3;
use crate::rules::SeparationRules;

/// One flagged pair. Ids are stored in sorted order so (A,B) and (B,A)
/// name the same entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PairFlag {
    pub a: String,
    pub b: String,
    pub level: ThreatLevel,
}

/// Hard separation violation: current slant distance under the fatal
/// threshold. Reported alongside, and independent of, WARN/PANIC flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub a: String,
    pub b: String,
    pub distance_km: f64,
    pub at: DateTime<Utc>,
}

/// Result of one assessment sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub flagged: Vec<PairFlag>,
    pub violations: Vec<Violation>,
}

impl SweepReport {
    /// Worst flag involving the given aircraft in this sweep.
    pub fn level_for(&self, id: &str) -> ThreatLevel {
        self.flagged
            .iter()
            .filter(|pair| pair.a == id || pair.b == id)
            .map(|pair| pair.level)
            .max()
            .unwrap_or(ThreatLevel::None)
    }
}

/// Collision-risk engine. Stateless between sweeps; thresholds come from
/// [`SeparationRules`].
#[derive(Debug, Clone, Default)]
pub struct CollisionEngine {
    rules: SeparationRules,
}

impl CollisionEngine {
    pub fn new(rules: SeparationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &SeparationRules {
        &self.rules
    }

    /// Assess every unordered pair in the snapshot exactly once.
    pub fn assess<A: Aircraft>(&self, snapshot: &[&A]) -> SweepReport {
        let mut report = SweepReport::default();

        for i in 0..snapshot.len() {
            for j in (i + 1)..snapshot.len() {
                let target = snapshot[i];
                let other = snapshot[j];

                let (level, fatal) = self.classify(target, other);
                let (a, b) = ordered_ids(target.id(), other.id());

                if level != ThreatLevel::None {
                    report.flagged.push(PairFlag { a: a.clone(), b: b.clone(), level });
                }
                if let Some(distance_km) = fatal {
                    report.violations.push(Violation { a, b, distance_km, at: Utc::now() });
                }
            }
        }

        report
    }

    /// Classify one pair. Returns the threat level and, when the current
    /// slant separation is under the fatal threshold, that distance.
    fn classify<A: Aircraft>(&self, target: &A, other: &A) -> (ThreatLevel, Option<f64>) {
        let rules = &self.rules;

        let pos1 = target.position();
        let pos2 = other.position();
        let planar = pos1.xy_distance(&pos2);
        let vertical = (target.altitude() - other.altitude()).abs();
        let slant = pos1.distance(&pos2);

        let mut level = ThreatLevel::None;
        if planar <= rules.disturbance_horizontal_km && vertical <= rules.disturbance_vertical_km {
            level = ThreatLevel::Warn;
        }

        // Predicted nearest approach, valid only when both aircraft are
        // moving toward it. Degenerate geometry means no prediction.
        if let Some((near1, near2)) = approach_points(target, other) {
            let path_planar = near1.xy_distance(&near2);
            let path_vertical = near1.z_distance(&near2);

            if level == ThreatLevel::Warn {
                if path_planar <= rules.panic_horizontal_km
                    && path_vertical <= rules.panic_vertical_km
                {
                    level = ThreatLevel::Panic;
                }
            } else if planar <= rules.notice_horizontal_km && vertical <= rules.notice_vertical_km {
                let same_level = vertical <= rules.same_level_vertical_km;
                if same_level {
                    if path_planar < rules.disturbance_horizontal_km {
                        level = ThreatLevel::Warn;
                    }
                } else if path_vertical < rules.disturbance_vertical_km {
                    level = ThreatLevel::Warn;
                }
            }
        }

        let fatal = (slant < rules.fatal_km).then_some(slant);
        (level, fatal)
    }
}

/// Nearest-approach point of each motion ray to the other, provided both
/// aircraft are closing on those points (positive dot product between each
/// displacement and its own direction).
fn approach_points<A: Aircraft>(target: &A, other: &A) -> Option<(Vector3, Vector3)> {
    let ray1 = target.ray();
    let ray2 = other.ray();

    let near1 = ray1.nearest_point_to(&ray2)?;
    let near2 = ray2.nearest_point_to(&ray1)?;

    let closing1 = (near1 - ray1.origin()).dot(&ray1.direction()) > 0.0;
    let closing2 = (near2 - ray2.origin()).dot(&ray2.direction()) > 0.0;
    (closing1 && closing2).then_some((near1, near2))
}

fn ordered_ids(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
