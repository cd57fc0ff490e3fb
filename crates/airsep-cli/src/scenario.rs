//! Scenario files and command payloads for the pilot simulator.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use airsep_core::{Aircraft, AircraftState, Vector3};

/// Initial condition for one simulated aircraft. A scenario file is a
/// JSON array of these.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioAircraft {
    /// Callsign; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub x_km: f64,
    #[serde(default)]
    pub y_km: f64,
    #[serde(default = "default_altitude")]
    pub altitude_km: f64,
    #[serde(default)]
    pub yaw_deg: f64,
    #[serde(default = "default_speed")]
    pub speed_kmh: f64,
}

fn default_altitude() -> f64 {
    5.0
}

fn default_speed() -> f64 {
    700.0
}

impl ScenarioAircraft {
    pub fn apply(&self, state: &mut AircraftState) {
        state.set_position(Vector3::new(self.x_km, self.y_km, self.altitude_km));
        state.set_yaw(self.yaw_deg);
        state.set_speed(self.speed_kmh);
    }
}

pub fn load(path: &Path) -> anyhow::Result<Vec<ScenarioAircraft>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario file {}", path.display()))?;
    let fleet = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse scenario file {}", path.display()))?;
    Ok(fleet)
}

/// Apply one coordinator-forwarded command payload. Supported verbs:
/// `spd:<kmh>`, `hdg:<deg>`, `alt:<km>`. Returns false for anything
/// else; unknown payloads are ignored, never fatal.
pub fn apply_command(state: &mut AircraftState, payload: &str) -> bool {
    let Some((verb, value)) = payload.split_once(':') else {
        return false;
    };
    let Ok(value) = value.trim().parse::<f64>() else {
        return false;
    };
    match verb.trim() {
        "spd" => state.set_speed(value),
        "hdg" => state.set_yaw(value),
        "alt" => state.set_altitude(value),
        _ => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_steer_the_aircraft() {
        let mut ap = AircraftState::new("AP-01");

        assert!(apply_command(&mut ap, "spd:500"));
        assert_eq!(ap.speed(), 500.0);
        assert!(apply_command(&mut ap, "hdg: 270"));
        assert_eq!(ap.yaw(), 270.0);
        assert!(apply_command(&mut ap, "alt:7.5"));
        assert_eq!(ap.altitude(), 7.5);

        // Clamped like any other mutation.
        assert!(apply_command(&mut ap, "spd:99999"));
        assert!(ap.speed() <= airsep_core::aircraft::MAX_SPEED_KMH);
    }

    #[test]
    fn junk_payloads_are_rejected() {
        let mut ap = AircraftState::new("AP-01");
        for payload in ["", "spd", "spd:", "spd:fast", "climb:1", "spd:1:2"] {
            assert!(!apply_command(&mut ap, payload), "accepted {payload:?}");
        }
        assert_eq!(ap.speed(), 0.0);
    }

    #[test]
    fn scenario_defaults_fill_in() {
        let fleet: Vec<ScenarioAircraft> =
            serde_json::from_str(r#"[{"id": "AP-05", "x_km": 3.0, "yaw_deg": 90.0}]"#).unwrap();
        assert_eq!(fleet.len(), 1);

        let mut ap = AircraftState::new("AP-05");
        fleet[0].apply(&mut ap);
        assert_eq!(ap.position().x, 3.0);
        assert_eq!(ap.altitude(), 5.0);
        assert_eq!(ap.speed(), 700.0);
    }
}
