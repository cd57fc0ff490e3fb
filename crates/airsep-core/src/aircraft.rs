//! Aircraft state: identity, attitude, derived direction, and threat flags.

use crate::math::{wrap_degrees, Ray, Rotator, Vector3};

/// Attitude and performance limits enforced by the setters.
pub const MAX_PITCH_DEG: f64 = 20.0;
pub const MAX_ROLL_DEG: f64 = 80.0;
pub const MAX_SPEED_KMH: f64 = 926.0;
pub const MAX_ALT_KM: f64 = 10.668;

/// Collision-detection flag bits carried on the wire.
pub const FLAG_WARN: u32 = 0x01;
pub const FLAG_PANIC: u32 = 0x02;
/// Display flag bit: the aircraft is highlighted on an operator's screen.
pub const FLAG_HIGHLIGHTED: u32 = 0x04;

const THREAT_MASK: u32 = FLAG_WARN | FLAG_PANIC;

/// Map scale and icon size used to derive the hit-test rectangle.
const MAP_SCALE: f64 = 1.6;
const ICON_SIZE: f64 = 25.0;

/// Threat classification for an aircraft. The levels are mutually
/// exclusive; ordering lets callers keep the worst of several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ThreatLevel {
    #[default]
    None,
    Warn,
    Panic,
}

impl ThreatLevel {
    pub fn to_flag(self) -> u32 {
        match self {
            ThreatLevel::None => 0,
            ThreatLevel::Warn => FLAG_WARN,
            ThreatLevel::Panic => FLAG_PANIC,
        }
    }

    pub fn from_flag(flags: u32) -> ThreatLevel {
        // PANIC wins if a peer ever sets both bits.
        if flags & FLAG_PANIC != 0 {
            ThreatLevel::Panic
        } else if flags & FLAG_WARN != 0 {
            ThreatLevel::Warn
        } else {
            ThreatLevel::None
        }
    }
}

/// Axis-aligned rectangle in map-scaled screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// Capability surface over an aircraft representation: accessors, clamped
/// mutators, hit-testing. One concrete implementation: [`AircraftState`].
pub trait Aircraft {
    fn id(&self) -> &str;
    fn position(&self) -> Vector3;
    /// Position projected onto the map plane.
    fn planar_position(&self) -> Vector3;
    /// Unit vector the aircraft is moving along, derived from attitude.
    fn direction(&self) -> Vector3;
    /// Motion ray: current position plus derived direction.
    fn ray(&self) -> Ray;
    fn altitude(&self) -> f64;
    fn speed(&self) -> f64;
    fn roll(&self) -> f64;
    fn pitch(&self) -> f64;
    fn yaw(&self) -> f64;
    fn threat(&self) -> ThreatLevel;
    fn highlighted(&self) -> bool;
    /// Wire representation of the threat and display bits.
    fn flags(&self) -> u32;

    fn set_position(&mut self, position: Vector3);
    fn set_altitude(&mut self, altitude: f64);
    fn set_speed(&mut self, speed: f64);
    fn set_roll(&mut self, roll: f64);
    fn set_pitch(&mut self, pitch: f64);
    fn set_yaw(&mut self, yaw: f64);
    fn set_threat(&mut self, threat: ThreatLevel);
    fn set_highlighted(&mut self, highlighted: bool);
    fn apply_flags(&mut self, flags: u32);

    fn bounds(&self) -> Bounds;
    fn hit(&self, x: f64, y: f64) -> bool;
}

/// Concrete aircraft record. All mutation goes through the trait setters,
/// which clamp angles/speed/altitude and keep the derived direction and
/// hit-test bounds current.
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftState {
    id: String,
    position: Vector3,
    direction: Vector3,
    roll: f64,
    pitch: f64,
    yaw: f64,
    speed: f64,
    threat: ThreatLevel,
    highlighted: bool,
    bounds: Bounds,
}

impl AircraftState {
    pub fn new(id: impl Into<String>) -> Self {
        let mut state = Self {
            id: id.into(),
            position: Vector3::ZERO,
            direction: Vector3::FORWARD,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            speed: 0.0,
            threat: ThreatLevel::None,
            highlighted: false,
            bounds: Bounds { x: 0.0, y: 0.0, width: ICON_SIZE, height: ICON_SIZE },
        };
        state.refresh_direction();
        state.refresh_bounds();
        state
    }

    /// Overwrite the mutable telemetry fields in place from a freshly
    /// decoded record, preserving this entry's identity. Threat and display
    /// flags are owned by the coordinator and left untouched.
    pub fn apply_telemetry(&mut self, update: &AircraftState) {
        self.set_position(update.position());
        self.set_roll(update.roll());
        self.set_pitch(update.pitch());
        self.set_yaw(update.yaw());
        self.set_speed(update.speed());
    }

    /// Integrate position along the current direction for `dt_secs`
    /// seconds of flight at the current speed (km/h).
    pub fn advance(&mut self, dt_secs: f64) {
        let step = self.direction * ((self.speed / 3600.0) * dt_secs);
        self.set_position(self.position + step);
    }

    fn refresh_direction(&mut self) {
        self.direction = Rotator::new(self.roll, self.pitch, self.yaw)
            .rotate(Vector3::FORWARD)
            .normalized();
    }

    fn refresh_bounds(&mut self) {
        self.bounds.x = self.position.x * MAP_SCALE - self.bounds.width / 2.0;
        self.bounds.y = self.position.y * MAP_SCALE - self.bounds.height / 2.0;
    }
}

impl Aircraft for AircraftState {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> Vector3 {
        self.position
    }

    fn planar_position(&self) -> Vector3 {
        self.position.planar()
    }

    fn direction(&self) -> Vector3 {
        self.direction
    }

    fn ray(&self) -> Ray {
        Ray::new(self.position, self.direction)
    }

    fn altitude(&self) -> f64 {
        self.position.z
    }

    fn speed(&self) -> f64 {
        self.speed
    }

    fn roll(&self) -> f64 {
        self.roll
    }

    fn pitch(&self) -> f64 {
        self.pitch
    }

    fn yaw(&self) -> f64 {
        self.yaw
    }

    fn threat(&self) -> ThreatLevel {
        self.threat
    }

    fn highlighted(&self) -> bool {
        self.highlighted
    }

    fn flags(&self) -> u32 {
        self.threat.to_flag() | if self.highlighted { FLAG_HIGHLIGHTED } else { 0 }
    }

    fn set_position(&mut self, position: Vector3) {
        self.position.x = position.x;
        self.position.y = position.y;
        self.set_altitude(position.z);
        self.refresh_bounds();
    }

    fn set_altitude(&mut self, altitude: f64) {
        self.position.z = altitude.clamp(0.0, MAX_ALT_KM);
    }

    fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(0.0, MAX_SPEED_KMH);
    }

    fn set_roll(&mut self, roll: f64) {
        self.roll = roll.clamp(-MAX_ROLL_DEG, MAX_ROLL_DEG);
        self.refresh_direction();
    }

    fn set_pitch(&mut self, pitch: f64) {
        self.pitch = pitch.clamp(-MAX_PITCH_DEG, MAX_PITCH_DEG);
        self.refresh_direction();
    }

    fn set_yaw(&mut self, yaw: f64) {
        self.yaw = wrap_degrees(yaw);
        self.refresh_direction();
    }

    fn set_threat(&mut self, threat: ThreatLevel) {
        self.threat = threat;
    }

    fn set_highlighted(&mut self, highlighted: bool) {
        self.highlighted = highlighted;
    }

    fn apply_flags(&mut self, flags: u32) {
        self.threat = ThreatLevel::from_flag(flags & THREAT_MASK);
        self.highlighted = flags & FLAG_HIGHLIGHTED != 0;
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn hit(&self, x: f64, y: f64) -> bool {
        self.bounds.contains(x, y)
    }
}
