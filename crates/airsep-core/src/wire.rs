//! Wire codec for the line-oriented coordinator protocol.
//!
//! Two record kinds share the stream:
//!
//! - `msg::<hint;b64(from);b64(to);b64(data)>` — the message envelope.
//!   Free-text fields are base64-escaped so payloads can contain the
//!   field separator.
//! - `pln::<id;b64(vec3::<x;y;z>);roll;pitch;yaw;speed;flags>` — one
//!   aircraft telemetry record. Broadcast payloads concatenate records
//!   with no separator; recovery is a cursor scan, not a split.
//!
//! Decoding rejects with [`WireError`] and never panics; callers log the
//! offending line and drop it.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;

use crate::aircraft::{Aircraft, AircraftState, ThreatLevel};
use crate::conflict::PairFlag;
use crate::math::Vector3;

/// Message hint bits. Independent; a message may carry several.
pub mod hint {
    pub const COMMAND: u32 = 1 << 0;
    pub const LOCK: u32 = 1 << 1;
    pub const RELEASE: u32 = 1 << 2;
    pub const ALERT: u32 = 1 << 3;
    pub const LOCK_ACK: u32 = 1 << 4;
    pub const RELEASE_ACK: u32 = 1 << 5;
    pub const AIRPLANE_LIST: u32 = 1 << 10;
    pub const COLLISION_LIST: u32 = 1 << 11;
}

const MESSAGE_PREFIX: &str = "msg::<";
const TELEMETRY_PREFIX: &str = "pln::<";
const VECTOR_PREFIX: &str = "vec3::<";
const RECORD_SUFFIX: char = '>';

/// Keepalive line sent by the transport. Protocol-invisible: receivers
/// drop it before dispatch.
pub const HEARTBEAT_LINE: &str = "\0";

/// True for the keepalive payload and for blank lines; neither reaches
/// protocol handling.
pub fn is_heartbeat(line: &str) -> bool {
    line.chars().all(|c| c.is_whitespace() || c == '\0')
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("malformed message envelope")]
    BadMessage,
    #[error("malformed telemetry record")]
    BadTelemetry,
    #[error("malformed vector payload")]
    BadVector,
    #[error("invalid base64 field")]
    BadBase64,
    #[error("decoded field is not valid utf-8")]
    BadUtf8,
}

/// The message envelope exchanged on the console channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub hint: u32,
    pub from: Option<String>,
    pub to: Option<String>,
    pub data: Option<String>,
}

impl Message {
    pub fn new(hint: u32) -> Self {
        Self { hint, ..Default::default() }
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn has(&self, bit: u32) -> bool {
        self.hint & bit != 0
    }

    pub fn lock(id: &str) -> Self {
        Message::new(hint::LOCK).with_to(id)
    }

    pub fn release(id: &str) -> Self {
        Message::new(hint::RELEASE).with_to(id)
    }

    pub fn command(id: &str, payload: &str) -> Self {
        Message::new(hint::COMMAND).with_to(id).with_data(payload)
    }

    pub fn alert(text: &str) -> Self {
        Message::new(hint::ALERT).with_data(text)
    }

    pub fn lock_ack(from: Option<&str>, to: &str) -> Self {
        let msg = Message::new(hint::LOCK_ACK).with_to(to);
        match from {
            Some(from) => msg.with_from(from),
            None => msg,
        }
    }

    pub fn release_ack(from: Option<&str>, to: &str) -> Self {
        let msg = Message::new(hint::RELEASE_ACK).with_to(to);
        match from {
            Some(from) => msg.with_from(from),
            None => msg,
        }
    }

    pub fn airplane_list(payload: String) -> Self {
        Message::new(hint::AIRPLANE_LIST).with_data(payload)
    }

    pub fn collision_list(payload: String) -> Self {
        Message::new(hint::COLLISION_LIST).with_data(payload)
    }

    pub fn encode(&self) -> String {
        format!(
            "{}{};{};{};{}{}",
            MESSAGE_PREFIX,
            self.hint,
            encode_field(self.from.as_deref()),
            encode_field(self.to.as_deref()),
            encode_field(self.data.as_deref()),
            RECORD_SUFFIX,
        )
    }

    pub fn decode(line: &str) -> Result<Message, WireError> {
        let inner = line
            .strip_prefix(MESSAGE_PREFIX)
            .and_then(|rest| rest.strip_suffix(RECORD_SUFFIX))
            .ok_or(WireError::BadMessage)?;

        let mut fields = inner.split(';');
        let hint = parse_decimal_u32(fields.next().ok_or(WireError::BadMessage)?)
            .ok_or(WireError::BadMessage)?;
        let from = decode_field(fields.next().ok_or(WireError::BadMessage)?)?;
        let to = decode_field(fields.next().ok_or(WireError::BadMessage)?)?;
        let data = decode_field(fields.next().ok_or(WireError::BadMessage)?)?;
        if fields.next().is_some() {
            return Err(WireError::BadMessage);
        }

        Ok(Message { hint, from, to, data })
    }
}

fn encode_field(field: Option<&str>) -> String {
    match field {
        Some(text) => BASE64.encode(text),
        None => String::new(),
    }
}

fn decode_field(field: &str) -> Result<Option<String>, WireError> {
    if field.is_empty() {
        return Ok(None);
    }
    let bytes = BASE64.decode(field).map_err(|_| WireError::BadBase64)?;
    let text = String::from_utf8(bytes).map_err(|_| WireError::BadUtf8)?;
    Ok(Some(text))
}

pub fn encode_vector(v: &Vector3) -> String {
    format!("{}{};{};{}{}", VECTOR_PREFIX, v.x, v.y, v.z, RECORD_SUFFIX)
}

pub fn decode_vector(text: &str) -> Result<Vector3, WireError> {
    let inner = text
        .strip_prefix(VECTOR_PREFIX)
        .and_then(|rest| rest.strip_suffix(RECORD_SUFFIX))
        .ok_or(WireError::BadVector)?;

    let mut fields = inner.split(';');
    let x = parse_decimal_f64(fields.next().ok_or(WireError::BadVector)?)
        .ok_or(WireError::BadVector)?;
    let y = parse_decimal_f64(fields.next().ok_or(WireError::BadVector)?)
        .ok_or(WireError::BadVector)?;
    let z = parse_decimal_f64(fields.next().ok_or(WireError::BadVector)?)
        .ok_or(WireError::BadVector)?;
    if fields.next().is_some() {
        return Err(WireError::BadVector);
    }

    Ok(Vector3::new(x, y, z))
}

/// Serialize one aircraft as a telemetry record.
pub fn encode_telemetry<A: Aircraft + ?Sized>(aircraft: &A) -> String {
    format!(
        "{}{};{};{};{};{};{};{}{}",
        TELEMETRY_PREFIX,
        aircraft.id(),
        BASE64.encode(encode_vector(&aircraft.position())),
        aircraft.roll(),
        aircraft.pitch(),
        aircraft.yaw(),
        aircraft.speed(),
        aircraft.flags(),
        RECORD_SUFFIX,
    )
}

/// Decode one telemetry record. Numeric fields pass through the state
/// setters, so out-of-range values are clamped rather than rejected.
pub fn decode_telemetry(line: &str) -> Result<AircraftState, WireError> {
    let inner = line
        .strip_prefix(TELEMETRY_PREFIX)
        .and_then(|rest| rest.strip_suffix(RECORD_SUFFIX))
        .ok_or(WireError::BadTelemetry)?;

    let fields: Vec<&str> = inner.split(';').collect();
    if fields.len() != 7 || !is_valid_id(fields[0]) {
        return Err(WireError::BadTelemetry);
    }

    let vector_text = decode_field(fields[1])?.ok_or(WireError::BadTelemetry)?;
    let position = decode_vector(&vector_text)?;
    let roll = parse_decimal_f64(fields[2]).ok_or(WireError::BadTelemetry)?;
    let pitch = parse_decimal_f64(fields[3]).ok_or(WireError::BadTelemetry)?;
    let yaw = parse_decimal_f64(fields[4]).ok_or(WireError::BadTelemetry)?;
    let speed = parse_decimal_f64(fields[5]).ok_or(WireError::BadTelemetry)?;
    let flags = parse_decimal_u32(fields[6]).ok_or(WireError::BadTelemetry)?;

    let mut state = AircraftState::new(fields[0]);
    state.apply_flags(flags);
    state.set_position(position);
    state.set_roll(roll);
    state.set_pitch(pitch);
    state.set_yaw(yaw);
    state.set_speed(speed);
    Ok(state)
}

/// Scan a broadcast payload of concatenated telemetry records.
///
/// Records have no separator between them, so this walks a cursor over
/// successive non-overlapping `pln::<...>` candidates; a candidate that
/// fails to parse is skipped past its prefix and scanning continues.
pub fn decode_telemetry_stream(payload: &str) -> Vec<AircraftState> {
    let mut records = Vec::new();
    let mut cursor = 0;

    while let Some(found) = payload[cursor..].find(TELEMETRY_PREFIX) {
        let start = cursor + found;
        let Some(close) = payload[start..].find(RECORD_SUFFIX) else {
            break;
        };
        let end = start + close + RECORD_SUFFIX.len_utf8();

        match decode_telemetry(&payload[start..end]) {
            Ok(state) => {
                records.push(state);
                cursor = end;
            }
            Err(_) => cursor = start + TELEMETRY_PREFIX.len(),
        }
    }

    records
}

/// Collision-list payload: `idA;idB;flag` entries joined by `|`.
pub fn encode_collision_list(pairs: &[PairFlag]) -> String {
    pairs
        .iter()
        .map(|pair| format!("{};{};{}", pair.a, pair.b, pair.level.to_flag()))
        .collect::<Vec<_>>()
        .join("|")
}

pub fn decode_collision_list(payload: &str) -> Vec<PairFlag> {
    payload
        .split('|')
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let mut fields = entry.split(';');
            let a = fields.next()?;
            let b = fields.next()?;
            let flags = parse_decimal_u32(fields.next()?)?;
            if fields.next().is_some() || a.is_empty() || b.is_empty() {
                return None;
            }
            Some(PairFlag {
                a: a.to_string(),
                b: b.to_string(),
                level: ThreatLevel::from_flag(flags),
            })
        })
        .collect()
}

/// Aircraft ids on the wire: non-empty, alphanumeric plus `-`/`_`/`.`.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
}

fn parse_decimal_u32(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Plain decimal grammar: optional minus, digits, optional fraction.
/// Keeps exponents, infinities and NaN off the wire.
fn parse_decimal_f64(text: &str) -> Option<f64> {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (unsigned, None),
    };

    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(int_part) || !frac_part.map_or(true, digits) {
        return None;
    }
    text.parse().ok()
}
