use crate::error::{PayloadError, TopicError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Telemetry category, taken from the last topic segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    MmWave,
    Pir,
    Door,
    Window,
    Env,
    Alert,
}

impl SensorKind {
    pub const ALL: [SensorKind; 6] = [
        SensorKind::MmWave,
        SensorKind::Pir,
        SensorKind::Door,
        SensorKind::Window,
        SensorKind::Env,
        SensorKind::Alert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::MmWave => "mmwave",
            SensorKind::Pir => "pir",
            SensorKind::Door => "door",
            SensorKind::Window => "window",
            SensorKind::Env => "env",
            SensorKind::Alert => "alert",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorKind {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorKind::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| TopicError::Malformed(format!("Unknown sensor kind: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opening {
    Door,
    Window,
}

/// Update instruction for a single nullable measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Field absent from the payload, keep the stored value
    Unchanged,
    /// Field explicitly `null`
    Cleared,
    Value(f64),
}

impl Reading {
    pub fn apply_to(self, field: &mut Option<f64>) {
        match self {
            Reading::Unchanged => (),
            Reading::Cleared => *field = None,
            Reading::Value(value) => *field = Some(value),
        }
    }
}

/// Payload of a single message, decoded according to its [`SensorKind`]
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    Occupancy {
        occupied: bool,
    },
    Contact {
        opening: Opening,
        open: bool,
    },
    Environment {
        temperature: Reading,
        humidity: Reading,
        air_quality: Reading,
    },
    Alert {
        raw: Value,
    },
}

impl SensorEvent {
    /// Parses `payload` as an event of `kind`
    ///
    /// Env readings that are not numbers are left unchanged instead of
    /// rejecting the whole message.
    pub fn parse(kind: SensorKind, payload: &Value) -> Result<Self, PayloadError> {
        Self::parse_lenient(kind, payload).map(|(event, _)| event)
    }

    /// Like [`parse`](Self::parse), additionally returning the skipped fields
    pub fn parse_lenient(
        kind: SensorKind,
        payload: &Value,
    ) -> Result<(Self, Vec<PayloadError>), PayloadError> {
        let fields = payload.as_object().ok_or(PayloadError::NotAnObject)?;
        let mut skipped = Vec::new();
        let event = match kind {
            SensorKind::MmWave | SensorKind::Pir => SensorEvent::Occupancy {
                occupied: truthy(fields.get("occupied")),
            },
            SensorKind::Door => SensorEvent::Contact {
                opening: Opening::Door,
                open: truthy(fields.get("open")),
            },
            SensorKind::Window => SensorEvent::Contact {
                opening: Opening::Window,
                open: truthy(fields.get("open")),
            },
            SensorKind::Env => SensorEvent::Environment {
                temperature: reading(fields, "temperature", &mut skipped),
                humidity: reading(fields, "humidity", &mut skipped),
                air_quality: reading(fields, "air_quality", &mut skipped),
            },
            SensorKind::Alert => SensorEvent::Alert {
                raw: payload.clone(),
            },
        };
        Ok((event, skipped))
    }
}

/// One accepted transport message, routed and decoded
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub room: String,
    pub kind: SensorKind,
    pub sensor_id: String,
    pub event: SensorEvent,
    pub payload: Value,
    /// Fields ignored while decoding, the rest of the message still applies
    pub skipped: Vec<PayloadError>,
}

impl Telemetry {
    pub fn decode(room: String, kind: SensorKind, payload: Value) -> Result<Self, PayloadError> {
        let (event, skipped) = SensorEvent::parse_lenient(kind, &payload)?;
        let sensor_id = payload
            .as_object()
            .and_then(explicit_sensor_id)
            .unwrap_or_else(|| synthetic_sensor_id(&room, kind));

        Ok(Telemetry {
            room,
            kind,
            sensor_id,
            event,
            payload,
            skipped,
        })
    }
}

/// Identity shared by every sensor of `kind` in `room` that doesn't report its own id
pub fn synthetic_sensor_id(room: &str, kind: SensorKind) -> String {
    format!("{}-{}", room, kind)
}

fn explicit_sensor_id(fields: &Map<String, Value>) -> Option<String> {
    match fields.get("sensor_id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        // zero counts as no id, like any other falsy value
        Value::Number(id) if id.as_f64() != Some(0.0) => Some(id.to_string()),
        _ => None,
    }
}

/// JSON truthiness: missing, null, false, 0, "" and empty containers are false
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn reading(fields: &Map<String, Value>, field: &'static str, skipped: &mut Vec<PayloadError>) -> Reading {
    match fields.get(field) {
        None => Reading::Unchanged,
        Some(Value::Null) => Reading::Cleared,
        Some(value) => match value.as_f64() {
            Some(value) => Reading::Value(value),
            None => {
                skipped.push(PayloadError::InvalidField {
                    field,
                    reason: format!("expected a number, got {}", value),
                });
                Reading::Unchanged
            }
        },
    }
}
