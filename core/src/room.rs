use crate::sensor::{Opening, SensorEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last known readings of a single room
///
/// Every field group is owned by one kind of event; applying an event leaves
/// the other groups untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomState {
    pub room: String,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub occupied: bool,
    pub door_open: bool,
    pub window_open: bool,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub air_quality: Option<f64>,
    pub last_alert_at: Option<DateTime<Utc>>,
}

impl RoomState {
    pub fn new(room: String) -> Self {
        RoomState {
            room,
            last_seen_at: None,
            occupied: false,
            door_open: false,
            window_open: false,
            temperature: None,
            humidity: None,
            air_quality: None,
            last_alert_at: None,
        }
    }

    /// Merges `event`, processed at `now`, into this state
    pub fn apply(&mut self, event: &SensorEvent, now: DateTime<Utc>) {
        self.last_seen_at = Some(now);
        match event {
            SensorEvent::Occupancy { occupied } => self.occupied = *occupied,
            SensorEvent::Contact {
                opening: Opening::Door,
                open,
            } => self.door_open = *open,
            SensorEvent::Contact {
                opening: Opening::Window,
                open,
            } => self.window_open = *open,
            SensorEvent::Environment {
                temperature,
                humidity,
                air_quality,
            } => {
                temperature.apply_to(&mut self.temperature);
                humidity.apply_to(&mut self.humidity);
                air_quality.apply_to(&mut self.air_quality);
            }
            // no merge rule for alerts yet
            SensorEvent::Alert { .. } => (),
        }
    }
}
