use super::CountRecord;
use crate::error::DBError;
use aether_core::RoomState;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

#[derive(sqlx::FromRow, Debug)]
pub struct RoomStateDao {
    #[allow(dead_code)]
    pub(crate) id: i64,
    pub(crate) room: String,
    pub(crate) last_seen_at: Option<DateTime<Utc>>,
    pub(crate) occupied: bool,
    pub(crate) door_open: bool,
    pub(crate) window_open: bool,
    pub(crate) temperature: Option<f64>,
    pub(crate) humidity: Option<f64>,
    pub(crate) air_quality: Option<f64>,
    pub(crate) last_alert_at: Option<DateTime<Utc>>,
}

impl From<RoomStateDao> for RoomState {
    fn from(val: RoomStateDao) -> Self {
        RoomState {
            room: val.room,
            last_seen_at: val.last_seen_at,
            occupied: val.occupied,
            door_open: val.door_open,
            window_open: val.window_open,
            temperature: val.temperature,
            humidity: val.humidity,
            air_quality: val.air_quality,
            last_alert_at: val.last_alert_at,
        }
    }
}

pub async fn get(conn: &mut SqliteConnection, room: &str) -> Result<Option<RoomState>, DBError> {
    let dao = sql_stmnt!(
        RoomStateDao,
        "SELECT * FROM room_state WHERE room = ?1",
        room
    )
    .fetch_optional(&mut *conn)
    .await?;
    Ok(dao.map(RoomState::from))
}

/// Writes the whole state row, keyed by room
pub async fn upsert(conn: &mut SqliteConnection, state: &RoomState) -> Result<(), DBError> {
    sql_stmnt!(
        r#"INSERT INTO room_state
            (room, last_seen_at, occupied, door_open, window_open, temperature, humidity, air_quality, last_alert_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (room) DO UPDATE SET
                last_seen_at = excluded.last_seen_at,
                occupied = excluded.occupied,
                door_open = excluded.door_open,
                window_open = excluded.window_open,
                temperature = excluded.temperature,
                humidity = excluded.humidity,
                air_quality = excluded.air_quality,
                last_alert_at = excluded.last_alert_at"#,
        state.room.as_str(),
        state.last_seen_at,
        state.occupied,
        state.door_open,
        state.window_open,
        state.temperature,
        state.humidity,
        state.air_quality,
        state.last_alert_at
    )
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// READ room_state, in order of first appearance
pub async fn read_all(conn: &SqlitePool) -> Result<Vec<RoomState>, DBError> {
    let mut daos = sql_stmnt!(RoomStateDao, "SELECT * FROM room_state ORDER BY id ASC")
        .fetch_all(conn)
        .await?;
    Ok(daos.drain(..).map(RoomState::from).collect())
}

pub async fn count(conn: &SqlitePool) -> Result<i64, DBError> {
    let record = sql_stmnt!(CountRecord, "SELECT count(*) AS count FROM room_state")
        .fetch_one(conn)
        .await?;
    Ok(record.count())
}

/// Inserts the demo rooms, but only into an empty table
///
/// Returns whether anything was seeded.
pub async fn seed_demo(conn: &SqlitePool, now: DateTime<Utc>) -> Result<bool, DBError> {
    let mut tx = conn.begin().await?;
    let existing = sql_stmnt!(CountRecord, "SELECT count(*) AS count FROM room_state")
        .fetch_one(&mut *tx)
        .await?;
    if existing.count() != 0 {
        return Ok(false);
    }

    for state in demo_rooms(now) {
        upsert(&mut tx, &state).await?;
    }
    tx.commit().await?;
    Ok(true)
}

fn demo_rooms(now: DateTime<Utc>) -> Vec<RoomState> {
    let room = |name: &str, occupied, door_open, window_open, readings: (f64, f64, f64)| {
        RoomState {
            room: name.to_owned(),
            last_seen_at: Some(now),
            occupied,
            door_open,
            window_open,
            temperature: Some(readings.0),
            humidity: Some(readings.1),
            air_quality: Some(readings.2),
            last_alert_at: None,
        }
    };

    vec![
        room("livingroom", false, false, false, (21.5, 40.0, 10.0)),
        room("bedroom", true, false, true, (20.0, 38.0, 12.0)),
        room("kitchen", false, true, false, (22.0, 45.0, 15.0)),
    ]
}
