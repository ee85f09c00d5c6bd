use crate::error::DBError;
use aether_core::SensorKind;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

pub type EventId = i64;

#[derive(sqlx::FromRow, Debug)]
pub struct EventDao {
    pub(crate) id: EventId,
    pub(crate) sensor_id: String,
    pub(crate) kind: String,
    pub(crate) payload_json: String,
    pub(crate) created_at: DateTime<Utc>,
}

impl EventDao {
    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn sensor_id(&self) -> &String {
        &self.sensor_id
    }

    pub fn kind(&self) -> &String {
        &self.kind
    }

    pub fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.payload_json)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Appends one accepted message to the event log
pub async fn append(
    conn: &mut SqliteConnection,
    sensor_id: &str,
    kind: SensorKind,
    payload: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<EventId, DBError> {
    let result = sql_stmnt!(
        "INSERT INTO events (sensor_id, kind, payload_json, created_at) VALUES (?1, ?2, ?3, ?4)",
        sensor_id,
        kind.as_str(),
        payload.to_string(),
        now
    )
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

// READ events
pub async fn read_by_sensor(conn: &SqlitePool, sensor_id: &str) -> Result<Vec<EventDao>, DBError> {
    Ok(sql_stmnt!(
        EventDao,
        "SELECT * FROM events WHERE sensor_id = ?1 ORDER BY id ASC",
        sensor_id
    )
    .fetch_all(conn)
    .await?)
}
