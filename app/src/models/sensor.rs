use crate::error::DBError;
use aether_core::SensorKind;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct SensorDao {
    pub(crate) id: String,
    pub(crate) room: String,
    pub(crate) kind: String,
    pub(crate) hw_id: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
}

impl SensorDao {
    pub fn id(&self) -> &String {
        &self.id
    }

    pub fn room(&self) -> &String {
        &self.room
    }

    pub fn kind(&self) -> &String {
        &self.kind
    }

    pub fn hw_id(&self) -> Option<&String> {
        self.hw_id.as_ref()
    }
}

/// Looks up a sensor by id, registering it on first sight
///
/// The first registration wins: a later sighting of the same id in another
/// room or with another kind returns the stored record unchanged.
pub async fn resolve(
    conn: &mut SqliteConnection,
    sensor_id: &str,
    room: &str,
    kind: SensorKind,
    now: DateTime<Utc>,
) -> Result<SensorDao, DBError> {
    let inserted = sql_stmnt!(
        r#"INSERT INTO sensors (id, room, kind, hw_id, created_at)
            VALUES (?1, ?2, ?3, ?1, ?4)
            ON CONFLICT (id) DO NOTHING"#,
        sensor_id,
        room,
        kind.as_str(),
        now
    )
    .execute(&mut *conn)
    .await?;

    let sensor = sql_stmnt!(SensorDao, "SELECT * FROM sensors WHERE id = ?1", sensor_id)
        .fetch_one(&mut *conn)
        .await?;

    if inserted.rows_affected() == 1 {
        debug!(sensor_id = sensor_id, room = room, "Registered new sensor");
    } else if sensor.room != room || sensor.kind != kind.as_str() {
        warn!(
            sensor_id = sensor_id,
            "Sensor seen as {}/{}, keeping registration {}/{}",
            room,
            kind,
            sensor.room,
            sensor.kind
        );
    }
    Ok(sensor)
}

/// READ sensors
pub async fn read(conn: &SqlitePool) -> Result<Vec<SensorDao>, DBError> {
    Ok(
        sql_stmnt!(SensorDao, "SELECT * FROM sensors ORDER BY created_at ASC, id ASC")
            .fetch_all(conn)
            .await?,
    )
}
