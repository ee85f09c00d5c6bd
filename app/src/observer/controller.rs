use crate::error::{DBError, ObserverError};
use crate::models::room_state as room_state_model;
use crate::mqtt::{ConnectionState, MqttSensorClient};

use aether_core::RoomState;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

/// Read side of the room states, shared by all request handlers
#[derive(Clone)]
pub struct RoomObserver {
    db_conn: SqlitePool,
    mqtt_client: Option<Arc<MqttSensorClient>>,
}

impl RoomObserver {
    pub fn new(db_conn: SqlitePool, mqtt_client: Option<Arc<MqttSensorClient>>) -> Self {
        RoomObserver {
            db_conn,
            mqtt_client,
        }
    }

    pub async fn rooms(&self) -> Result<Vec<RoomState>, ObserverError> {
        let rooms = room_state_model::read_all(&self.db_conn).await?;
        debug!("Fetched {} room states", rooms.len());
        Ok(rooms)
    }

    pub async fn room_count(&self) -> Result<i64, ObserverError> {
        Ok(room_state_model::count(&self.db_conn).await?)
    }

    pub fn mqtt_broker(&self) -> Option<String> {
        self.mqtt_client.as_ref().map(|cli| cli.broker())
    }

    pub fn mqtt_state(&self) -> Option<ConnectionState> {
        self.mqtt_client.as_ref().map(|cli| cli.state())
    }

    pub async fn check_db(&self) -> String {
        let result: Result<_, DBError> = sqlx::query("SELECT 1")
            .execute(&self.db_conn)
            .await
            .map_err(DBError::from);
        match result {
            Ok(_) => "healthy".to_owned(),
            Err(e) => format!("{}", e),
        }
    }
}
