use crate::error::DBError;
use crate::models::{
    event::{self as event_model, EventId},
    room_state as room_state_model, sensor as sensor_model,
};
use crate::mqtt::MqttSender;

use aether_core::{RoomState, Telemetry};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::mpsc::{channel, Receiver};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, info_span, warn, Instrument};

pub mod controller;

pub use controller::RoomObserver;

/// Messages waiting for the ingest worker; more are dropped by the transport
pub const INGEST_QUEUE_CAPACITY: usize = 1024;

/// Decoded message on its way from the transport to the ingest worker
pub struct IngestMessage {
    pub span: tracing::Span,
    pub telemetry: Telemetry,
}

/// Single writer of sensors, events and room states
pub struct IngestObserver {
    db_conn: SqlitePool,
    receiver: Mutex<Receiver<IngestMessage>>,
}

impl Debug for IngestObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestObserver").finish()
    }
}

impl IngestObserver {
    pub fn new(db_conn: SqlitePool) -> (Arc<Self>, MqttSender) {
        Self::with_capacity(db_conn, INGEST_QUEUE_CAPACITY)
    }

    pub fn with_capacity(db_conn: SqlitePool, capacity: usize) -> (Arc<Self>, MqttSender) {
        let (sender, receiver) = channel::<IngestMessage>(capacity);
        let observer = IngestObserver {
            db_conn,
            receiver: Mutex::new(receiver),
        };
        (Arc::new(observer), sender)
    }

    /// Applies received messages one after another until shutdown
    ///
    /// Shutdown is only honoured between messages, so a started transaction
    /// is always committed or rolled back. Messages still queued at that
    /// point are dropped.
    pub async fn dispatch_ingest_loop(self: Arc<IngestObserver>, mut shutdown: watch::Receiver<bool>) {
        let Ok(mut receiver) = self.receiver.try_lock() else {
            error!("dispatch_ingest_loop() already called!");
            return;
        };

        info!("Start capturing sensor events");
        loop {
            let msg = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                msg = receiver.recv() => msg,
            };

            match msg {
                Some(IngestMessage { span, telemetry }) => {
                    let span = info_span!(parent: &span, "ingest");
                    if let Err(e) = self
                        .ingest(&telemetry, Utc::now())
                        .instrument(span.clone())
                        .await
                    {
                        error!(
                            parent: &span,
                            room = %telemetry.room,
                            kind = %telemetry.kind,
                            "Failed persisting sensor event, rolled back: {}",
                            e
                        );
                    }
                }
                None => {
                    warn!("All senders are gone");
                    break;
                }
            }
        }
        info!("Stopped capturing sensor events");
    }

    /// Registers the sensor, logs the event and merges it into the room state,
    /// all in one transaction
    pub async fn ingest(&self, telemetry: &Telemetry, now: DateTime<Utc>) -> Result<EventId, DBError> {
        let mut tx = self.db_conn.begin().await?;

        sensor_model::resolve(
            &mut tx,
            &telemetry.sensor_id,
            &telemetry.room,
            telemetry.kind,
            now,
        )
        .await?;
        let event_id = event_model::append(
            &mut tx,
            &telemetry.sensor_id,
            telemetry.kind,
            &telemetry.payload,
            now,
        )
        .await?;

        let mut state = room_state_model::get(&mut tx, &telemetry.room)
            .await?
            .unwrap_or_else(|| RoomState::new(telemetry.room.clone()));
        state.apply(&telemetry.event, now);
        room_state_model::upsert(&mut tx, &state).await?;

        tx.commit().await?;
        debug!(
            event_id = event_id,
            room = %telemetry.room,
            kind = %telemetry.kind,
            "Persisted sensor event"
        );
        Ok(event_id)
    }
}
