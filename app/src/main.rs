mod config;
mod error;
mod logging;
mod models;
mod mqtt;
mod observer;
mod rest;

use crate::config::Config;
use crate::mqtt::MqttSensorClient;
use crate::observer::{IngestObserver, RoomObserver};

use chrono::Utc;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

static TERMINATED: AtomicUsize = AtomicUsize::new(0);

/// First SIGINT starts the graceful shutdown, the second one exits immediately
fn register_sigint_handler(shutdown: watch::Sender<bool>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        let count = TERMINATED.fetch_add(1, Ordering::Relaxed);
        if count >= 1 {
            info!("Force killing");
            std::process::exit(1);
        }
        info!("Shutting down, press Ctrl-C again to force");
        let _ = shutdown.send(true);
    })
}

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env()?;
    logging::init();
    info!(
        app = %config.app_name,
        version = aether_core::CORE_VERSION,
        "Starting up"
    );

    let db_conn = models::establish_db_connection(&config.database_url).await?;
    if config.seed_demo_data && models::room_state::seed_demo(&db_conn, Utc::now()).await? {
        info!("Seeded demo room states");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    register_sigint_handler(shutdown_tx)?;

    let mut ingest_task = None;
    let mqtt_client = match config.mqtt.clone() {
        Some(mqtt_config) => {
            let (ingest, sender) = IngestObserver::new(db_conn.clone());
            ingest_task = Some(tokio::spawn(
                ingest.dispatch_ingest_loop(shutdown_rx.clone()),
            ));

            let client = Arc::new(MqttSensorClient::new(mqtt_config, sender));
            client.start()?;
            info!(broker = %client.broker(), "MQTT ingestion enabled");
            Some(client)
        }
        None => {
            info!("MQTT_BROKER_HOST not set, MQTT ingestion disabled");
            None
        }
    };

    let observer = RoomObserver::new(db_conn.clone(), mqtt_client.clone());
    let server_task = rest::dispatch_server_daemon(
        observer,
        config.app_name.clone(),
        config.server_port,
        shutdown_rx.clone(),
    )?;

    let mut shutdown = shutdown_rx;
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }

    if let Some(client) = mqtt_client {
        client.stop().await;
    }
    if let Some(task) = ingest_task {
        if let Err(e) = task.await {
            error!("Ingest worker ended abnormally: {}", e);
        }
    }
    if let Err(e) = server_task.await {
        error!("Webserver ended abnormally: {}", e);
    }

    db_conn.close().await;
    info!("Shut down");
    logging::shutdown();
    Ok(())
}
