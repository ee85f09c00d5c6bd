use std::sync::Arc;
use std::time::Duration;

use crate::config::MqttConfig;
use crate::error::MQTTError;
use crate::observer::IngestMessage;
use aether_core::{route, subscription_filters, Telemetry};
use parking_lot::Mutex;
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, Publish, QoS, SubscribeFilter,
    SubscribeReasonCode,
};
use tokio::sync::mpsc::{error::TrySendError, Sender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn};

mod backoff;
#[cfg(test)]
mod test;

pub use backoff::{Delay, ReconnectPolicy};

const QOS: QoS = QoS::AtMostOnce;
const REQUEST_CAPACITY: usize = 16;
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub type MqttSender = Sender<IngestMessage>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
}

/// Broker connection feeding the ingest worker
///
/// The event loop only runs between [`start`](Self::start) and
/// [`stop`](Self::stop); outside of that the client is `Disconnected`.
pub struct MqttSensorClient {
    inner: Arc<MqttSensorClientInner>,
    running: Mutex<Option<RunningClient>>,
}

struct MqttSensorClientInner {
    config: MqttConfig,
    state: Mutex<ConnectionState>,
    sender: MqttSender,
}

struct RunningClient {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl MqttSensorClient {
    pub fn new(config: MqttConfig, sender: MqttSender) -> Self {
        MqttSensorClient {
            inner: Arc::new(MqttSensorClientInner {
                config,
                state: Mutex::new(ConnectionState::Disconnected),
                sender,
            }),
            running: Mutex::new(None),
        }
    }

    pub fn broker(&self) -> String {
        format!("{}:{}", self.inner.config.host, self.inner.config.port)
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Spawns the event loop, which connects and keeps reconnecting until stopped
    pub fn start(&self) -> Result<(), MQTTError> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(MQTTError::AlreadyStarted);
        }

        let config = &self.inner.config;
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options
            .set_keep_alive(config.keep_alive)
            .set_clean_session(true);
        let (cli, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(self.inner.clone().run(cli, eventloop, shutdown_rx));
        *running = Some(RunningClient { shutdown, handle });
        Ok(())
    }

    /// Disconnects from the broker and waits for the event loop to end
    pub async fn stop(&self) {
        let running = self.running.lock().take();
        if let Some(running) = running {
            let _ = running.shutdown.send(true);
            if let Err(e) = running.handle.await {
                error!("MQTT event loop ended abnormally: {}", e);
            }
        }
        self.inner.set_state(ConnectionState::Disconnected);
    }

    /// Routes and decodes a received message and hands it to the ingest worker
    pub(crate) fn on_sensor_message(sender: &MqttSender, msg: Publish) -> Result<(), MQTTError> {
        let route = route(&msg.topic)?;
        let payload: serde_json::Value = serde_json::from_slice(&msg.payload)?;
        let telemetry = Telemetry::decode(route.room, route.kind, payload)?;

        let span = info_span!(
            "mqtt_message",
            topic = %msg.topic,
            sensor_id = %telemetry.sensor_id
        );
        for skipped in telemetry.skipped.iter() {
            warn!(parent: &span, "Ignored field: {}", skipped);
        }
        sender
            .try_send(IngestMessage { span, telemetry })
            .map_err(|e| match e {
                TrySendError::Full(_) => MQTTError::QueueFull,
                TrySendError::Closed(_) => MQTTError::ChannelClosed,
            })
    }
}

impl Drop for MqttSensorClient {
    fn drop(&mut self) {
        if let Some(running) = self.running.lock().take() {
            let _ = running.shutdown.send(true);
        }
    }
}

impl MqttSensorClientInner {
    async fn run(
        self: Arc<Self>,
        cli: AsyncClient,
        mut eventloop: EventLoop,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let broker = format!("{}:{}", self.config.host, self.config.port);
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());
        info!("Attempt connecting on broker {}", broker);
        self.set_state(ConnectionState::Connecting);

        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                event = eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    policy.reset();
                    info!("Connected to broker {}, subscribing topics", broker);
                    if let Err(e) = Self::subscribe(&cli) {
                        error!("Failed subscribing topics: {}", e);
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    let rejected = ack
                        .return_codes
                        .iter()
                        .filter(|code| matches!(code, SubscribeReasonCode::Failure))
                        .count();
                    if rejected > 0 {
                        error!("Broker rejected {} topic subscriptions", rejected);
                    } else {
                        self.set_state(ConnectionState::Subscribed);
                        info!("Subscribed topics {:?}", subscription_filters());
                    }
                }
                Ok(Event::Incoming(Packet::Publish(msg))) => {
                    debug!("Received topic: {}", msg.topic);
                    match MqttSensorClient::on_sensor_message(&self.sender, msg) {
                        Ok(()) => (),
                        Err(MQTTError::ChannelClosed) => {
                            error!("Ingest worker is gone, stopping MQTT event loop");
                            break;
                        }
                        Err(e) => warn!("Dropped message: {}", e),
                    }
                }
                Ok(_) => (),
                Err(e) => {
                    self.set_state(ConnectionState::Disconnected);
                    let delay = policy.next_delay();
                    match delay {
                        Delay::Backoff(d) => error!(
                            "MQTT connection to {} failed: {} - retry {} in {:?}",
                            broker,
                            e,
                            policy.failures(),
                            d
                        ),
                        Delay::CircuitOpen(d) => error!(
                            "MQTT connection to {} failed: {} - giving broker a break for {:?}",
                            broker, e, d
                        ),
                    }

                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(delay.duration()) => (),
                    }
                    self.set_state(ConnectionState::Connecting);
                }
            }
        }

        Self::disconnect(&cli, &mut eventloop).await;
        self.set_state(ConnectionState::Disconnected);
        info!("Ended MQTT message loop");
    }

    fn subscribe(cli: &AsyncClient) -> Result<(), MQTTError> {
        let filters: Vec<SubscribeFilter> = subscription_filters()
            .drain(..)
            .map(|topic| SubscribeFilter::new(topic, QOS))
            .collect();
        cli.try_subscribe_many(filters)?;
        Ok(())
    }

    /// Sends DISCONNECT and drives the event loop until it went out
    async fn disconnect(cli: &AsyncClient, eventloop: &mut EventLoop) {
        if let Err(e) = cli.try_disconnect() {
            warn!("Failed requesting disconnect: {}", e);
            return;
        }

        let flushed = tokio::time::timeout(DISCONNECT_TIMEOUT, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => (),
                }
            }
        })
        .await;
        if flushed.is_err() {
            warn!("Timed out disconnecting from broker");
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }
}
