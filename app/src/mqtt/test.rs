use super::*;
use crate::config::ReconnectConfig;
use aether_core::{Reading, SensorEvent, SensorKind};
use rumqttc::Publish;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::channel;
use tokio::time::timeout;

fn mocked_message(topic: &str, payload: &[u8]) -> Publish {
    Publish::new(topic, QoS::AtMostOnce, payload.to_vec())
}

fn unreachable_broker() -> MqttConfig {
    MqttConfig {
        host: "127.0.0.1".to_owned(),
        port: 1,
        client_id: "aether-test".to_owned(),
        keep_alive: Duration::from_secs(5),
        reconnect: ReconnectConfig {
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
            max_attempts: 3,
            circuit_cooldown: Duration::from_millis(100),
        },
    }
}

#[tokio::test]
async fn test_send_path() {
    // prepare
    let (tx, mut rx) = channel(16);
    let payload = json!({"sensor_id": "lv-1", "occupied": true});
    let msg = mocked_message(
        "home/livingroom/mmwave",
        &serde_json::to_vec(&payload).unwrap(),
    );

    // execute
    let result = MqttSensorClient::on_sensor_message(&tx, msg);

    // validate
    assert!(result.is_ok());
    match timeout(Duration::from_millis(10), rx.recv()).await {
        Ok(Some(IngestMessage { telemetry, .. })) => {
            assert_eq!("livingroom", telemetry.room);
            assert_eq!(SensorKind::MmWave, telemetry.kind);
            assert_eq!("lv-1", telemetry.sensor_id);
            assert_eq!(SensorEvent::Occupancy { occupied: true }, telemetry.event);
            assert_eq!(payload, telemetry.payload);
        }
        _ => panic!("No message forwarded"),
    }
}

#[tokio::test]
async fn test_invalid_mqtt_path() {
    let (tx, mut rx) = channel(16);

    for topic in ["home/kitchen", "home/kitchen/smoke", "garden/kitchen/env"] {
        let result = MqttSensorClient::on_sensor_message(&tx, mocked_message(topic, b"{}"));
        assert!(matches!(result, Err(MQTTError::Topic(_))), "accepted {}", topic);
    }
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_invalid_payload() {
    let (tx, mut rx) = channel(16);

    let garbage = mocked_message("home/kitchen/env", b"{not json");
    assert!(matches!(
        MqttSensorClient::on_sensor_message(&tx, garbage),
        Err(MQTTError::Parse(_))
    ));

    let not_object = mocked_message("home/kitchen/door", b"[true]");
    assert!(matches!(
        MqttSensorClient::on_sensor_message(&tx, not_object),
        Err(MQTTError::Payload(_))
    ));

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_partially_invalid_env() {
    let (tx, mut rx) = channel(16);

    let msg = mocked_message(
        "home/kitchen/env",
        br#"{"temperature": "hot", "humidity": 40}"#,
    );
    assert!(MqttSensorClient::on_sensor_message(&tx, msg).is_ok());

    let IngestMessage { telemetry, .. } = rx.try_recv().unwrap();
    assert_eq!(
        SensorEvent::Environment {
            temperature: Reading::Unchanged,
            humidity: Reading::Value(40.0),
            air_quality: Reading::Unchanged,
        },
        telemetry.event
    );
    assert_eq!(1, telemetry.skipped.len());
}

#[tokio::test]
async fn test_full_queue_drops() {
    let (tx, mut rx) = channel(1);

    let first = mocked_message("home/hall/pir", br#"{"occupied": true}"#);
    let second = mocked_message("home/hall/pir", br#"{"occupied": false}"#);
    assert!(MqttSensorClient::on_sensor_message(&tx, first).is_ok());
    assert!(matches!(
        MqttSensorClient::on_sensor_message(&tx, second),
        Err(MQTTError::QueueFull)
    ));

    let IngestMessage { telemetry, .. } = rx.try_recv().unwrap();
    assert_eq!(SensorEvent::Occupancy { occupied: true }, telemetry.event);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_closed_channel() {
    let (tx, rx) = channel(16);
    drop(rx);

    let result =
        MqttSensorClient::on_sensor_message(&tx, mocked_message("home/hall/pir", b"{}"));
    assert!(matches!(result, Err(MQTTError::ChannelClosed)));
}

#[tokio::test]
async fn test_start_stop_without_broker() {
    let (tx, _rx) = channel(16);
    let client = MqttSensorClient::new(unreachable_broker(), tx);
    assert_eq!(ConnectionState::Disconnected, client.state());
    assert_eq!("127.0.0.1:1", client.broker());

    client.start().unwrap();
    assert!(matches!(client.start(), Err(MQTTError::AlreadyStarted)));

    // keeps retrying instead of giving up
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_ne!(ConnectionState::Subscribed, client.state());

    timeout(Duration::from_secs(5), client.stop())
        .await
        .expect("stop() hung");
    assert_eq!(ConnectionState::Disconnected, client.state());
}

fn local_broker(port: u16) -> MqttConfig {
    MqttConfig {
        host: "127.0.0.1".to_owned(),
        port,
        client_id: "aether-test".to_owned(),
        keep_alive: Duration::from_secs(60),
        reconnect: ReconnectConfig {
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
            max_attempts: 3,
            circuit_cooldown: Duration::from_millis(100),
        },
    }
}

/// Reads one MQTT packet, returning its fixed header byte and body
async fn read_packet(stream: &mut TcpStream) -> (u8, Vec<u8>) {
    let header = stream.read_u8().await.unwrap();
    let mut len = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await.unwrap();
        len |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    let mut body = vec![0; len];
    stream.read_exact(&mut body).await.unwrap();
    (header, body)
}

fn parse_subscribe(body: &[u8]) -> (u16, Vec<(String, u8)>) {
    let pkid = u16::from_be_bytes([body[0], body[1]]);
    let mut filters = Vec::new();
    let mut pos = 2;
    while pos < body.len() {
        let len = u16::from_be_bytes([body[pos], body[pos + 1]]) as usize;
        pos += 2;
        let topic = String::from_utf8(body[pos..pos + len].to_vec()).unwrap();
        pos += len;
        filters.push((topic, body[pos]));
        pos += 1;
    }
    (pkid, filters)
}

/// Accepts a client, acknowledges its CONNECT and SUBSCRIBE and checks the filters
async fn accept_session(listener: &TcpListener) -> TcpStream {
    let (mut stream, _) = listener.accept().await.unwrap();

    let (header, _) = read_packet(&mut stream).await;
    assert_eq!(0x10, header, "expected CONNECT");
    stream.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();

    let (header, body) = read_packet(&mut stream).await;
    assert_eq!(0x82, header, "expected SUBSCRIBE");
    let (pkid, filters) = parse_subscribe(&body);
    let expected: Vec<(String, u8)> = subscription_filters()
        .into_iter()
        .map(|topic| (topic, 0))
        .collect();
    assert_eq!(expected, filters);

    let [hi, lo] = pkid.to_be_bytes();
    stream
        .write_all(&[0x90, 0x08, hi, lo, 0, 0, 0, 0, 0, 0])
        .await
        .unwrap();
    stream
}

async fn wait_for_state(client: &MqttSensorClient, state: ConnectionState) {
    timeout(Duration::from_secs(5), async {
        while client.state() != state {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never reached {:?}", state));
}

#[tokio::test]
async fn test_subscribe_and_resubscribe() {
    // prepare
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, _rx) = channel(16);
    let client = MqttSensorClient::new(local_broker(port), tx);

    // execute
    client.start().unwrap();
    let first = timeout(Duration::from_secs(5), accept_session(&listener))
        .await
        .expect("no first session");
    wait_for_state(&client, ConnectionState::Subscribed).await;

    drop(first);
    let second = timeout(Duration::from_secs(5), accept_session(&listener))
        .await
        .expect("no reconnect");
    wait_for_state(&client, ConnectionState::Subscribed).await;

    // validate
    timeout(Duration::from_secs(5), client.stop())
        .await
        .expect("stop() hung");
    assert_eq!(ConnectionState::Disconnected, client.state());
    drop(second);
}
