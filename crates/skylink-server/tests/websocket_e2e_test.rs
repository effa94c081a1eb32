//! End-to-end test over real WebSocket connections.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use bytes::Bytes;
use futures::StreamExt;
use skylink_core::{
    SystemEnv, channel,
    env::Environment,
    handshake::{self, Handshake, HandshakeConfig},
    keys::{KeyProvider, StaticKeys},
    transport,
};
use skylink_proto::{FlightStatus, Identity, Message, TelemetryRecord};
use skylink_server::{CoordinatorConfig, Server, ServerRuntimeConfig};
use tokio_tungstenite::{connect_async, tungstenite};

const AUTH_HEX: &str = "6e6f742d612d7265616c2d6b65792d6a7573742d666f722d7465737473";
const CHANNEL_HEX: &str = "a0a1a2a3a4a5a6a7a8a9aaabacadaeafb0b1b2b3b4b5b6b7b8b9babbbcbdbebf";

fn keys() -> Arc<StaticKeys> {
    Arc::new(StaticKeys::from_hex(AUTH_HEX, CHANNEL_HEX).unwrap())
}

async fn start_server() -> (SocketAddr, Arc<skylink_server::Coordinator<SystemEnv>>) {
    let config = ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        coordinator: CoordinatorConfig {
            classify_timeout: Duration::from_millis(50),
            ..CoordinatorConfig::default()
        },
        ..ServerRuntimeConfig::default()
    };

    let server = Server::bind(config, keys()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let coordinator = server.coordinator();
    tokio::spawn(server.run());

    (addr, coordinator)
}

#[tokio::test]
async fn producer_to_subscriber_over_websocket() {
    let (addr, coordinator) = start_server().await;
    let url = format!("ws://{addr}");

    let (mut subscriber, _) = connect_async(&url).await.unwrap();
    for _ in 0..100 {
        if coordinator.status().active_subscribers == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(coordinator.status().active_subscribers, 1);

    let (stream, _) = connect_async(&url).await.unwrap();
    let mut producer = transport::websocket(stream, 8);
    let env = SystemEnv::new();
    let mut hs = Handshake::initiator(
        Identity::Producer,
        keys().auth_key().clone(),
        HandshakeConfig::default(),
        env.now(),
    );
    assert_eq!(
        handshake::drive(&mut hs, &mut producer, &env, None).await,
        Ok(Identity::Coordinator)
    );

    let record = TelemetryRecord {
        timestamp: 1_700_000_123.0,
        latitude: 48.858_37,
        longitude: 2.294_481,
        altitude: 300.0,
        speed: 8.75,
        heading: 180.0,
        battery_level: 0.0,
        status: FlightStatus::BatteryDepleted,
    };
    let sealed = channel::seal_record(&record, keys().channel_key(), &env).unwrap();
    producer.send(Message::Binary(Bytes::from(sealed))).await.unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), subscriber.next())
        .await
        .expect("record within deadline")
        .expect("stream open")
        .unwrap();
    let tungstenite::Message::Text(json) = frame else {
        panic!("expected text frame, got {frame:?}");
    };

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["status"], "battery_depleted");
    assert_eq!(value["battery_level"], 0.0);
    assert_eq!(TelemetryRecord::from_json(&json).unwrap(), record);
    assert!(coordinator.status().producer_connected);
}

async fn get_health(addr: SocketAddr) -> (String, serde_json::Value) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();

    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
        .await
        .expect("health reply within deadline")
        .unwrap();

    let raw = String::from_utf8(raw).unwrap();
    let (head, body) = raw.split_once("\r\n\r\n").expect("header terminator");
    (head.to_string(), serde_json::from_str(body).unwrap())
}

#[tokio::test]
async fn health_endpoint_reports_status_as_json() {
    let (addr, coordinator) = start_server().await;

    let (head, status) = get_health(addr).await;
    assert!(head.starts_with("HTTP/1.1 200 OK"), "unexpected head: {head}");
    assert!(head.contains("Content-Type: application/json"));
    assert_eq!(status["producer_connected"], false);
    assert_eq!(status["active_subscribers"], 0);

    let (_subscriber, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    for _ in 0..100 {
        if coordinator.status().active_subscribers == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (_, status) = get_health(addr).await;
    assert_eq!(status["active_subscribers"], 1);
    assert_eq!(status["producer_connected"], false);
}
