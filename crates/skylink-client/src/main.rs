//! Skylink producer binary.
//!
//! Reads telemetry records as JSON lines on stdin and streams them to a
//! coordinator.
//!
//! # Usage
//!
//! ```bash
//! simulator | SKYLINK_AUTH_KEY=... SKYLINK_CHANNEL_KEY=... \
//!     skylink-producer --url ws://127.0.0.1:8000
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use skylink_client::{
    JsonLinesSource, ProducerClient, ProducerConfig, RetryPolicy, WebSocketConnector,
};
use skylink_core::{SystemEnv, handshake::HandshakeConfig, keys::StaticKeys};
use tokio::io::BufReader;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Skylink telemetry producer
#[derive(Parser, Debug)]
#[command(name = "skylink-producer")]
#[command(about = "Streams JSON telemetry from stdin to a Skylink coordinator")]
#[command(version)]
struct Args {
    /// Coordinator WebSocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:8000")]
    url: String,

    /// Authentication key (hex)
    #[arg(long, env = "SKYLINK_AUTH_KEY", hide_env_values = true)]
    auth_key: String,

    /// Channel key (hex, 32 bytes)
    #[arg(long, env = "SKYLINK_CHANNEL_KEY", hide_env_values = true)]
    channel_key: String,

    /// Milliseconds between records
    #[arg(long, default_value = "1000")]
    send_interval_ms: u64,

    /// Seconds without a record before a heartbeat is sent
    #[arg(long, default_value = "5")]
    heartbeat_interval_secs: u64,

    /// Seconds to wait before reconnecting
    #[arg(long, default_value = "3")]
    retry_interval_secs: u64,

    /// Give up after this many consecutive failed attempts
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Seconds allowed for the handshake
    #[arg(long, default_value = "10")]
    handshake_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout is left to the data pipeline; logs go to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let keys = Arc::new(StaticKeys::from_hex(&args.auth_key, &args.channel_key)?);

    let config = ProducerConfig {
        retry: RetryPolicy {
            interval: Duration::from_secs(args.retry_interval_secs),
            max_attempts: args.max_attempts,
        },
        send_interval: Duration::from_millis(args.send_interval_ms),
        heartbeat_interval: Duration::from_secs(args.heartbeat_interval_secs.max(1)),
        handshake: HandshakeConfig {
            timeout: Duration::from_secs(args.handshake_timeout_secs),
            ..HandshakeConfig::default()
        },
    };

    tracing::info!("Producer connecting to {}", args.url);

    let client =
        ProducerClient::new(SystemEnv::new(), WebSocketConnector::new(args.url), keys, config);

    let cancel = client.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down");
            cancel.cancel();
        }
    });

    let mut source = JsonLinesSource::new(BufReader::new(tokio::io::stdin()));
    let summary = client.run(&mut source).await?;

    tracing::info!(
        sessions = summary.sessions,
        records_sent = summary.records_sent,
        "Producer finished"
    );

    Ok(())
}
