//! Skylink coordinator binary.
//!
//! # Usage
//!
//! ```bash
//! # Keys as hex, from the environment
//! SKYLINK_AUTH_KEY=... SKYLINK_CHANNEL_KEY=... skylink-server --bind 0.0.0.0:8000
//!
//! # Tear a producer down after 5 undecryptable envelopes in a row
//! skylink-server --auth-key ... --channel-key ... --max-decrypt-failures 5
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use skylink_core::{handshake::HandshakeConfig, keys::StaticKeys};
use skylink_server::{CoordinatorConfig, DEFAULT_BIND_ADDRESS, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Skylink telemetry coordinator
#[derive(Parser, Debug)]
#[command(name = "skylink-server")]
#[command(about = "Authenticated telemetry relay coordinator")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = DEFAULT_BIND_ADDRESS)]
    bind: String,

    /// Authentication key (hex)
    #[arg(long, env = "SKYLINK_AUTH_KEY", hide_env_values = true)]
    auth_key: String,

    /// Channel key (hex, 32 bytes)
    #[arg(long, env = "SKYLINK_CHANNEL_KEY", hide_env_values = true)]
    channel_key: String,

    /// Seconds a producer has to complete the handshake
    #[arg(long, default_value = "10")]
    handshake_timeout_secs: u64,

    /// Accepted token clock skew in seconds
    #[arg(long, default_value = "30")]
    token_window_secs: u64,

    /// Milliseconds a subscriber may take to accept one record
    #[arg(long, default_value = "1000")]
    fanout_timeout_ms: u64,

    /// Milliseconds a new connection has to present a token
    #[arg(long, default_value = "1000")]
    classify_timeout_ms: u64,

    /// Seconds of producer silence (no record, no heartbeat) before it is dropped
    #[arg(long, default_value = "20")]
    producer_idle_timeout_secs: u64,

    /// Close the producer after this many undecryptable envelopes in a row
    #[arg(long)]
    max_decrypt_failures: Option<u32>,

    /// Drop records sealed more than this many seconds ago
    #[arg(long)]
    max_record_age_secs: Option<u64>,

    /// Seconds between status log lines (0 disables)
    #[arg(long, default_value = "30")]
    status_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Skylink coordinator starting");

    let keys = Arc::new(StaticKeys::from_hex(&args.auth_key, &args.channel_key)?);

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        coordinator: CoordinatorConfig {
            handshake: HandshakeConfig {
                timeout: Duration::from_secs(args.handshake_timeout_secs),
                token_window_secs: args.token_window_secs,
            },
            classify_timeout: Duration::from_millis(args.classify_timeout_ms),
            fanout_timeout: Duration::from_millis(args.fanout_timeout_ms),
            producer_idle_timeout: Duration::from_secs(args.producer_idle_timeout_secs),
            max_consecutive_decrypt_failures: args.max_decrypt_failures,
            max_record_age: args.max_record_age_secs.map(Duration::from_secs),
        },
        ..Default::default()
    };

    let server = Server::bind(config, keys).await?;
    let coordinator = server.coordinator();

    tracing::info!("Server listening on {}", server.local_addr()?);

    if args.status_interval_secs > 0 {
        let coordinator = server.coordinator();
        let period = Duration::from_secs(args.status_interval_secs);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match serde_json::to_string(&coordinator.status()) {
                    Ok(status) => tracing::info!(%status, "coordinator status"),
                    Err(e) => tracing::warn!(error = %e, "status serialization failed"),
                }
            }
        });
    }

    tokio::select! {
        result = server.run() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Shutting down");
            coordinator.shutdown();
        },
    }

    Ok(())
}
