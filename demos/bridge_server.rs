//! Bridge server demo with a simulated telemetry feed
//!
//! Run with: cargo run --example bridge_server [BIND_ADDR] [SQLITE_PATH]
//!
//! Examples:
//!   cargo run --example bridge_server                      # 0.0.0.0:8080, in-memory store
//!   cargo run --example bridge_server localhost:9090       # custom address
//!   cargo run --example bridge_server 0.0.0.0:8080 tele.db # durable sqlite store
//!
//! A background task plays the role of the external broker callback and
//! publishes a temperature/humidity reading every second.
//!
//! ## Watch the live feed
//!
//!   cargo run --example live_tail ws://localhost:8080/ws
//!
//! ## Query history
//!
//!   curl 'http://localhost:8080/temperature?page=1'
//!   curl -X POST http://localhost:8080/humidity \
//!        -H 'content-type: application/json' \
//!        -d '{"start": "2020-01-01T00:00:00Z"}'

use std::net::SocketAddr;
use std::time::Duration;

use telebridge::{Bridge, BridgeConfig};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8080
/// - "localhost:9090" -> 127.0.0.1:9090
/// - "0.0.0.0:8080" -> 0.0.0.0:8080
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8080;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("telebridge=debug".parse()?)
                .add_directive("bridge_server=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let bind_addr = match args.get(1) {
        Some(arg) => parse_bind_addr(arg).map_err(|e| {
            eprintln!("Error: {}", e);
            e
        })?,
        None => "0.0.0.0:8080".parse().unwrap(),
    };

    let mut config = BridgeConfig::default().bind(bind_addr);
    if let Some(path) = args.get(2) {
        config = config.sqlite(path);
    }

    println!("Starting telemetry bridge on {}", config.bind_addr);
    println!();
    println!("=== Live feed ===");
    println!("ws://{}/ws", bind_addr);
    println!();
    println!("=== History ===");
    println!("curl 'http://{}/temperature?page=1'", bind_addr);
    println!();

    let bridge = Bridge::new(config).start().await?;

    // Simulated broker: publishes one reading per topic per second
    let ingest = bridge.ingest();
    let feed = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut tick: u64 = 0;
        loop {
            ticker.tick().await;
            tick += 1;
            let temperature = 20.0 + 5.0 * ((tick as f64) / 10.0).sin();
            let humidity = 50.0 + 10.0 * ((tick as f64) / 7.0).cos();

            if ingest
                .dispatch("temperature", format!("{:.2}", temperature))
                .await
                .is_err()
            {
                break;
            }
            if ingest
                .dispatch("humidity", format!("{:.2}", humidity))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");

    feed.abort();
    bridge.shutdown().await;
    Ok(())
}
