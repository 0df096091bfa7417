//! Live feed tail demo
//!
//! Connects to a running bridge's WebSocket endpoint and prints every
//! telemetry message as it is fanned out.
//!
//! Run with: cargo run --example live_tail [URL]
//!
//!   cargo run --example live_tail                          # ws://localhost:8080/ws
//!   cargo run --example live_tail ws://127.0.0.1:9090/ws

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://localhost:8080/ws".to_string());

    println!("Connecting to {}", url);
    let (mut socket, _) = tokio_tungstenite::connect_async(&url).await?;
    println!("Connected, waiting for messages (Ctrl+C to quit)");

    loop {
        tokio::select! {
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => println!("{}", text),
                Some(Ok(Message::Close(_))) | None => {
                    println!("Server closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    eprintln!("Connection error: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                socket.close(None).await.ok();
                break;
            }
        }
    }

    Ok(())
}
