use clap::Parser;
use client::input::Autopilot;
use client::network::Client;
use shared::{Fabric, TcpFabric};
use std::sync::Arc;
use std::time::Duration;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Fabric address to join
    #[arg(short, long, default_value = "127.0.0.1:5672")]
    fabric: String,

    /// Milliseconds between prediction ticks
    #[arg(short, long, default_value = "40")]
    tick_ms: u64,

    /// Milliseconds between automated direction changes
    #[arg(short, long, default_value = "2000")]
    wander_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Joining fabric at {}", args.fabric);
    let fabric: Arc<dyn Fabric> = Arc::new(TcpFabric::connect(&args.fabric).await?);

    // Registration aborts the process on timeout; it is not retried.
    let mut client = Client::register(fabric, Duration::from_millis(args.tick_ms)).await?;

    let autopilot = Autopilot::spawn(
        client.direction_handle(),
        Duration::from_millis(args.wander_ms),
    );

    tokio::select! {
        _ = client.run() => {
            info!("Session ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, leaving the arena...");
        }
    }
    autopilot.abort();
    client.terminate();

    Ok(())
}
