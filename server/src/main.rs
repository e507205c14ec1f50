use clap::Parser;
use log::info;
use server::game::initial_foods;
use server::network::Server;
use shared::{Fabric, FabricHost, TcpFabric, World};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to host the messaging fabric on
    #[arg(short, long, default_value = "127.0.0.1:5672")]
    listen: String,

    /// Join an existing fabric at this address instead of hosting one
    #[arg(short, long)]
    join: Option<String>,

    /// Milliseconds between authoritative ticks
    #[arg(short, long, default_value = "30")]
    tick_ms: u64,

    /// Arena width
    #[arg(long, default_value = "1000")]
    width: u32,

    /// Arena height
    #[arg(long, default_value = "1000")]
    height: u32,

    /// Food pellets scattered at startup
    #[arg(short, long, default_value = "150")]
    foods: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    // Fabric unreachable at startup is fatal; everything after this is
    // best-effort.
    let endpoint = match &args.join {
        Some(addr) => addr.clone(),
        None => {
            let host = FabricHost::bind(&args.listen).await?;
            info!("Hosting fabric on {}", args.listen);
            tokio::spawn(host.run());
            args.listen.clone()
        }
    };
    let fabric: Arc<dyn Fabric> = Arc::new(TcpFabric::connect(&endpoint).await?);

    let world = World::new(
        args.width,
        args.height,
        Vec::new(),
        initial_foods(args.foods, args.width, args.height),
    );
    let mut server = Server::new(fabric, world, Duration::from_millis(args.tick_ms))?;

    tokio::select! {
        _ = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }
    server.shutdown();

    Ok(())
}
