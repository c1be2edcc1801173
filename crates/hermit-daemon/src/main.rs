//! Companion daemon for the hermit CLI.
//!
//! ```sh
//! hermit-daemon
//! hermit-daemon --bind 127.0.0.1:9000
//! RUST_LOG=debug hermit-daemon
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::process;
use tracing_subscriber::EnvFilter;

/// Companion daemon for the hermit CLI.
#[derive(Parser)]
#[command(name = "hermit-daemon")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if let Err(e) = hermit_daemon::serve(hermit_daemon::build_router(), args.bind).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
