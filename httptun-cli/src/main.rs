//! httptun unified CLI
//!
//! A bidirectional TCP-over-HTTP tunnel: run an ingress relay (accepts
//! application TCP connections) or an egress relay (dials the target TCP
//! server), wired together by HTTP requests/callbacks.

// Use mimalloc as the global allocator for better performance
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "httptun",
    author,
    version,
    about = "Bidirectional TCP-over-HTTP tunnel",
    long_about = "httptun relays a TCP byte stream over an HTTP-only path between two \
                  network locations. Run `httptun ingress` where application clients \
                  connect, and `httptun egress` where the target TCP server lives.",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingress relay (accepts application TCP connections).
    Ingress(commands::ingress::IngressArgs),

    /// Run the egress relay (dials the target TCP server).
    Egress(commands::egress::EgressArgs),

    /// Show version information.
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ingress(args) => commands::ingress::run(args).await,
        Commands::Egress(args) => commands::egress::run(args).await,
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
