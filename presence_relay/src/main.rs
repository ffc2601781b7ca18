// CLI entry point for the presence relay.
//
// Starts a standalone relay server and blocks until the process is killed.
// See `server.rs` for the networking architecture and `relay.rs` for the
// message protocol.
//
// Usage:
//   relay [OPTIONS]
//     --port <PORT>     Listen port (env PORT, default 90)
//     --bind <ADDR>     Listen address (env BIND_ADDRESS, default 0.0.0.0)
//     --seed <SEED>     Fixed seed for session/client ids
//     -v, --verbose     Debug logging (RUST_LOG overrides)

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use presence_relay::config::{DEFAULT_BIND_ADDRESS, DEFAULT_PORT, RelayConfig};
use presence_relay::start_relay;

#[derive(Parser, Debug)]
#[command(
    name = "relay",
    version,
    about = "Relay that syncs presence state between session members"
)]
struct Cli {
    /// Listen port
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Listen address
    #[arg(long, env = "BIND_ADDRESS", default_value = DEFAULT_BIND_ADDRESS)]
    bind: String,

    /// Seed for session and client ids (reproducible ids, for debugging)
    #[arg(long)]
    seed: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = RelayConfig {
        bind_address: cli.bind,
        port: cli.port,
        id_seed: cli.seed,
    };
    let (handle, addr) = start_relay(config.clone()).with_context(|| {
        format!(
            "failed to start relay on {}:{}",
            config.bind_address, config.port
        )
    })?;

    tracing::info!(%addr, "press Ctrl+C to stop");
    handle.wait();
    Ok(())
}
