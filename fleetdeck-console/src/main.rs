//! fleetdeck - operator console for provisioning and watching inference nodes.

use anyhow::Result;
use clap::Parser;

use fleetdeck_console::cli::{self, Cli};
use fleetdeck_console::logging::init_tracing;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    cli::run(cli).await
}
