//! Serve command - run the HTTP API until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Args;
use relieftiles::app::ReliefTilesApp;
use relieftiles::config::ConfigFile;
use relieftiles::server;

use super::common::{interrupt_signal, runtime};
use crate::error::CliError;

/// Arguments for the serve command.
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to listen on (overrides [server] bind)
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

/// Run the serve command.
pub fn run(args: ServeArgs, mut config: ConfigFile) -> Result<(), CliError> {
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    runtime()?.block_on(serve(config))
}

async fn serve(config: ConfigFile) -> Result<(), CliError> {
    let server_config = config.server_config();
    let app = ReliefTilesApp::start(config)?;

    println!("Tile store: {}", app.store().base_dir().display());
    println!(
        "Layers:     {}",
        app.manager().orchestrator().layers().names().join(", ")
    );
    println!("Listening:  http://{}", server_config.bind);
    println!();
    println!("Press Ctrl+C to stop");

    let interrupt = interrupt_signal()?;
    let shutdown = async move {
        interrupt.notified().await;
        println!();
        println!("Received shutdown signal, stopping...");
    };

    server::serve(&server_config, Arc::clone(app.manager()), shutdown).await?;
    Ok(())
}
