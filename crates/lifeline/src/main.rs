//! Lifeline binary.
//!
//! Loads configuration, prepares the sandbox and serves console commands
//! until stdin closes or Ctrl-C is pressed.

use clap::Parser;
use lifeline::{
    Cli, ConsoleResponder, ConsoleSource, LoggingOptions, build_executor, build_server,
    console_principal, init_logging,
};
use lifeline_bot::LifelineConfig;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = LifelineConfig::load(cli.config.as_deref())?;

    let logging = LoggingOptions::new(config.logging.level.clone())
        .with_verbose(cli.verbose)
        .with_json(cli.json_logs || config.logging.json);
    init_logging(&logging)?;

    let principal = console_principal(&config, cli.principal)
        .ok_or("no console principal: pass --principal or allowlist one")?;

    let executor = Arc::new(build_executor(&config).await?);
    let responder = Arc::new(ConsoleResponder::stdout());
    let server = build_server(&config, executor, responder)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for interrupt");
                // Dropping the sender would stop the server
                std::future::pending::<()>().await;
            }
        }
    });

    info!(%principal, mode = %config.security.default_mode, "Lifeline console ready");
    let handled = server.run(ConsoleSource::stdin(principal), shutdown_rx).await;
    info!(handled, "Lifeline exiting");

    Ok(())
}
