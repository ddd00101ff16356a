use clap::Parser;
use color_eyre::Result;
use serial_bridge::{cli, logging, server};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let mut cli = cli::Cli::parse();

    if let Some(command) = cli.command.take() {
        cli::handle_command(command);

        return Ok(());
    }

    let file_logging = cli.log_dir.clone().map(|dir| (cli.log_level, dir));
    logging::init(cli.log_level, file_logging).await;

    debug!(config_path = ?cli.config, "Resolving config");
    let config = cli.effective_config();

    #[cfg(unix)]
    let mut hangup = signal(SignalKind::hangup())?;

    #[cfg(unix)]
    let hangup = hangup.recv();

    #[cfg(not(unix))]
    let hangup = std::future::pending::<Option<()>>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C, quitting")
        }
        _ = hangup => {
            info!("Told to hang up, quitting")
        }
        result = server::run(config) => {
            error!("Server returned");
            result?;
            return Err(color_eyre::eyre::eyre!("Server stopped unexpectedly"));
        }
    }

    logging::shutdown();

    Ok(())
}
