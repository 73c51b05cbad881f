use color_eyre::eyre::{
    Result,
    eyre,
};
use pixel_pet::{
    client,
    config::{
        self,
        CliCommand,
    },
};
use std::path::Path;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

const LOG_ENV: &str = "PIXEL_PET_LOG";

/// The terminal belongs to the UI, so logs go to a daily file.
fn init_logging(data_dir: &Path) -> Result<WorkerGuard> {
    let appender = rolling::daily(data_dir.join("logs"), "pixel-pet.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!(e))?;
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let app_config = match config::parse_args(std::env::args().skip(1))? {
        CliCommand::Help => {
            println!("{}", config::USAGE);
            return Ok(());
        }
        CliCommand::Run(app_config) => app_config,
    };
    let _log_guard = init_logging(&app_config.data_dir)?;
    tracing::info!(network = ?app_config.network, "starting pixel-pet");
    client::run_app(app_config).await
}
