use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
use cli::{Cli, Commands, cmd_auth, cmd_seed_demo, cmd_show, cmd_sync, load_config};

use event_cal_sync::storage::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    let result = match cli.command {
        Commands::Sync { dry_run, keep_going, calendar } => {
            cmd_sync(&config, dry_run, keep_going, calendar).await
        }
        Commands::Auth { reauth } => cmd_auth(&config, reauth).await,
        Commands::Show { id } => cmd_show(&config, id),
        Commands::SeedDemo => cmd_seed_demo(&config),
    };

    if let Err(e) = &result {
        tracing::error!("Command failed: {:#}", e);
    }
    result
}

fn setup_logging() {
    let log_dir = Config::config_dir();

    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "event-cal-sync.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .init();

    std::mem::forget(_guard);

    tracing::info!("event-cal-sync started");
}
