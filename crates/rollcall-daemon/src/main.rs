use std::time::Duration;

use clap::Parser;
use rollcall_core::FileConfig;

mod cli;
mod commands;
mod watch;

use cli::{Cli, Command, ConfigAction};

const DEFAULT_LOG_FILTER: &str = "rollcall=info,rollcall_core=info,rollcall_scheduler=info,\
rollcall_artemis=info,rollcall_upload=info,rollcall_jobs=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();
    // explicit --config / ROLLCALL_CONFIG > ~/.rollcall/rollcall.toml
    let config = FileConfig::at(cli.config.as_deref());

    match cli.command {
        Command::Run { watch_interval } => {
            commands::run(config, Duration::from_secs(watch_interval.max(1))).await
        }
        Command::SendCsv { date } => commands::send_csv(config, date).await,
        Command::Forward { date } => commands::forward(config, date).await,
        Command::Attendance { date } => commands::attendance(&config, date).await,
        Command::Persons => commands::persons(&config).await,
        Command::Schedule => commands::schedule(config),
        Command::Config { action } => match action {
            ConfigAction::Show => commands::config_show(&config),
            ConfigAction::Init { force } => commands::config_init(&config, force),
        },
    }
}
