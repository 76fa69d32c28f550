use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Scheduled attendance delivery to a remote collector.
#[derive(Parser, Debug)]
#[command(name = "rollcall", version, about)]
pub struct Cli {
    /// Path to rollcall.toml (default: ~/.rollcall/rollcall.toml).
    #[arg(long, global = true, env = "ROLLCALL_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the configured integration on its schedule until interrupted.
    Run {
        /// Seconds between configuration file checks.
        #[arg(long, default_value_t = 5)]
        watch_interval: u64,
    },

    /// Upload the day's CSV export once.
    SendCsv {
        /// Day to upload (YYYY-MM-DD), default today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Fetch attendance from the gateway and forward it once.
    Forward {
        /// Day to forward (YYYY-MM-DD), default today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Print the day's attendance records as JSON without forwarding them.
    Attendance {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Print the gateway's person list.
    Persons,

    /// Print the schedule the current configuration produces.
    Schedule,

    /// Inspect or create the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Write a configuration file with default values.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}
