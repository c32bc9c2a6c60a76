use clap::Parser;

/// Cron scheduler daemon.
#[derive(Parser, Debug)]
#[command(name = "cronbind")]
#[command(about = "Runs declared jobs on their cron schedules")]
#[command(version)]
pub(crate) struct Cli {
    /// Config file path (falls back to CRONBIND_CONFIG, then ~/.cronbind/cronbind.toml)
    #[arg(short, long)]
    pub config: Option<String>,

    /// SQLite job store path; overrides `[database] path`
    #[arg(long)]
    pub db: Option<String>,
}
