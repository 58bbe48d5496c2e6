//! CLI surface for the headless runner. No subcommands, no banners — there's
//! no config-management UX to expose here, just flags for one run.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "dorkswarm", about = "Concurrent dork-scraping execution core")]
pub struct Cli {
    /// Proxy list file, one entry per line.
    #[arg(long, value_name = "FILE")]
    pub proxies: PathBuf,

    /// Dork list file, one query per line.
    #[arg(long, value_name = "FILE")]
    pub dorks: PathBuf,

    /// Config file path; defaults to `~/.config/dorkswarm/config.toml`.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Overrides `RUST_LOG`/the configured default log level.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Overrides the scheduler's configured max concurrency.
    #[arg(long, value_name = "N")]
    pub max_concurrency: Option<usize>,
}
