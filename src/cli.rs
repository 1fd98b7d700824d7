//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Mirror files referenced by a remote change log.
///
/// Polls the change log list for entries newer than the last one seen and
/// downloads every referenced file with a bounded number of workers. Values
/// given here override the config file.
#[derive(Parser, Debug)]
#[command(name = "changelog-mirror")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/changelog-mirror/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Site hosting the change log list
    #[arg(short, long, value_name = "URL")]
    pub site: Option<String>,

    /// Title of the change log list [default: FileChangedLog]
    #[arg(long, value_name = "TITLE")]
    pub list: Option<String>,

    /// Account name used for the site and the downloads
    #[arg(long)]
    pub username: Option<String>,

    /// Account password
    #[arg(long)]
    pub password: Option<String>,

    /// Account domain
    #[arg(long)]
    pub domain: Option<String>,

    /// Concurrent downloads (0-100, 0 polls without downloading) [default: 2]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub concurrency: Option<u8>,

    /// Milliseconds between poll cycles [default: 60000]
    #[arg(short = 'i', long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: Option<u64>,

    /// Seconds covered by each download summary [default: 3600]
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub summary_interval: Option<u64>,

    /// Directory for temporary download files [default: system temp dir]
    #[arg(long, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// HTTP connect timeout in seconds (1-3600) [default: 30]
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// HTTP request timeout in seconds (1-3600) [default: 300]
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,

    /// Log every query and download instead of periodic summaries
    #[arg(short, long)]
    pub debug: bool,

    /// Run a single poll cycle, download what it found, and exit
    #[arg(long)]
    pub once: bool,
}
