//! Command-line flags. Values given here override the config file.

use std::path::PathBuf;

use clap::Parser;

/// Web UI for browsing a keepsake experiment repository
#[derive(Parser, Debug, Default)]
#[command(name = "keepsake-ui")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address port bind (default 0.0.0.0:8080)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Keepsake repository, e.g. file:///data/keepsake
    #[arg(short, long)]
    pub repository: Option<String>,

    /// Path to a TOML config file (or set KEEPSAKE_UI_CONFIG)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Runtime worker threads (default 1)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Log every daemon write
    #[arg(long)]
    pub debug: bool,
}
