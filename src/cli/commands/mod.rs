//! CLI parser and command dispatch.

mod config_cmd;
mod crawl;
mod reindex;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "staffcrawl")]
#[command(about = "Employee directory crawler and profile extractor")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Output root for records and images (overrides config file)
    #[arg(long, global = true, env = "STAFFCRAWL_SITE_ROOT")]
    site_root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(clap::Args, Debug, Default)]
pub struct CrawlArgs {
    /// Directory listing URL to start from
    #[arg(long, env = "STAFFCRAWL_BASE_URL")]
    pub base_url: Option<String>,

    /// Run the browser headless
    #[arg(
        long,
        env = "STAFFCRAWL_HEADLESS",
        num_args = 0..=1,
        default_missing_value = "true",
        conflicts_with = "headed"
    )]
    pub headless: Option<bool>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Stop after this many profiles (0 = all)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Write DOM snapshots and screenshots for troubleshooting
    #[arg(long)]
    pub debug: bool,

    /// Skip profile image downloads
    #[arg(long)]
    pub no_images: bool,

    /// Credentials JSON file (email/password)
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Never prompt for credentials
    #[arg(long)]
    pub no_prompt: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the directory and write one JSON record per person
    Crawl(CrawlArgs),

    /// Rebuild the record index from the files on disk
    Reindex,

    /// Show the resolved configuration
    Config,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
    };
    let (mut settings, config) = load_settings_with_options(options).await;
    if let Some(root) = cli.site_root {
        settings.debug_dir = root.join("debug");
        settings.site_root = root;
    }

    match cli.command {
        Commands::Crawl(args) => crawl::cmd_crawl(settings, args).await,
        Commands::Reindex => reindex::cmd_reindex(&settings).await,
        Commands::Config => config_cmd::cmd_config_show(&settings, &config).await,
    }
}
