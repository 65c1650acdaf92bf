use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wapull_core::{HarvestConfig, Settings};

mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "wapull")]
#[command(about = "Harvest WhatsApp conversations from SendPulse.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every chat and message, then write JSON, CSV and charts
    Harvest {
        /// Output directory
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Authenticate and resolve the chat and message endpoints only
    Probe {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Rebuild the summary CSV and charts from a saved messages file
    Summarize {
        /// A messages.raw.json written by a previous harvest
        #[arg(long, value_name = "FILE")]
        messages: PathBuf,

        /// Output directory (defaults to the messages file's directory)
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
}

/// Flags shared by commands that talk to the API. Unset flags fall back to
/// the environment, then the config file.
#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Config file (defaults to ./wapull.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bot to harvest; the account's first bot is used when omitted
    #[arg(long, value_name = "ID")]
    bot_id: Option<String>,

    /// Lower date bound, passed to the API verbatim
    #[arg(long)]
    since: Option<String>,

    /// Upper date bound, passed to the API verbatim
    #[arg(long)]
    until: Option<String>,

    /// Cap on items per paginated listing
    #[arg(long, value_name = "N")]
    max_items: Option<usize>,

    /// Items requested per page
    #[arg(long, value_name = "N")]
    page_size: Option<usize>,

    /// Chats fetched at the same time
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Debug logs, endpoint files and per-chat failure details
    #[arg(long, short)]
    verbose: bool,
}

impl RunArgs {
    fn overrides(&self, out_dir: Option<PathBuf>) -> Settings {
        Settings {
            bot_id: self.bot_id.clone(),
            since: self.since.clone(),
            until: self.until.clone(),
            verbose: self.verbose.then_some(true),
            page_size: self.page_size,
            max_items: self.max_items,
            concurrency: self.concurrency,
            out_dir,
            ..Settings::default()
        }
    }

    fn load(&self, out_dir: Option<PathBuf>) -> Result<HarvestConfig> {
        let config = HarvestConfig::load(self.config.as_deref(), self.overrides(out_dir))?;
        Ok(config)
    }
}

/// Harvest progress is logged at info; `-v` lowers the wapull crates to debug.
/// Everything else stays at warn unless `RUST_LOG` says otherwise.
fn log_filter(base: EnvFilter, verbose: bool) -> Result<EnvFilter> {
    let level = if verbose { "debug" } else { "info" };
    let mut filter = base.add_directive(tracing::Level::WARN.into());
    for krate in ["wapull_core", "wapull_report", "wapull_auth_bridge"] {
        filter = filter.add_directive(format!("{}={}", krate, level).parse()?);
    }
    Ok(filter)
}

fn init_tracing(verbose: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(EnvFilter::from_default_env(), verbose)?)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Harvest { out, run } => {
            let config = run.load(out)?;
            init_tracing(config.verbose)?;
            commands::harvest::run(config).await
        }
        Commands::Probe { run } => {
            let config = run.load(None)?;
            init_tracing(config.verbose)?;
            commands::probe::run(config).await
        }
        Commands::Summarize { messages, out } => {
            init_tracing(false)?;
            commands::summarize::run(&messages, out)
        }
    }
}
