mod check;
mod config;
mod logging;
mod run;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use coderecap_redact::RedactionTier;

use crate::config::RecapConfig;
use crate::logging::{init_tracing, LogFormat};
use crate::run::RunArgs;

#[derive(Parser)]
#[command(
    name = "coderecap",
    about = "Recap your AI coding sessions across agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Working directory (defaults to current directory)
    #[arg(short = 'd', long, global = true)]
    working_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormatChoice>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest all agent sources and write a normalized report
    Run {
        /// Limit to one calendar year (shorthand for --since/--until)
        #[arg(short, long)]
        year: Option<i32>,

        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,

        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,

        /// Offset the day bounds are interpreted in (+HH:MM, -HH:MM, or UTC)
        #[arg(long)]
        timezone: Option<String>,

        /// Redaction tier applied to every session
        #[arg(long, value_enum)]
        redaction: Option<TierChoice>,

        /// Report file path (defaults to coderecap-<window>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the report to stdout instead of writing a file
        #[arg(long)]
        json: bool,
    },
    /// Probe each agent's source location without ingesting
    Check {
        /// Print probe results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TierChoice {
    Strict,
    Normal,
    Full,
}

impl From<TierChoice> for RedactionTier {
    fn from(choice: TierChoice) -> Self {
        match choice {
            TierChoice::Strict => RedactionTier::Strict,
            TierChoice::Normal => RedactionTier::Normal,
            TierChoice::Full => RedactionTier::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let working_dir = cli
        .working_dir
        .unwrap_or_else(|| std::env::current_dir().expect("Failed to get current directory"));
    let config = RecapConfig::load(&working_dir)?.unwrap_or_default();

    let format = match cli.log_format {
        Some(choice) => LogFormat::from(choice),
        None => match config.log.format.as_deref() {
            Some(raw) => raw
                .parse()
                .map_err(|err: String| anyhow::anyhow!("{} in [log] format", err))?,
            None => LogFormat::Pretty,
        },
    };
    let level = config.log.level.as_deref().unwrap_or("info");
    init_tracing(level, format);

    match cli.command {
        Commands::Run {
            year,
            since,
            until,
            timezone,
            redaction,
            output,
            json,
        } => {
            let args = RunArgs {
                year,
                since,
                until,
                timezone,
                redaction: redaction.map(RedactionTier::from),
                output,
                json,
            };
            run::handle_run(args, &config).await
        }
        Commands::Check { json } => check::handle_check(&config, json),
    }
}
