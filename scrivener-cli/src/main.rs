//! Scrivener CLI: research report generation from the terminal.

mod commands;
mod feedback;
mod progress;

use clap::Parser;
use scrivener_core::ConfigOverrides;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Scrivener: plan, research, and write Markdown reports
#[derive(Parser, Debug)]
#[command(name = "scrivener", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Search backend: tavily, exa, arxiv, duckduckgo, google
    #[arg(long, global = true)]
    search_api: Option<String>,

    /// Maximum search rounds per section
    #[arg(long, global = true)]
    max_search_depth: Option<usize>,

    /// Search queries generated per round
    #[arg(long, global = true)]
    queries: Option<usize>,

    /// Model used for planning and grading
    #[arg(long, global = true)]
    planner_model: Option<String>,

    /// Model used for queries and drafting
    #[arg(long, global = true)]
    writer_model: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            search_api: self.search_api.clone(),
            number_of_queries: self.queries,
            max_search_depth: self.max_search_depth,
            planner_model: self.planner_model.clone(),
            writer_model: self.writer_model.clone(),
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Generate a report, reviewing the plan interactively
    Run {
        /// Report topic
        topic: String,
        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Approve the first plan without review
        #[arg(short, long)]
        yes: bool,
    },
    /// Generate a plan and save the session for later review
    Plan {
        /// Report topic
        topic: String,
    },
    /// Answer the plan review of a saved session
    Resume {
        /// Session id or unique prefix
        session: String,
        /// Approve the plan and write the report
        #[arg(long, conflicts_with = "feedback", required_unless_present = "feedback")]
        approve: bool,
        /// Ask for a revised plan
        #[arg(long)]
        feedback: Option<String>,
        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List saved sessions
    Sessions,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default workspace configuration file
    Init,
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "scrivener", "scrivener")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "scrivener.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let overrides = cli.overrides();

    commands::handle_command(
        cli.command,
        &workspace,
        cli.config.as_deref(),
        &overrides,
        cli.quiet,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "scrivener",
            "--search-api",
            "arxiv",
            "--max-search-depth",
            "3",
            "run",
            "Quantum Computing",
            "--yes",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.search_api.as_deref(), Some("arxiv"));
        assert_eq!(overrides.max_search_depth, Some(3));
        assert!(matches!(cli.command, Commands::Run { yes: true, .. }));
    }

    #[test]
    fn test_resume_requires_a_response() {
        assert!(Cli::try_parse_from(["scrivener", "resume", "abc123"]).is_err());
        assert!(
            Cli::try_parse_from(["scrivener", "resume", "abc123", "--approve", "--feedback", "x"])
                .is_err()
        );
        let cli = Cli::try_parse_from([
            "scrivener",
            "resume",
            "abc123",
            "--feedback",
            "add more about error correction",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Resume { approve: false, feedback: Some(_), .. }
        ));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["scrivener", "sessions", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
