//! Subcommand handlers for the Scrivener CLI.

use crate::feedback::TerminalFeedback;
use crate::progress::CliProgress;
use crate::{Commands, ConfigAction};
use scrivener_core::research::feedback_prompt;
use scrivener_core::{
    AutoApprove, ConfigOverrides, FeedbackChannel, FeedbackResponse, ReportConfig, ReportPhase,
    ReportPipeline, ReportSession,
};
use std::path::Path;
use std::sync::Arc;

pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_file: Option<&Path>,
    overrides: &ConfigOverrides,
    quiet: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace, config_file, overrides),
        Commands::Sessions => {
            let config = load(workspace, config_file, overrides)?;
            handle_sessions(&config.sessions_dir(workspace))
        }
        Commands::Run { topic, output, yes } => {
            let config = load(workspace, config_file, overrides)?;
            let pipeline = build_pipeline(&config, workspace, quiet)?;
            let channel: Box<dyn FeedbackChannel> = if yes {
                Box::new(AutoApprove)
            } else {
                Box::new(TerminalFeedback)
            };
            let session = pipeline.run(&topic, channel.as_ref()).await?;
            emit_report(&session, output.as_deref())
        }
        Commands::Plan { topic } => {
            let config = load(workspace, config_file, overrides)?;
            let pipeline = build_pipeline(&config, workspace, quiet)?;
            let session = pipeline.plan(&topic).await?;
            print_review(&session);
            Ok(())
        }
        Commands::Resume {
            session,
            approve,
            feedback,
            output,
        } => {
            let config = load(workspace, config_file, overrides)?;
            let sessions_dir = config.sessions_dir(workspace);
            let saved = ReportSession::load(&sessions_dir, &session)?;
            let response = match (approve, feedback) {
                (true, _) => FeedbackResponse::Approve,
                (false, Some(text)) => FeedbackResponse::Revise(text),
                (false, None) => anyhow::bail!("Pass --approve or --feedback <text>"),
            };

            let pipeline = build_pipeline(&config, workspace, quiet)?;
            let session = pipeline.resume(saved, response).await?;
            if session.phase == ReportPhase::AwaitingFeedback {
                print_review(&session);
                Ok(())
            } else {
                emit_report(&session, output.as_deref())
            }
        }
    }
}

fn load(
    workspace: &Path,
    config_file: Option<&Path>,
    overrides: &ConfigOverrides,
) -> anyhow::Result<ReportConfig> {
    scrivener_core::load_config(Some(workspace), config_file, Some(overrides))
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

fn build_pipeline(
    config: &ReportConfig,
    workspace: &Path,
    quiet: bool,
) -> anyhow::Result<ReportPipeline> {
    let pipeline = ReportPipeline::from_config(config)?
        .with_callback(Arc::new(CliProgress::new(quiet)))
        .with_sessions_dir(config.sessions_dir(workspace));
    Ok(pipeline)
}

fn print_review(session: &ReportSession) {
    if let Some(plan) = &session.plan {
        println!("{}", feedback_prompt(plan));
    }
    println!();
    println!("Session: {}", session.id);
    println!(
        "Approve with `scrivener resume {} --approve` or revise with `--feedback \"...\"`",
        session.id
    );
}

fn emit_report(session: &ReportSession, output: Option<&Path>) -> anyhow::Result<()> {
    let report = session
        .report
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Session {} finished without a report", session.id))?;
    match output {
        Some(path) => {
            std::fs::write(path, report)?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{}", report),
    }
    Ok(())
}

fn handle_sessions(sessions_dir: &Path) -> anyhow::Result<()> {
    let sessions = ReportSession::list(sessions_dir)?;
    if sessions.is_empty() {
        println!("No saved sessions in {}", sessions_dir.display());
        return Ok(());
    }

    println!("Sessions ({}):", sessions.len());
    for summary in sessions {
        let id = summary.id.to_string();
        println!(
            "  {}  {:<17}  {:>2} sections  {}  {}",
            &id[..8],
            summary.phase.to_string(),
            summary.sections,
            summary.updated_at.format("%Y-%m-%d %H:%M"),
            summary.topic
        );
    }
    Ok(())
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_file: Option<&Path>,
    overrides: &ConfigOverrides,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".scrivener");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&ReportConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, config_file, overrides)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn run(command: Commands, workspace: &Path) -> anyhow::Result<()> {
        handle_command(command, workspace, None, &ConfigOverrides::default(), true).await
    }

    #[tokio::test]
    async fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        run(
            Commands::Config {
                action: ConfigAction::Init,
            },
            workspace,
        )
        .await
        .unwrap();

        let config_path = workspace.join(".scrivener").join("config.toml");
        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: ReportConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.number_of_queries, 2);
        assert_eq!(parsed.max_search_depth, 2);
    }

    #[tokio::test]
    async fn test_config_init_idempotent() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();
        let config_path = workspace.join(".scrivener").join("config.toml");

        run(
            Commands::Config {
                action: ConfigAction::Init,
            },
            workspace,
        )
        .await
        .unwrap();
        std::fs::write(&config_path, "number_of_queries = 5\n").unwrap();

        run(
            Commands::Config {
                action: ConfigAction::Init,
            },
            workspace,
        )
        .await
        .unwrap();
        assert_eq!(
            std::fs::read_to_string(&config_path).unwrap(),
            "number_of_queries = 5\n"
        );
    }

    #[tokio::test]
    async fn test_sessions_lists_saved_sessions() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();
        let sessions_dir = workspace.join(".scrivener").join("sessions");
        ReportSession::new("Quantum Computing")
            .save(&sessions_dir)
            .unwrap();

        run(Commands::Sessions, workspace).await.unwrap();
    }

    #[tokio::test]
    async fn test_resume_unknown_session_fails() {
        let dir = TempDir::new().unwrap();
        let result = run(
            Commands::Resume {
                session: "deadbeef".into(),
                approve: true,
                feedback: None,
                output: None,
            },
            dir.path(),
        )
        .await;
        assert!(result.unwrap_err().to_string().contains("deadbeef"));
    }

    #[test]
    fn test_emit_report_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.md");
        let mut session = ReportSession::new("Topic");
        session.report = Some("# Report\n\nBody.".into());

        emit_report(&session, Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Report\n\nBody.");
    }

    #[test]
    fn test_emit_report_requires_report() {
        let session = ReportSession::new("Topic");
        assert!(emit_report(&session, None).is_err());
    }
}
