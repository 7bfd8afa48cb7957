//! Quarry CLI - Command-line interface for Quarry
//!
//! Runs research from the terminal, answering clarifying questions interactively

mod answers;

use anyhow::Context;
use clap::{Parser, Subcommand};
use quarry_core::{
    init_logging, log_operation_error, log_operation_start, log_operation_success, QuarryConfig,
};
use quarry_research::{
    create_orchestrator, ResearchError, ResearchOrchestrator, ResearchOutput, ResearchQuery,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Research a topic on the web and write a cited report")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Research a topic and write a markdown report
    Research {
        /// Topic to research
        topic: String,

        /// Skip clarifying questions and research the topic as stated
        #[arg(long)]
        no_clarify: bool,

        /// Write the markdown report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the structured report as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Show the clarifying questions for a topic
    Questions {
        /// Topic to research
        topic: String,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = QuarryConfig::load(cli.config.as_deref())?;

    let mut logging_config = config.logging.clone();
    if cli.verbose {
        logging_config.level = "debug".to_string();
    }
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting Quarry CLI v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Research {
            topic,
            no_clarify,
            output,
            json,
        } => {
            handle_research(&config, topic, no_clarify, output, json).await?;
        }
        Commands::Questions { topic } => {
            handle_questions(&config, topic).await?;
        }
        Commands::Config {
            show,
            init,
            validate,
        } => {
            handle_config(&config, show, init, validate)?;
        }
    }

    Ok(())
}

/// Cancel `token` on the first Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling research");
            token.cancel();
        }
    });
}

async fn handle_research(
    config: &QuarryConfig,
    topic: String,
    no_clarify: bool,
    output: Option<PathBuf>,
    json: Option<PathBuf>,
) -> anyhow::Result<()> {
    log_operation_start!("research", topic = %topic);

    let orchestrator = create_orchestrator(config)?;
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let result = if no_clarify {
        orchestrator
            .run_from_refined_query(ResearchQuery::new(topic.clone()), cancel)
            .await
    } else {
        orchestrator
            .with_answer_source(Arc::new(answers::stdin_answer_source()))
            .run_full_pipeline(&topic, cancel)
            .await
    };

    let research = match result {
        Ok(research) => research,
        Err(e) => {
            log_operation_error!("research", e, topic = %topic);
            if let ResearchError::Cancelled { stage } = &e {
                eprintln!("Research cancelled during {} stage", stage);
            }
            return Err(e.into());
        }
    };

    match &output {
        Some(path) => {
            write_file(path, &research.formatted_report).await?;
            println!("Report written to {}", path.display());
        }
        None => println!("{}", research.formatted_report),
    }

    if let Some(path) = &json {
        let body = serde_json::to_string_pretty(&research.report)?;
        write_file(path, &body).await?;
        println!("Structured report written to {}", path.display());
    }

    print_statistics(&research);
    log_operation_success!("research", topic = %topic);
    Ok(())
}

fn print_statistics(research: &ResearchOutput) {
    let metadata = &research.report.metadata;

    eprintln!("\nResearch completed");
    eprintln!("   • Sources used: {}", metadata.sources_used.len());
    eprintln!("   • Search queries: {}", metadata.search_queries.len());

    if let Some(metrics) = &metadata.usage_metrics {
        eprintln!("   • Tokens used: {}", metrics.total_tokens);
        eprintln!("   • Estimated cost: ${:.4}", metrics.cost_estimate);
        for (model, cost) in &metrics.by_model {
            eprintln!(
                "       {}: {} in / {} out",
                model, cost.input_tokens, cost.output_tokens
            );
        }
    }
}

async fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

async fn handle_questions(config: &QuarryConfig, topic: String) -> anyhow::Result<()> {
    log_operation_start!("clarifying_questions", topic = %topic);

    let orchestrator = create_orchestrator(config)?;
    let questions = orchestrator.get_clarifying_questions(&topic).await?;

    println!(
        "{}",
        ResearchOrchestrator::format_clarifying_prompt(&questions)
    );

    log_operation_success!("clarifying_questions", count = questions.len());
    Ok(())
}

fn handle_config(
    config: &QuarryConfig,
    show: bool,
    init: bool,
    validate: bool,
) -> anyhow::Result<()> {
    if init {
        let config_path = QuarryConfig::user_config_path()?;
        if config_path.exists() {
            println!("Configuration already exists at: {}", config_path.display());
        } else {
            if let Some(config_dir) = config_path.parent() {
                std::fs::create_dir_all(config_dir)
                    .with_context(|| format!("Failed to create {}", config_dir.display()))?;
            }
            QuarryConfig::default().save_to_file(&config_path)?;
            println!("Configuration initialized at: {}", config_path.display());
            println!("Edit the file to choose your provider, models and search endpoint.");
        }
    }

    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    if validate {
        match config.validate() {
            Ok(()) => println!("Configuration is valid"),
            Err(e) => {
                println!("Configuration validation failed: {}", e);
                for suggestion in e.suggestions() {
                    println!("  hint: {}", suggestion);
                }
                return Err(e.into());
            }
        }
    }

    if !(init || show || validate) {
        println!("Nothing to do; pass --init, --show or --validate");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_research_arguments() {
        let cli = Cli::try_parse_from([
            "quarry",
            "research",
            "AI in healthcare",
            "--no-clarify",
            "--output",
            "report.md",
        ])
        .unwrap();

        match cli.command {
            Commands::Research {
                topic,
                no_clarify,
                output,
                json,
            } => {
                assert_eq!(topic, "AI in healthcare");
                assert!(no_clarify);
                assert_eq!(output, Some(PathBuf::from("report.md")));
                assert!(json.is_none());
            }
            _ => panic!("Expected research command"),
        }
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from(["quarry", "-v", "-c", "custom.toml", "config", "--show"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Commands::Config { show: true, .. }));
    }

    #[test]
    fn test_research_requires_topic() {
        assert!(Cli::try_parse_from(["quarry", "research"]).is_err());
    }

    #[tokio::test]
    async fn test_write_file_creates_parent_directories() {
        let dir = std::env::temp_dir().join(format!("quarry-cli-{}", std::process::id()));
        let path = dir.join("nested").join("report.md");

        write_file(&path, "# Report").await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "# Report");

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
