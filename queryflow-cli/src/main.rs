use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use queryflow::capabilities::registry_from_config;
use queryflow::config::AppConfig;
use queryflow::events::LoggingEventSink;
use queryflow::observability::init_tracing;
use queryflow::pipeline::PipelineOrchestrator;
use queryflow::session::{open_from_config, serve_stdio, with_session};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "queryflow")]
#[command(about = "Answer natural-language questions over a SQL database")]
struct Args {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a question and print the answer
    Ask {
        /// The question in natural language
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Serve the pipeline stages as JSON-RPC on stdin/stdout
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let config = AppConfig::from_env().context("Invalid configuration")?;

    match args.command {
        Command::Ask { question } => ask(&config, &question.join(" ")).await,
        Command::Serve => serve(&config).await,
    }
}

async fn ask(config: &AppConfig, question: &str) -> Result<()> {
    let session = open_from_config(config)
        .await
        .context("Failed to open stage session")?;
    let pipeline_config = config.pipeline_config();

    let answer = with_session(session, |session| async move {
        let orchestrator = PipelineOrchestrator::new(session)
            .with_config(pipeline_config)
            .with_event_sink(Arc::new(LoggingEventSink::debug()));

        if let Err(e) = orchestrator.verify_capabilities().await {
            tracing::warn!(error = %e, "Stage server is missing capabilities");
        }
        orchestrator.ask(question).await
    })
    .await;

    println!("{answer}");
    Ok(())
}

async fn serve(config: &AppConfig) -> Result<()> {
    let registry = registry_from_config(config).context("Failed to build stages")?;
    info!(stages = registry.len(), "Serving stages on stdio");
    serve_stdio(Arc::new(registry)).await?;
    Ok(())
}
