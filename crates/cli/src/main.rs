//! aegent CLI - the main entry point.
//!
//! Commands:
//! - `onboard` - Write a default config file
//! - `chat` - Tool-calling agent, interactive or single-message
//! - `ask` - Answer a question from the scripting documentation
//! - `doctor` - Check keys, search backend and host bridge
//! - `catalog` - List the host tool catalog
//! - `providers` - List model families and configured models

use aegent_core::provider::ModelKind;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "aegent",
    about = "aegent — tool-calling scripting assistant for After Effects",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Onboard,

    /// Chat with the agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Model family: gemini, openai or claude
        #[arg(long, env = "AEGENT_MODEL")]
        model: Option<ModelKind>,

        /// Record tool calls instead of sending them to the host bridge
        #[arg(long)]
        dry_run: bool,

        /// Stream model output as it arrives
        #[arg(long)]
        stream: bool,

        /// Don't offer the documentation search tool
        #[arg(long)]
        no_docs: bool,
    },

    /// Answer a question from the scripting documentation
    Ask {
        question: String,

        /// Model family: gemini, openai or claude
        #[arg(long, env = "AEGENT_MODEL")]
        model: Option<ModelKind>,
    },

    /// Diagnose configuration and collaborator health
    Doctor,

    /// List the host tool catalog
    Catalog,

    /// List model families and configured models
    Providers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run()?,
        Commands::Chat {
            message,
            model,
            dry_run,
            stream,
            no_docs,
        } => {
            commands::chat::run(commands::chat::ChatOptions {
                message,
                model,
                dry_run,
                stream,
                no_docs,
            })
            .await?
        }
        Commands::Ask { question, model } => commands::ask::run(&question, model).await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Catalog => commands::catalog::run()?,
        Commands::Providers => commands::providers::run()?,
    }

    Ok(())
}
