use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use promptline::ContextStrategy;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cmd;

#[derive(Parser)]
#[command(name = "promptline")]
#[command(version, about = "Context-budgeted prompts and streaming replies for local LLMs")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Generation endpoint. Overrides promptline.toml and PROMPTLINE_ENDPOINT.
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Conversation inputs shared by `ask` and `assemble`.
#[derive(Args, Clone, Debug)]
pub struct PromptArgs {
    /// The new user message. Read from stdin when omitted.
    pub prompt: Option<String>,

    /// JSON file with earlier messages: [{"role": "user", "content": "..."}, ...]
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// File whose contents are offered to the model as retrieved context
    #[arg(long)]
    pub context_file: Option<PathBuf>,

    #[arg(short, long)]
    pub model: Option<String>,

    /// basic or advanced
    #[arg(long)]
    pub strategy: Option<ContextStrategy>,

    /// Replace the configured system prompt
    #[arg(long)]
    pub system: Option<String>,

    /// Ceiling on the context window, in tokens
    #[arg(long)]
    pub context_limit: Option<usize>,

    /// Drop older history instead of summarizing it
    #[arg(long)]
    pub no_summarize: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a message and stream the reply
    Ask {
        #[command(flatten)]
        args: PromptArgs,

        /// Print each stream event as one JSON line
        #[arg(long)]
        json: bool,
    },
    /// Show the budget and the assembled prompt without generating
    Assemble {
        #[command(flatten)]
        args: PromptArgs,
    },
    /// Show the effective context limit for a model
    Limit {
        model: String,

        /// Ceiling to combine with the detected limit (defaults to configuration)
        #[arg(long)]
        user_limit: Option<usize>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default promptline.toml file
    Init,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "warn,promptline=debug" } else { "warn" };
    let filter = if verbose {
        EnvFilter::new(default_filter)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let endpoint = cli.endpoint.as_deref();

    match &cli.command {
        Commands::Ask { args, json } => {
            cmd::cmd_ask(&project_dir, endpoint, args, *json).await?;
        }
        Commands::Assemble { args } => {
            cmd::cmd_assemble(&project_dir, endpoint, args).await?;
        }
        Commands::Limit { model, user_limit } => {
            cmd::cmd_limit(&project_dir, endpoint, model, *user_limit).await?;
        }
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
