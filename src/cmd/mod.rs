//! CLI command implementations.
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `ask`      | `Ask`            |
//! | `assemble` | `Assemble`       |
//! | `limit`    | `Limit`          |
//! | `config`   | `Config`         |

pub mod ask;
pub mod assemble;
pub mod config;
pub mod limit;

pub use ask::cmd_ask;
pub use assemble::cmd_assemble;
pub use config::cmd_config;
pub use limit::cmd_limit;

use super::PromptArgs;
use anyhow::{Context, Result, bail};
use promptline::config::PromptlineConfig;
use promptline::context::StaticContext;
use promptline::pipeline::ChatPipeline;
use promptline::{ChatSettings, Message};
use std::io::{IsTerminal, Read};
use std::path::Path;
use std::sync::Arc;

/// Configuration, pipeline, and conversation settings for one invocation.
pub(crate) fn build_pipeline(
    project_dir: &Path,
    endpoint: Option<&str>,
    args: &PromptArgs,
) -> Result<(ChatPipeline, ChatSettings)> {
    let config = PromptlineConfig::with_cli_args(
        project_dir.to_path_buf(),
        args.model.clone(),
        endpoint.map(str::to_string),
    )?;

    let model = config.model();
    let mut settings = config.settings_for(&model);
    if let Some(strategy) = args.strategy {
        settings.strategy = strategy;
    }
    if let Some(system) = &args.system {
        settings.system_prompt = Some(system.clone());
    }
    if let Some(limit) = args.context_limit {
        settings.context_limit_units = Some(limit);
    }
    if args.no_summarize {
        settings.summarization_enabled = false;
    }

    let mut pipeline = ChatPipeline::connect(config).context("Failed to create HTTP client")?;
    if let Some(path) = &args.context_file {
        pipeline = pipeline.with_context_provider(Arc::new(StaticContext::from_file(path)?));
    }

    Ok((pipeline, settings))
}

/// Earlier messages from `--history`, followed by the new prompt.
pub(crate) fn load_conversation(args: &PromptArgs) -> Result<Vec<Message>> {
    let mut history: Vec<Message> = match &args.history {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read history file: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse history file: {}", path.display()))?
        }
        None => Vec::new(),
    };

    let prompt = match &args.prompt {
        Some(prompt) => Some(prompt.clone()),
        None if !std::io::stdin().is_terminal() => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read prompt from stdin")?;
            Some(buf).filter(|b| !b.trim().is_empty())
        }
        None => None,
    };

    if let Some(prompt) = prompt {
        history.push(Message::user(prompt.trim_end()));
    }
    if history.is_empty() {
        bail!("Nothing to send: pass a PROMPT, pipe one on stdin, or use --history");
    }
    Ok(history)
}
