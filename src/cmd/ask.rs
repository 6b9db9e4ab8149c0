//! Streaming replies — `promptline ask`.

use anyhow::{Result, bail};
use console::style;
use promptline::StreamEvent;
use promptline::ui::{Spinner, icons};
use std::io::{IsTerminal, Write};
use std::path::Path;
use tokio_util::sync::CancellationToken;

use super::super::PromptArgs;
use super::{build_pipeline, load_conversation};

pub async fn cmd_ask(project_dir: &Path, endpoint: Option<&str>, args: &PromptArgs, json: bool) -> Result<()> {
    let history = load_conversation(args)?;
    let (pipeline, settings) = build_pipeline(project_dir, endpoint, args)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    // First Ctrl-C stops generation; a second one exits.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        on_interrupt.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let spinner = if json || !std::io::stderr().is_terminal() {
        Spinner::hidden()
    } else {
        Spinner::new(format!("Waiting for {}...", settings.model))
    };

    let mut decoder = pipeline.stream_reply(&history, &settings, cancel).await;
    let mut stdout = std::io::stdout();

    while let Some(event) = decoder.next_event().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
            if let StreamEvent::Error { message, is_fatal: true } = event {
                bail!(message);
            }
            continue;
        }

        match event {
            StreamEvent::Content { text, .. } => {
                spinner.finish();
                write!(stdout, "{}", text)?;
                stdout.flush()?;
            }
            StreamEvent::ToolCalls { calls, .. } => {
                spinner.finish();
                for call in calls {
                    eprintln!(
                        "{}{} {}",
                        icons::TOOL,
                        style(&call.name).bold(),
                        style(&call.arguments_json).dim()
                    );
                }
            }
            StreamEvent::Done { timing, .. } => {
                spinner.finish();
                println!();
                if let Some(rate) = timing.tokens_per_second() {
                    let tokens = timing.eval_count.unwrap_or_default();
                    eprintln!("{}", style(format!("{} tokens, {:.1} tokens/s", tokens, rate)).dim());
                }
            }
            StreamEvent::Error { message, is_fatal: false } => {
                spinner.finish();
                println!();
                eprintln!("{}{}", icons::STOP, style(message).dim());
            }
            StreamEvent::Error { message, is_fatal: true } => {
                spinner.finish();
                eprintln!("{}{}", icons::CROSS, style("Generation failed").red().bold());
                bail!(message);
            }
        }
    }

    Ok(())
}
