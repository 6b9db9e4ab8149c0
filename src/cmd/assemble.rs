//! Prompt inspection — `promptline assemble`.

use anyhow::Result;
use console::style;
use std::path::Path;

use super::super::PromptArgs;
use super::{build_pipeline, load_conversation};

pub async fn cmd_assemble(project_dir: &Path, endpoint: Option<&str>, args: &PromptArgs) -> Result<()> {
    let history = load_conversation(args)?;
    let (pipeline, settings) = build_pipeline(project_dir, endpoint, args)?;

    let prepared = pipeline.prepare(&history, &settings).await;
    let assembled = &prepared.assembled;
    let budget = &assembled.budget;

    println!();
    println!("{}", style("Budget").bold());
    println!("  model = \"{}\"", settings.model);
    println!("  strategy = {}", settings.strategy);
    println!("  effective_limit = {}", assembled.effective_limit);
    println!("  system_prompt_units = {}", budget.system_prompt_units);
    println!("  response_reserve_units = {}", budget.response_reserve_units);
    println!("  max_prompt_units = {}", budget.max_prompt_units);
    println!();
    println!("{}", style("Assembly").bold());
    println!("  {}", assembled.stats);
    println!();
    println!("{}", style("System prompt").bold());
    println!("{}", style(&prepared.system_prompt).dim());
    println!();
    println!("{}", style("Prompt").bold());
    println!("{}", assembled.prompt);
    println!();

    Ok(())
}
