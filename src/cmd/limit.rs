//! Context limit lookup — `promptline limit`.

use anyhow::Result;
use promptline::config::PromptlineConfig;
use promptline::pipeline::ChatPipeline;
use std::path::Path;

pub async fn cmd_limit(
    project_dir: &Path,
    endpoint: Option<&str>,
    model: &str,
    user_limit: Option<usize>,
) -> Result<()> {
    let config = PromptlineConfig::with_cli_args(
        project_dir.to_path_buf(),
        Some(model.to_string()),
        endpoint.map(str::to_string),
    )?;
    let configured = user_limit
        .or(config.settings_for(model).context_limit_units)
        .unwrap_or(config.toml.defaults.context_limit);
    let pipeline = ChatPipeline::connect(config)?;

    let detected = pipeline.detected_limit(model).await;
    let effective = pipeline.effective_limit(model, Some(configured)).await;

    println!("Model:      {}", model);
    println!("Configured: {}", configured);
    match detected {
        Some(limit) => println!("Detected:   {}", limit),
        None => println!("Detected:   unknown"),
    }
    println!("Effective:  {}", effective);

    Ok(())
}
