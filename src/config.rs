//! Configuration for promptline.
//!
//! Settings are read from `.promptline/promptline.toml` in the project
//! directory, falling back to `<config dir>/promptline/promptline.toml`, and
//! then layered: file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [backend]
//! endpoint = "http://localhost:11434"
//! connect_timeout_secs = 5
//! request_timeout_secs = 300
//!
//! [defaults]
//! model = "llama3.2"
//! temperature = 0.7
//! strategy = "advanced"
//! measurer = "tokenizer"
//! context_limit = 8192
//! response_reserve = 1024
//! keep_last_n = 6
//! chunk_size = 1000
//!
//! [summarization]
//! enabled = true
//! temperature = 0.2
//!
//! [prompt]
//! role_file = "role.md"
//! include_timestamp = true
//!
//! [models.overrides."llama3*"]
//! context_limit = 8192
//! strategy = "basic"
//! ```

use crate::assemble::{AssemblyLimits, DEFAULT_CONTEXT_LIMIT, DEFAULT_RESPONSE_RESERVE};
use crate::backend::DEFAULT_ENDPOINT;
use crate::measure::MeasurerKind;
use crate::summarize::{CONVERSATION_PLACEHOLDER, DEFAULT_SUMMARY_TEMPERATURE, DEFAULT_SUMMARY_TEMPLATE, SummaryOptions};
use anyhow::{Context, Result};
use promptline_common::{ChatSettings, ContextStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_DIR_NAME: &str = ".promptline";
pub const CONFIG_FILE_NAME: &str = "promptline.toml";

/// Overrides `backend.endpoint`.
pub const ENV_ENDPOINT: &str = "PROMPTLINE_ENDPOINT";
/// Overrides `defaults.model`.
pub const ENV_MODEL: &str = "PROMPTLINE_MODEL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSection {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Maximum wait between body reads, so long generations are not cut off.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BackendSection {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Conversation defaults, before per-model overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsSection {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub strategy: ContextStrategy,
    /// Measurer backing the advanced strategy
    #[serde(default)]
    pub measurer: MeasurerKind,
    /// User ceiling on the context window, in tokens
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
    /// Tokens held back for the reply
    #[serde(default = "default_response_reserve")]
    pub response_reserve: usize,
    #[serde(default = "default_keep_last_n")]
    pub keep_last_n: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_context_limit() -> usize {
    DEFAULT_CONTEXT_LIMIT
}

fn default_response_reserve() -> usize {
    DEFAULT_RESPONSE_RESERVE
}

fn default_keep_last_n() -> usize {
    6
}

fn default_chunk_size() -> usize {
    1000
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            strategy: ContextStrategy::default(),
            measurer: MeasurerKind::default(),
            context_limit: default_context_limit(),
            response_reserve: default_response_reserve(),
            keep_last_n: default_keep_last_n(),
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationSection {
    #[serde(default = "default_summarization_enabled")]
    pub enabled: bool,
    #[serde(default = "default_summary_temperature")]
    pub temperature: f32,
    #[serde(default = "default_summary_template")]
    pub template: String,
}

fn default_summarization_enabled() -> bool {
    true
}

fn default_summary_temperature() -> f32 {
    DEFAULT_SUMMARY_TEMPERATURE
}

fn default_summary_template() -> String {
    DEFAULT_SUMMARY_TEMPLATE.to_string()
}

impl Default for SummarizationSection {
    fn default() -> Self {
        Self {
            enabled: default_summarization_enabled(),
            temperature: default_summary_temperature(),
            template: default_summary_template(),
        }
    }
}

impl SummarizationSection {
    pub fn to_options(&self) -> SummaryOptions {
        SummaryOptions {
            enabled: self.enabled,
            temperature: self.temperature,
            template: self.template.clone(),
        }
    }
}

/// System prompt sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSection {
    /// Takes precedence over `role_file`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Relative paths resolve against the project directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_file: Option<PathBuf>,
    #[serde(default = "default_include_timestamp")]
    pub include_timestamp: bool,
}

fn default_include_timestamp() -> bool {
    true
}

impl Default for PromptSection {
    fn default() -> Self {
        Self {
            system_prompt: None,
            role_file: None,
            include_timestamp: default_include_timestamp(),
        }
    }
}

/// Per-model overrides, keyed by glob pattern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ContextStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_last_n: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summarization: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsSection {
    /// Applied in pattern order; later matches win.
    #[serde(default)]
    pub overrides: BTreeMap<String, ModelOverride>,
}

/// The complete promptline.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptlineToml {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub defaults: DefaultsSection,
    #[serde(default)]
    pub summarization: SummarizationSection,
    #[serde(default)]
    pub prompt: PromptSection,
    #[serde(default)]
    pub models: ModelsSection,
}

impl PromptlineToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse promptline.toml")
    }

    /// Load `promptline.toml` from `config_dir`, or defaults if it does not exist.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize promptline.toml")?;
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Endpoint, with the environment overriding the file.
    pub fn endpoint(&self) -> String {
        std::env::var(ENV_ENDPOINT)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.backend.endpoint.clone())
    }

    /// Default model, with the environment overriding the file.
    pub fn model(&self) -> String {
        std::env::var(ENV_MODEL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.defaults.model.clone())
    }

    pub fn assembly_limits(&self) -> AssemblyLimits {
        AssemblyLimits {
            default_context_limit: self.defaults.context_limit,
            response_reserve: self.defaults.response_reserve,
        }
    }

    /// Conversation settings for `model`, applying matching overrides.
    pub fn model_settings(&self, model: &str) -> ChatSettings {
        let mut settings = ChatSettings::new(model);
        settings.temperature = self.defaults.temperature;
        settings.strategy = self.defaults.strategy;
        settings.summarization_enabled = self.summarization.enabled;
        settings.keep_last_n = self.defaults.keep_last_n;
        settings.chunk_size_units = self.defaults.chunk_size;
        settings.context_limit_units = Some(self.defaults.context_limit);
        settings.system_prompt = self.prompt.system_prompt.clone();

        for (pattern, override_cfg) in &self.models.overrides {
            if pattern_matches(pattern, model) {
                if let Some(limit) = override_cfg.context_limit {
                    settings.context_limit_units = Some(limit);
                }
                if let Some(strategy) = override_cfg.strategy {
                    settings.strategy = strategy;
                }
                if let Some(n) = override_cfg.keep_last_n {
                    settings.keep_last_n = n;
                }
                if let Some(size) = override_cfg.chunk_size {
                    settings.chunk_size_units = size;
                }
                if let Some(temperature) = override_cfg.temperature {
                    settings.temperature = temperature;
                }
                if let Some(enabled) = override_cfg.summarization {
                    settings.summarization_enabled = enabled;
                }
            }
        }

        settings
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let endpoint = &self.backend.endpoint;
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            warnings.push(format!(
                "Invalid backend.endpoint '{}': should start with http:// or https://",
                endpoint
            ));
        }
        if self.backend.connect_timeout_secs == 0 {
            warnings.push("backend.connect_timeout_secs is 0; every connection attempt will time out".to_string());
        }

        if self.defaults.model.trim().is_empty() {
            warnings.push("defaults.model is empty; pass --model or set PROMPTLINE_MODEL".to_string());
        }
        if self.defaults.context_limit == 0 {
            warnings.push("defaults.context_limit must be greater than 0".to_string());
        } else if self.defaults.response_reserve >= self.defaults.context_limit {
            warnings.push(format!(
                "defaults.response_reserve ({}) leaves no room for the prompt within context_limit ({})",
                self.defaults.response_reserve, self.defaults.context_limit
            ));
        }
        if self.defaults.chunk_size == 0 {
            warnings.push("defaults.chunk_size must be greater than 0".to_string());
        }
        check_temperature(&mut warnings, "defaults.temperature", self.defaults.temperature);
        check_temperature(
            &mut warnings,
            "summarization.temperature",
            self.summarization.temperature,
        );

        if !self.summarization.template.contains(CONVERSATION_PLACEHOLDER) {
            warnings.push(format!(
                "summarization.template has no {} placeholder; conversation text will be appended",
                CONVERSATION_PLACEHOLDER
            ));
        }

        for (pattern, override_cfg) in &self.models.overrides {
            if override_cfg.context_limit == Some(0) {
                warnings.push(format!(
                    "context_limit must be greater than 0 in override for pattern '{}'",
                    pattern
                ));
            }
            if override_cfg.chunk_size == Some(0) {
                warnings.push(format!(
                    "chunk_size must be greater than 0 in override for pattern '{}'",
                    pattern
                ));
            }
            if let Some(t) = override_cfg.temperature {
                check_temperature(
                    &mut warnings,
                    &format!("temperature in override for pattern '{}'", pattern),
                    t,
                );
            }
        }

        warnings
    }
}

fn check_temperature(warnings: &mut Vec<String>, field: &str, value: f32) {
    if !(0.0..=2.0).contains(&value) {
        warnings.push(format!("{} ({}) should be between 0.0 and 2.0", field, value));
    }
}

/// Check if a glob pattern matches a model name, case-insensitively.
/// - `*` matches any sequence of characters
/// - `?` matches any single character
pub fn pattern_matches(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let name: Vec<char> = name.to_lowercase().chars().collect();
    glob_match(&pattern, &name)
}

fn glob_match(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((&'*', rest)) => {
            let rest = skip_stars(rest);
            if rest.is_empty() {
                return true;
            }
            (0..=text.len()).any(|i| glob_match(rest, &text[i..]))
        }
        Some((&'?', rest)) => !text.is_empty() && glob_match(rest, &text[1..]),
        Some((c, rest)) => text.first() == Some(c) && glob_match(rest, &text[1..]),
    }
}

fn skip_stars(pattern: &[char]) -> &[char] {
    let stars = pattern.iter().take_while(|c| **c == '*').count();
    &pattern[stars..]
}

/// Configuration combined with runtime overrides.
///
/// Merges, in increasing precedence:
/// 1. promptline.toml
/// 2. Environment variables (and `.env`)
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct PromptlineConfig {
    pub project_dir: PathBuf,
    /// Project-local `.promptline` directory, whether or not it exists
    pub config_dir: PathBuf,
    /// The file that was actually loaded, if any
    pub loaded_from: Option<PathBuf>,
    pub toml: PromptlineToml,
    pub cli_model: Option<String>,
    pub cli_endpoint: Option<String>,
}

impl PromptlineConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_dir = project_dir.join(CONFIG_DIR_NAME);

        let local = config_dir.join(CONFIG_FILE_NAME);
        let global = dirs::config_dir().map(|d| d.join("promptline").join(CONFIG_FILE_NAME));
        let loaded_from = if local.exists() {
            Some(local)
        } else {
            global.filter(|p| p.exists())
        };
        let toml = match &loaded_from {
            Some(path) => PromptlineToml::load(path)?,
            None => PromptlineToml::default(),
        };

        Ok(Self {
            project_dir,
            config_dir,
            loaded_from,
            toml,
            cli_model: None,
            cli_endpoint: None,
        })
    }

    pub fn with_cli_args(project_dir: PathBuf, model: Option<String>, endpoint: Option<String>) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.cli_model = model;
        config.cli_endpoint = endpoint;
        Ok(config)
    }

    /// Configuration with no file, for embedding and tests.
    pub fn from_toml(project_dir: PathBuf, toml: PromptlineToml) -> Self {
        let config_dir = project_dir.join(CONFIG_DIR_NAME);
        Self {
            project_dir,
            config_dir,
            loaded_from: None,
            toml,
            cli_model: None,
            cli_endpoint: None,
        }
    }

    /// Path of the project-local config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Endpoint (CLI → env → file → default).
    pub fn endpoint(&self) -> String {
        self.cli_endpoint.clone().unwrap_or_else(|| self.toml.endpoint())
    }

    /// Model (CLI → env → file → default).
    pub fn model(&self) -> String {
        self.cli_model.clone().unwrap_or_else(|| self.toml.model())
    }

    pub fn settings_for(&self, model: &str) -> ChatSettings {
        self.toml.model_settings(model)
    }

    pub fn role_file(&self) -> Option<PathBuf> {
        self.toml.prompt.role_file.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                self.project_dir.join(p)
            }
        })
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    // =========================================
    // Pattern matching tests
    // =========================================

    #[test]
    fn test_pattern_matches_exact() {
        assert!(pattern_matches("llama3.2", "llama3.2"));
        assert!(!pattern_matches("llama3.2", "llama3.1"));
    }

    #[test]
    fn test_pattern_matches_star() {
        assert!(pattern_matches("llama3*", "llama3.2:8b"));
        assert!(pattern_matches("*:70b", "llama3:70b"));
        assert!(pattern_matches("qwen*coder*", "qwen2.5-coder:7b"));
        assert!(pattern_matches("*", "anything"));
        assert!(!pattern_matches("mistral*", "llama3"));
    }

    #[test]
    fn test_pattern_matches_question_mark() {
        assert!(pattern_matches("llama?", "llama3"));
        assert!(!pattern_matches("llama?", "llama"));
        assert!(!pattern_matches("llama?", "llama31"));
    }

    #[test]
    fn test_pattern_matches_case_insensitive() {
        assert!(pattern_matches("Llama3*", "LLAMA3.2"));
    }

    // =========================================
    // PromptlineToml parsing tests
    // =========================================

    #[test]
    fn test_parse_empty_uses_defaults() {
        let toml = PromptlineToml::parse("").unwrap();
        assert_eq!(toml.backend.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(toml.defaults.model, "llama3.2");
        assert_eq!(toml.defaults.strategy, ContextStrategy::Advanced);
        assert_eq!(toml.defaults.measurer, MeasurerKind::Tokenizer);
        assert_eq!(toml.defaults.context_limit, 8192);
        assert_eq!(toml.defaults.response_reserve, 1024);
        assert!(toml.summarization.enabled);
        assert!(toml.prompt.include_timestamp);
    }

    #[test]
    fn test_parse_sections() {
        let content = r#"
[backend]
endpoint = "http://gpu-box:11434"
request_timeout_secs = 600

[defaults]
model = "mistral"
strategy = "basic"
measurer = "words"
context_limit = 4096

[summarization]
enabled = false

[prompt]
role_file = "roles/tutor.md"
include_timestamp = false
"#;
        let toml = PromptlineToml::parse(content).unwrap();
        assert_eq!(toml.backend.endpoint, "http://gpu-box:11434");
        assert_eq!(toml.backend.request_timeout(), Duration::from_secs(600));
        assert_eq!(toml.backend.connect_timeout_secs, 5);
        assert_eq!(toml.defaults.strategy, ContextStrategy::Basic);
        assert_eq!(toml.defaults.measurer, MeasurerKind::Words);
        assert!(!toml.summarization.enabled);
        assert_eq!(toml.prompt.role_file, Some(PathBuf::from("roles/tutor.md")));
    }

    #[test]
    fn test_parse_invalid_strategy_fails() {
        let content = r#"
[defaults]
strategy = "clever"
"#;
        assert!(PromptlineToml::parse(content).is_err());
    }

    #[test]
    fn test_model_settings_no_override() {
        let toml = PromptlineToml::default();
        let settings = toml.model_settings("llama3.2");
        assert_eq!(settings.model, "llama3.2");
        assert_eq!(settings.context_limit_units, Some(8192));
        assert_eq!(settings.keep_last_n, 6);
        assert_eq!(settings.chunk_size_units, 1000);
        assert!(settings.summarization_enabled);
    }

    #[test]
    fn test_model_settings_with_override() {
        let content = r#"
[defaults]
temperature = 0.9

[models.overrides."llama3*"]
context_limit = 4096
strategy = "basic"
keep_last_n = 4

[models.overrides."*:70b"]
chunk_size = 800
summarization = false
"#;
        let toml = PromptlineToml::parse(content).unwrap();

        let small = toml.model_settings("llama3.2");
        assert_eq!(small.context_limit_units, Some(4096));
        assert_eq!(small.strategy, ContextStrategy::Basic);
        assert_eq!(small.keep_last_n, 4);
        assert_eq!(small.chunk_size_units, 1000);
        assert!((small.temperature - 0.9).abs() < f32::EPSILON);

        let big = toml.model_settings("llama3:70b");
        assert_eq!(big.strategy, ContextStrategy::Basic);
        assert_eq!(big.chunk_size_units, 800);
        assert!(!big.summarization_enabled);

        let other = toml.model_settings("mistral");
        assert_eq!(other.strategy, ContextStrategy::Advanced);
        assert_eq!(other.context_limit_units, Some(8192));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut toml = PromptlineToml::default();
        toml.defaults.model = "phi3".to_string();
        toml.models.overrides.insert(
            "phi*".to_string(),
            ModelOverride {
                context_limit: Some(2048),
                ..Default::default()
            },
        );
        toml.save(&path).unwrap();

        let loaded = PromptlineToml::load(&path).unwrap();
        assert_eq!(loaded.defaults.model, "phi3");
        assert_eq!(loaded.model_settings("phi3").context_limit_units, Some(2048));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let toml = PromptlineToml::load_or_default(dir.path()).unwrap();
        assert_eq!(toml.defaults.context_limit, 8192);
    }

    // =========================================
    // Environment layering tests
    // =========================================

    #[test]
    fn test_env_overrides_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let saved_endpoint = std::env::var(ENV_ENDPOINT).ok();
        let saved_model = std::env::var(ENV_MODEL).ok();

        let toml = PromptlineToml::parse("[backend]\nendpoint = \"http://file:1\"\n").unwrap();

        unsafe { std::env::remove_var(ENV_ENDPOINT) };
        unsafe { std::env::remove_var(ENV_MODEL) };
        assert_eq!(toml.endpoint(), "http://file:1");
        assert_eq!(toml.model(), "llama3.2");

        unsafe { std::env::set_var(ENV_ENDPOINT, "http://env:2") };
        unsafe { std::env::set_var(ENV_MODEL, "qwen2.5") };
        assert_eq!(toml.endpoint(), "http://env:2");
        assert_eq!(toml.model(), "qwen2.5");

        let mut config = PromptlineConfig::from_toml(PathBuf::from("/tmp"), toml);
        config.cli_endpoint = Some("http://cli:3".to_string());
        assert_eq!(config.endpoint(), "http://cli:3");
        assert_eq!(config.model(), "qwen2.5");

        unsafe { std::env::remove_var(ENV_ENDPOINT) };
        unsafe { std::env::remove_var(ENV_MODEL) };
        if let Some(val) = saved_endpoint {
            unsafe { std::env::set_var(ENV_ENDPOINT, val) };
        }
        if let Some(val) = saved_model {
            unsafe { std::env::set_var(ENV_MODEL, val) };
        }
    }

    // =========================================
    // Validation tests
    // =========================================

    #[test]
    fn test_validate_defaults_clean() {
        assert!(PromptlineToml::default().validate().is_empty());
    }

    #[test]
    fn test_validate_reports_problems() {
        let content = r#"
[backend]
endpoint = "localhost:11434"

[defaults]
context_limit = 1000
response_reserve = 1000
chunk_size = 0
temperature = 3.5

[summarization]
template = "Summarize please."

[models.overrides."tiny*"]
context_limit = 0
"#;
        let warnings = PromptlineToml::parse(content).unwrap().validate();
        assert!(warnings.iter().any(|w| w.contains("backend.endpoint")));
        assert!(warnings.iter().any(|w| w.contains("response_reserve")));
        assert!(warnings.iter().any(|w| w.contains("chunk_size")));
        assert!(warnings.iter().any(|w| w.contains("defaults.temperature")));
        assert!(warnings.iter().any(|w| w.contains("{conversation}")));
        assert!(warnings.iter().any(|w| w.contains("'tiny*'")));
    }

    // =========================================
    // PromptlineConfig tests
    // =========================================

    #[test]
    fn test_config_reads_project_file() {
        let dir = tempdir().unwrap();
        let config_dir = dir.path().join(CONFIG_DIR_NAME);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join(CONFIG_FILE_NAME),
            "[prompt]\nrole_file = \"role.md\"\n",
        )
        .unwrap();

        let config = PromptlineConfig::new(dir.path().to_path_buf()).unwrap();
        assert!(config.loaded_from.as_ref().unwrap().ends_with(".promptline/promptline.toml"));
        assert!(config.config_file().ends_with(".promptline/promptline.toml"));
        assert!(config.role_file().unwrap().ends_with("role.md"));
        assert!(config.role_file().unwrap().is_absolute());
    }

    #[test]
    fn test_config_cli_model() {
        let dir = tempdir().unwrap();
        let config =
            PromptlineConfig::with_cli_args(dir.path().to_path_buf(), Some("gemma2".to_string()), None).unwrap();
        assert_eq!(config.model(), "gemma2");
        assert_eq!(config.settings_for("gemma2").model, "gemma2");
    }
}
