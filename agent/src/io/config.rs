//! Agent configuration stored in `agent.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::DEFAULT_MAX_ATTEMPTS;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "agent.toml";

/// Agent configuration (TOML).
///
/// Meant to be edited by humans. Missing fields default to the values the
/// agent ships with, so an absent file is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Root of the per-target input folders (`<data_dir>/<target>/`).
    pub data_dir: PathBuf,

    /// Where validated parsers are written (`<parsers_dir>/<target>_parser.py`).
    pub parsers_dir: PathBuf,

    /// Where run reports are written (`<reports_dir>/<target>.json`).
    pub reports_dir: PathBuf,

    /// Failed validations allowed before a run gives up.
    pub max_attempts: u32,

    /// Python interpreter used for the document helper and candidate parsers.
    pub python: String,

    /// Wall-clock limit for reading the sample document.
    pub extraction_timeout_secs: u64,

    /// Wall-clock limit for one candidate parser execution.
    pub execution_timeout_secs: u64,

    /// Truncate captured child stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Maximum prompt size before droppable sections are removed.
    pub prompt_budget_bytes: usize,

    pub generator: GeneratorConfig,
}

/// Which text-generation backend to use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Gemini `generateContent` over HTTP.
    Gemini,
    /// An external command reading the prompt on stdin.
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    pub provider: Provider,
    pub model: String,
    /// Lower is more deterministic.
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Environment variable holding the API credential.
    pub api_key_env: String,
    pub base_url: String,
    /// Command for the `command` provider (e.g. `["llm", "-m", "gpt-4o"]`).
    pub command: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            model: "gemini-2.5-flash-lite".to_string(),
            temperature: 0.1,
            timeout_secs: 300,
            api_key_env: "GOOGLE_API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            command: Vec::new(),
        }
    }
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            parsers_dir: PathBuf::from("custom_parsers"),
            reports_dir: PathBuf::from(".agent/reports"),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            python: "python3".to_string(),
            extraction_timeout_secs: 120,
            execution_timeout_secs: 120,
            output_limit_bytes: 1_000_000,
            prompt_budget_bytes: 200_000,
            generator: GeneratorConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be > 0"));
        }
        if self.python.trim().is_empty() {
            return Err(anyhow!("python must not be empty"));
        }
        if self.extraction_timeout_secs == 0 {
            return Err(anyhow!("extraction_timeout_secs must be > 0"));
        }
        if self.execution_timeout_secs == 0 {
            return Err(anyhow!("execution_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.prompt_budget_bytes == 0 {
            return Err(anyhow!("prompt_budget_bytes must be > 0"));
        }
        self.generator.validate()
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }
}

impl GeneratorConfig {
    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(anyhow!("generator.timeout_secs must be > 0"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow!(
                "generator.temperature must be within 0.0..=2.0 (got {})",
                self.temperature
            ));
        }
        match self.provider {
            Provider::Gemini => {
                if self.model.trim().is_empty() {
                    return Err(anyhow!("generator.model must not be empty"));
                }
                if self.api_key_env.trim().is_empty() {
                    return Err(anyhow!("generator.api_key_env must not be empty"));
                }
            }
            Provider::Command => {
                if self.command.is_empty() || self.command[0].trim().is_empty() {
                    return Err(anyhow!(
                        "generator.command must be a non-empty array for provider = \"command\""
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Write `contents` to `path` through a sibling temp file and a rename.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path
        .file_name()
        .with_context(|| format!("path missing file name {}", path.display()))?
        .to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = parent.join(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
