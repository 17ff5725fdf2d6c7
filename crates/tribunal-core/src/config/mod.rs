use crate::engine::dispatcher::{DispatchPolicy, DEFAULT_MAX_IN_FLIGHT};
use crate::errors::ConfigError;
use crate::judge::{InvokePolicy, DEFAULT_MAX_ATTEMPTS};
use crate::providers::llm::Backend;
use crate::stats::JudgeMatching;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod path_resolver;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;
pub const DEFAULT_DB_PATH: &str = "tribunal.db";

pub const SAMPLE_CONFIG: &str = r#"# tribunal configuration
version: 1

database:
  # relative paths are resolved against this file's directory
  path: tribunal.db

provider:
  # openai | groq (LLM_BACKEND overrides)
  backend: groq
  # api_key_env: GROQ_API_KEY
  # base_url: https://api.groq.com/openai/v1
  temperature: 0.0

dispatch:
  # concurrent judge calls per run
  max_in_flight: 8
  # attempts per judge call, transient failures only
  max_attempts: 5
  timeout_seconds: 60

statistics:
  # by_value | by_identity
  judge_matching: by_value
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TribunalConfig {
    pub version: u32,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub statistics: StatisticsSettings,
}

impl Default for TribunalConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            database: Default::default(),
            provider: Default::default(),
            dispatch: Default::default(),
            statistics: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub backend: Backend,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Overrides the backend's advertised model list.
    pub models: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchSettings {
    pub max_in_flight: Option<usize>,
    pub max_attempts: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticsSettings {
    #[serde(default)]
    pub judge_matching: JudgeMatching,
}

impl TribunalConfig {
    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
    }

    pub fn api_key_env(&self) -> String {
        self.provider
            .api_key_env
            .clone()
            .unwrap_or_else(|| self.provider.backend.default_api_key_env().to_string())
    }

    pub fn available_models(&self) -> Vec<String> {
        match &self.provider.models {
            Some(models) => models.clone(),
            None => self
                .provider
                .backend
                .available_models()
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }

    pub fn invoke_policy(&self) -> InvokePolicy {
        let defaults = InvokePolicy::default();
        InvokePolicy {
            max_attempts: self.dispatch.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            attempt_timeout: self
                .dispatch
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.attempt_timeout),
            ..defaults
        }
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            max_in_flight: self.dispatch.max_in_flight.unwrap_or(DEFAULT_MAX_IN_FLIGHT),
        }
    }
}

pub fn load_config(path: &Path) -> Result<TribunalConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    let mut cfg = parse_config(&raw)?;
    path_resolver::PathResolver::new(path).resolve_opt_path(&mut cfg.database.path);
    Ok(cfg)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_or_default(path: &Path) -> Result<TribunalConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(TribunalConfig::default());
    }
    load_config(path)
}

pub fn parse_config(raw: &str) -> Result<TribunalConfig, ConfigError> {
    let cfg: TribunalConfig = serde_yaml::from_str(raw)
        .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;
    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }
    if cfg.dispatch.max_in_flight == Some(0) {
        return Err(ConfigError("dispatch.max_in_flight must be at least 1".into()));
    }
    if cfg.dispatch.max_attempts == Some(0) {
        return Err(ConfigError("dispatch.max_attempts must be at least 1".into()));
    }
    Ok(cfg)
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(path, SAMPLE_CONFIG)
        .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_parses() {
        let cfg = parse_config(SAMPLE_CONFIG).unwrap();
        assert_eq!(cfg.provider.backend, Backend::Groq);
        assert_eq!(cfg.dispatch_policy().max_in_flight, 8);
        assert_eq!(cfg.invoke_policy().max_attempts, 5);
        assert_eq!(cfg.statistics.judge_matching, JudgeMatching::ByValue);
        assert_eq!(cfg.api_key_env(), "GROQ_API_KEY");
    }

    #[test]
    fn defaults_apply_to_minimal_config() {
        let cfg = parse_config("version: 1\n").unwrap();
        assert_eq!(cfg.db_path(), PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(cfg.provider.backend, Backend::Openai);
        assert_eq!(cfg.available_models().len(), 5);
        assert_eq!(cfg.invoke_policy().attempt_timeout, Duration::from_secs(60));
    }

    #[test]
    fn rejects_unknown_version_and_zero_pool() {
        assert!(parse_config("version: 2\n").unwrap_err().0.contains("unsupported"));
        let err = parse_config("version: 1\ndispatch:\n  max_in_flight: 0\n").unwrap_err();
        assert!(err.0.contains("max_in_flight"));
    }

    #[test]
    fn database_path_resolves_against_config_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tribunal.yaml");
        std::fs::write(&path, "version: 1\ndatabase:\n  path: data/eval.db\n")?;
        let cfg = load_config(&path)?;
        assert_eq!(cfg.db_path(), dir.path().join("data/eval.db"));
        Ok(())
    }

    #[test]
    fn missing_file_uses_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cfg = load_or_default(&dir.path().join("absent.yaml"))?;
        assert_eq!(cfg.version, SUPPORTED_CONFIG_VERSION);
        Ok(())
    }
}
