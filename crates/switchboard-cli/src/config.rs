use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use switchboard_core::RoutingStrategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchboardConfig {
    pub agent: AgentConfig,
    pub providers: ProvidersConfig,
    pub weather: WeatherConfig,
    #[serde(default)]
    pub routing: RoutingCliConfig,
    #[serde(default)]
    pub executor: ExecutorCliConfig,
    #[serde(default)]
    pub planner: PlannerCliConfig,
    pub knowledge: KnowledgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "claude-opus-4-6".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub embeddings: Option<EmbeddingsConfig>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

impl std::fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_embeddings_base_url")]
    pub base_url: String,
    #[serde(default = "default_embeddings_model")]
    pub model: String,
}

impl std::fmt::Debug for EmbeddingsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingsConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

fn default_embeddings_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_embeddings_model() -> String {
    "text-embedding-3-small".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    pub api_key: String,
}

impl std::fmt::Debug for WeatherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingCliConfig {
    #[serde(default = "default_strategy")]
    pub strategy: RoutingStrategy,
    #[serde(default = "default_complexity_word_threshold")]
    pub complexity_word_threshold: usize,
}

fn default_strategy() -> RoutingStrategy {
    RoutingStrategy::ClassifierPlanner
}

fn default_complexity_word_threshold() -> usize {
    10
}

impl Default for RoutingCliConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            complexity_word_threshold: default_complexity_word_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorCliConfig {
    #[serde(default = "default_responder_timeout")]
    pub responder_timeout_secs: u64,
    #[serde(default = "default_planner_timeout")]
    pub planner_timeout_secs: u64,
}

fn default_responder_timeout() -> u64 {
    60
}

fn default_planner_timeout() -> u64 {
    300
}

impl Default for ExecutorCliConfig {
    fn default() -> Self {
        Self {
            responder_timeout_secs: default_responder_timeout(),
            planner_timeout_secs: default_planner_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerCliConfig {
    #[serde(default = "default_max_subtasks")]
    pub max_subtasks: usize,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_subtask_timeout")]
    pub subtask_timeout_secs: u64,
}

fn default_max_subtasks() -> usize {
    4
}

fn default_max_concurrent() -> usize {
    3
}

fn default_subtask_timeout() -> u64 {
    120
}

impl Default for PlannerCliConfig {
    fn default() -> Self {
        Self {
            max_subtasks: default_max_subtasks(),
            max_concurrent: default_max_concurrent(),
            subtask_timeout_secs: default_subtask_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    pub db_path: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    3
}

/// Mask a secret string for safe display in Debug output / logs.
/// Shows first 3 and last 4 chars for keys longer than 7 chars, otherwise "***".
fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".switchboard")
}

/// Expand a leading `~/` to the user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(path),
    }
}

impl SwitchboardConfig {
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = custom_path
            .clone()
            .unwrap_or_else(|| config_dir().join("config.toml"));

        // Refuse configs other users can read — they may contain secrets
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    return Err(anyhow!(
                        "Config file {:?} has overly permissive permissions ({:o}). \
                         It may contain secrets. Fix with: chmod 600 {:?}",
                        path,
                        mode & 0o777,
                        path
                    ));
                }
            }
        }

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `switchboard init` first.",
                path.display()
            )
        })?;

        let expanded = expand_env_vars(&content);

        let config: Self = toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;

        if config.providers.anthropic.api_key.starts_with("sk-ant-") {
            warn!(
                "API key is hardcoded in config file. For security, use environment variables: api_key = \"${{ANTHROPIC_API_KEY}}\""
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// Configuration errors are fatal at construction time, not retried
    fn validate(&self) -> Result<()> {
        if self.providers.anthropic.api_key.trim().is_empty() {
            return Err(anyhow!(
                "providers.anthropic.api_key is required. Set ANTHROPIC_API_KEY or edit the config."
            ));
        }
        if self.weather.api_key.trim().is_empty() {
            return Err(anyhow!(
                "weather.api_key is required. Set WEATHER_API_KEY or edit the config."
            ));
        }
        Ok(())
    }
}

/// Allowlist of environment variable names that may be expanded in config
/// files. Prevents a config edit from reading arbitrary env vars.
const ALLOWED_ENV_VARS: &[&str] = &[
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "WEATHER_API_KEY",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        if let Some(start) = result[pos..].find("${") {
            let abs_start = pos + start;
            if let Some(end) = result[abs_start..].find('}') {
                let var_name = result[abs_start + 2..abs_start + end].to_string();

                let value = if ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
                    std::env::var(&var_name).unwrap_or_default()
                } else {
                    warn!(
                        "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                        var_name
                    );
                    // Leave the ${VAR} unexpanded so it's obvious
                    pos = abs_start + end + 1;
                    continue;
                };

                let value_len = value.len();
                result = format!(
                    "{}{}{}",
                    &result[..abs_start],
                    value,
                    &result[abs_start + end + 1..]
                );
                pos = abs_start + value_len;
            } else {
                break;
            }
        } else {
            break;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[agent]
default_model = "claude-opus-4-6"
max_tokens = 2048

[providers.anthropic]
api_key = "sk-test-key-123456"

[weather]
api_key = "wk-test"

[routing]
strategy = "keyword_ladder"
complexity_word_threshold = 12

[knowledge]
db_path = "~/.switchboard/support.db"
"#;

    #[test]
    fn test_parse_sample_config() {
        let config: SwitchboardConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.agent.max_tokens, 2048);
        assert_eq!(config.routing.strategy, RoutingStrategy::KeywordLadder);
        assert_eq!(config.routing.complexity_word_threshold, 12);
        assert_eq!(config.knowledge.top_k, 3);
        assert!(config.providers.embeddings.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_section_defaults() {
        let config: SwitchboardConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.executor.responder_timeout_secs, 60);
        assert_eq!(config.executor.planner_timeout_secs, 300);
        assert_eq!(config.planner.max_subtasks, 4);
    }

    #[test]
    fn test_validate_rejects_empty_keys() {
        let mut config: SwitchboardConfig = toml::from_str(SAMPLE).unwrap();
        config.providers.anthropic.api_key = String::new();
        assert!(config.validate().is_err());

        let mut config: SwitchboardConfig = toml::from_str(SAMPLE).unwrap();
        config.weather.api_key = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "(empty)");
        assert_eq!(mask_secret("short"), "***");
        assert_eq!(mask_secret("sk-test-key-123456"), "sk-...3456");
    }

    #[test]
    fn test_debug_masks_secrets() {
        let config: SwitchboardConfig = toml::from_str(SAMPLE).unwrap();
        let output = format!("{:?}", config);
        assert!(!output.contains("sk-test-key-123456"));
        assert!(!output.contains("wk-test"));
    }

    #[test]
    fn test_expand_env_vars_allowlist_only() {
        // SAFETY: test-local env mutation
        unsafe {
            std::env::set_var("WEATHER_API_KEY", "expanded-value");
        }
        let expanded = expand_env_vars("key = \"${WEATHER_API_KEY}\"");
        assert_eq!(expanded, "key = \"expanded-value\"");

        let untouched = expand_env_vars("key = \"${SOME_RANDOM_VAR}\"");
        assert_eq!(untouched, "key = \"${SOME_RANDOM_VAR}\"");
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/.switchboard/support.db");
        assert!(!expanded.to_string_lossy().starts_with("~"));
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }
}
