//! Runtime configuration.
//!
//! A `SwarmConfig` is built once at startup and handed to the constructors
//! that need it (database, completion client, orchestrator). Sources, lowest
//! precedence first: built-in defaults, an optional YAML file, then
//! environment variables. CLI flags are applied on top by the binary.
//!
//! ```yaml
//! database_path: "${HOME}/.swarm/swarm.db"
//! completion:
//!   provider: ollama
//!   base_url: "${OLLAMA_BASE_URL:-http://localhost:11434}"
//!   model: "qwen2.5-coder:7b"
//!   temperature: 0.0
//!   timeout_secs: 120
//! orchestrator:
//!   max_steps: 12
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Which wire protocol the completion backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionProvider {
    /// Ollama's native `/api/chat` endpoint.
    Ollama,
    /// Any OpenAI-compatible `/chat/completions` endpoint.
    #[serde(alias = "openai-compatible")]
    OpenAi,
}

impl CompletionProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" | "openai-compatible" => Some(Self::OpenAi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub provider: CompletionProvider,
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub temperature: f64,
    /// Per-request timeout. A timed-out step fails its workflow.
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: CompletionProvider::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5-coder:7b".to_string(),
            api_key: None,
            temperature: 0.0,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upper bound on agent steps per workflow run.
    pub max_steps: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_steps: 12 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    pub database_path: String,
    pub completion: CompletionConfig,
    pub orchestrator: OrchestratorConfig,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            database_path: "swarm.db".to_string(),
            completion: CompletionConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl SwarmConfig {
    /// Parse a configuration from YAML, expanding `${VAR}` references first.
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        let expanded = resolve_env_vars(yaml);
        let config: Self = serde_yaml::from_str(&expanded)
            .map_err(|e| format!("Failed to parse config YAML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no workflow could run under.
    pub fn validate(&self) -> Result<(), String> {
        if self.orchestrator.max_steps == 0 {
            return Err("orchestrator.max_steps must be at least 1".to_string());
        }
        Ok(())
    }

    /// Load a configuration file from disk.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;
        Self::from_yaml(&content)
    }

    /// Build the effective configuration.
    ///
    /// An explicit `path` must exist. Without one, `SWARM_CONFIG` is tried,
    /// then `~/.swarm/config.yaml`; if neither exists the defaults are used.
    /// Environment overrides are applied last.
    pub fn load(path: Option<&str>) -> Result<Self, String> {
        let mut config = match path {
            Some(p) => Self::from_file(Path::new(p))?,
            None => match discover_config_file() {
                Some(found) => {
                    tracing::debug!("Loading config from {}", found.display());
                    Self::from_file(&found)?
                }
                None => Self::default(),
            },
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using the given variable lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("SWARM_DB_PATH") {
            self.database_path = path;
        }
        if let Some(provider) = lookup("SWARM_LLM_PROVIDER") {
            self.completion.provider = CompletionProvider::from_str(&provider)
                .ok_or_else(|| format!("Unknown SWARM_LLM_PROVIDER: '{}'", provider))?;
        }
        if let Some(url) = lookup("SWARM_LLM_BASE_URL").or_else(|| lookup("OLLAMA_BASE_URL")) {
            self.completion.base_url = url;
        }
        if let Some(model) = lookup("SWARM_LLM_MODEL").or_else(|| lookup("OLLAMA_MODEL")) {
            self.completion.model = model;
        }
        if let Some(key) = lookup("SWARM_LLM_API_KEY") {
            self.completion.api_key = Some(key);
        }
        if let Some(secs) = lookup("SWARM_LLM_TIMEOUT_SECS") {
            self.completion.timeout_secs = secs
                .parse()
                .map_err(|_| format!("Invalid SWARM_LLM_TIMEOUT_SECS: '{}'", secs))?;
        }
        if let Some(steps) = lookup("SWARM_MAX_STEPS") {
            self.orchestrator.max_steps = steps
                .parse()
                .map_err(|_| format!("Invalid SWARM_MAX_STEPS: '{}'", steps))?;
        }
        self.validate()
    }
}

fn discover_config_file() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("SWARM_CONFIG") {
        let path = PathBuf::from(p);
        if path.is_file() {
            return Some(path);
        }
        tracing::warn!("SWARM_CONFIG points to missing file: {}", path.display());
    }
    let home = dirs::home_dir()?.join(".swarm").join("config.yaml");
    home.is_file().then_some(home)
}

/// Resolve environment variable references in a string.
/// Supports `${ENV_VAR}` and `${ENV_VAR:-default}` syntax; unknown variables
/// without a default are left as written.
pub fn resolve_env_vars(input: &str) -> String {
    resolve_with(input, |name| std::env::var(name).ok())
}

fn resolve_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let re = match regex::Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return input.to_string(),
    };
    re.replace_all(input, |caps: &regex::Captures| {
        let var_expr = &caps[1];
        if let Some(idx) = var_expr.find(":-") {
            let var_name = &var_expr[..idx];
            let default_val = &var_expr[idx + 2..];
            lookup(var_name).unwrap_or_else(|| default_val.to_string())
        } else {
            lookup(var_expr).unwrap_or_else(|| format!("${{{}}}", var_expr))
        }
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_resolve_env_vars() {
        let lookup = env(&[("SWARM_TEST_HOST", "gpu-box")]);
        assert_eq!(resolve_with("${SWARM_TEST_HOST}", &lookup), "gpu-box");
        assert_eq!(
            resolve_with("http://${SWARM_TEST_HOST}:11434", &lookup),
            "http://gpu-box:11434"
        );
        assert_eq!(resolve_with("${NOPE:-fallback}", &lookup), "fallback");
        assert_eq!(resolve_with("${NOPE}", &lookup), "${NOPE}");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = SwarmConfig::from_yaml(
            r#"
completion:
  provider: openai
  model: "gpt-4o-mini"
orchestrator:
  max_steps: 3
"#,
        )
        .unwrap();
        assert_eq!(config.completion.provider, CompletionProvider::OpenAi);
        assert_eq!(config.completion.model, "gpt-4o-mini");
        assert_eq!(config.completion.timeout_secs, 120);
        assert_eq!(config.orchestrator.max_steps, 3);
        assert_eq!(config.database_path, "swarm.db");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SwarmConfig::default();
        config
            .apply_env_overrides(env(&[
                ("OLLAMA_BASE_URL", "http://ollama:11434"),
                ("OLLAMA_MODEL", "deepseek-coder"),
                ("SWARM_MAX_STEPS", "5"),
            ]))
            .unwrap();
        assert_eq!(config.completion.base_url, "http://ollama:11434");
        assert_eq!(config.completion.model, "deepseek-coder");
        assert_eq!(config.orchestrator.max_steps, 5);
    }

    #[test]
    fn test_invalid_env_override_is_reported() {
        let mut config = SwarmConfig::default();
        let err = config
            .apply_env_overrides(env(&[("SWARM_LLM_PROVIDER", "carrier-pigeon")]))
            .unwrap_err();
        assert!(err.contains("carrier-pigeon"));
    }

    #[test]
    fn test_zero_max_steps_is_rejected_from_every_source() {
        let err = SwarmConfig::from_yaml("orchestrator:\n  max_steps: 0\n").unwrap_err();
        assert!(err.contains("max_steps"));

        let mut config = SwarmConfig::default();
        let err = config
            .apply_env_overrides(env(&[("SWARM_MAX_STEPS", "0")]))
            .unwrap_err();
        assert!(err.contains("max_steps"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "database_path: /tmp/swarm-test.db\n").unwrap();
        let config = SwarmConfig::from_file(&path).unwrap();
        assert_eq!(config.database_path, "/tmp/swarm-test.db");
        assert!(SwarmConfig::from_file(&dir.path().join("missing.yaml")).is_err());
    }
}
