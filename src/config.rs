use crate::cli::Args;
use anyhow::{Context, Result};
use llm::ProviderKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

const APP_DIR: &str = "kullexai";
const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_WINDOW_BYTES: usize = 128 * 1024;
pub const DEFAULT_MAX_TOKENS: u32 = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Redact {
    #[default]
    Basic,
    Off,
}

impl Redact {
    pub fn as_str(self) -> &'static str {
        match self {
            Redact::Basic => "basic",
            Redact::Off => "off",
        }
    }
}

impl FromStr for Redact {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Redact::Basic),
            "off" => Ok(Redact::Off),
            other => Err(format!("unknown redact mode '{other}' (expected basic or off)")),
        }
    }
}

/// Effective settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub provider: ProviderKind,
    pub model: String,
    /// Base URL override; empty means the backend default
    pub endpoint: String,
    pub window_bytes: usize,
    pub max_tokens: u32,
    pub redact: Redact,
    /// Variable to read the API key from instead of the backend's own
    pub key_env: Option<KeyEnv>,
}

/// API key variable configured for one backend. It is ignored when another backend runs.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEnv {
    pub var: String,
    pub provider: ProviderKind,
}

/// On-disk form of [`Config`]. Every key is optional and unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_bytes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_env: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAI,
            model: DEFAULT_MODEL.to_string(),
            endpoint: String::new(),
            window_bytes: DEFAULT_WINDOW_BYTES,
            max_tokens: DEFAULT_MAX_TOKENS,
            redact: Redact::Basic,
            key_env: None,
        }
    }
}

/// Location of the config file: `$XDG_CONFIG_HOME/kullexai/config.toml`,
/// falling back to the platform config directory.
pub fn config_path() -> Option<PathBuf> {
    let base = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir)?;
    Some(base.join(APP_DIR).join(CONFIG_FILE))
}

impl Config {
    /// Defaults, then `KULL_*` variables, then the config file.
    /// Problems with either source are logged and the lower layer is kept.
    pub fn load() -> Self {
        let mut config = Self::from_env_with(|name| std::env::var(name).ok());
        if let Some(path) = config_path() {
            match load_file(&path) {
                Ok(Some(file)) => config.merge_file(file),
                Ok(None) => debug!("No config file at {}", path.display()),
                Err(e) => warn!("Ignoring config file: {e:#}"),
            }
        }
        config
    }

    /// Defaults overlaid with the `KULL_*` variables returned by `lookup`
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(provider) = get("KULL_PROVIDER") {
            config.set_provider(&provider, "KULL_PROVIDER");
        }
        if let Some(model) = get("KULL_MODEL") {
            config.model = model;
        }
        if let Some(endpoint) = lookup("KULL_ENDPOINT") {
            config.endpoint = endpoint.trim().to_string();
        }
        if let Some(value) = get("KULL_WINDOW_BYTES") {
            match value.trim().parse() {
                Ok(window_bytes) => config.window_bytes = window_bytes,
                Err(e) => warn!("Ignoring KULL_WINDOW_BYTES='{value}': {e}"),
            }
        }
        if let Some(value) = get("KULL_MAX_TOKENS") {
            match value.trim().parse() {
                Ok(max_tokens) => config.max_tokens = max_tokens,
                Err(e) => warn!("Ignoring KULL_MAX_TOKENS='{value}': {e}"),
            }
        }
        if let Some(redact) = get("KULL_REDACT") {
            config.set_redact(&redact, "KULL_REDACT");
        }
        config
    }

    /// Overlay the values present in a parsed config file
    pub fn merge_file(&mut self, file: ConfigFile) {
        if let Some(provider) = file.provider {
            self.set_provider(&provider, CONFIG_FILE);
        }
        if let Some(model) = file.model.filter(|model| !model.trim().is_empty()) {
            self.model = model;
        }
        if let Some(endpoint) = file.endpoint {
            self.endpoint = endpoint.trim().to_string();
        }
        if let Some(window_bytes) = file.window_bytes {
            self.window_bytes = window_bytes;
        }
        if let Some(max_tokens) = file.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(redact) = file.redact {
            self.set_redact(&redact, CONFIG_FILE);
        }
        // Bound to the provider in effect once the file's own provider is applied
        if let Some(var) = file.key_env.filter(|name| !name.trim().is_empty()) {
            self.key_env = Some(KeyEnv {
                var: var.trim().to_string(),
                provider: self.provider,
            });
        }
    }

    /// Command-line flags have the final say
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(provider) = args.provider {
            self.provider = provider;
            if let Some(key_env) = &self.key_env {
                if key_env.provider != provider {
                    debug!(
                        "Ignoring key_env {}: it belongs to {}, not {provider}",
                        key_env.var, key_env.provider
                    );
                }
            }
        }
        if let Some(model) = &args.model {
            self.model = model.clone();
        }
        if let Some(endpoint) = &args.endpoint {
            self.endpoint = endpoint.trim().to_string();
        }
        if let Some(limit) = args.limit {
            self.window_bytes = limit;
        }
        if let Some(max_tokens) = args.maxtok {
            self.max_tokens = max_tokens;
        }
    }

    /// Base URL override for the provider constructor
    pub fn endpoint(&self) -> Option<String> {
        Some(self.endpoint.clone()).filter(|endpoint| !endpoint.is_empty())
    }

    /// `key_env` if it was configured for the provider that runs
    pub fn key_env(&self) -> Option<&str> {
        self.key_env
            .as_ref()
            .filter(|key_env| key_env.provider == self.provider)
            .map(|key_env| key_env.var.as_str())
    }

    /// Variable the API key is read from: `key_env` if configured, else the backend's own
    pub fn key_env_name(&self) -> Option<&str> {
        self.key_env().or_else(|| self.provider.api_key_env())
    }

    /// Explicit API key when `key_env` redirects the lookup; otherwise the
    /// backend resolves its own variable.
    pub fn api_key(&self) -> Option<String> {
        let key_env = self.key_env()?;
        let key = std::env::var(key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if key.is_none() {
            warn!("{key_env} (from key_env) is not set");
        }
        key
    }

    pub fn to_file(&self) -> ConfigFile {
        ConfigFile {
            provider: Some(self.provider.name().to_string()),
            model: Some(self.model.clone()),
            endpoint: Some(self.endpoint.clone()),
            window_bytes: Some(self.window_bytes),
            max_tokens: Some(self.max_tokens),
            redact: Some(self.redact.as_str().to_string()),
            key_env: self.key_env().map(str::to_string),
        }
    }

    /// Write the config as TOML, creating the parent directory
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents =
            toml::to_string_pretty(&self.to_file()).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }

    fn set_provider(&mut self, value: &str, source: &str) {
        match value.parse::<ProviderKind>() {
            Ok(provider) => self.provider = provider,
            Err(e) => warn!("Ignoring provider from {source}: {e}"),
        }
    }

    fn set_redact(&mut self, value: &str, source: &str) {
        match value.parse::<Redact>() {
            Ok(redact) => self.redact = redact,
            Err(e) => {
                warn!("Ignoring redact from {source}: {e}; using basic");
                self.redact = Redact::Basic;
            }
        }
    }
}

/// Read and parse the config file; `Ok(None)` when it does not exist
pub fn load_file(path: &Path) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let file = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    Ok(Some(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    fn from_env(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_env_with(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_env(&[]);
        assert_eq!(config.provider, ProviderKind::OpenAI);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.endpoint(), None);
        assert_eq!(config.window_bytes, 131072);
        assert_eq!(config.max_tokens, 400);
        assert_eq!(config.redact, Redact::Basic);
        assert_eq!(config.key_env_name(), Some("OPENAI_API_KEY"));
    }

    #[test]
    fn test_env_overrides_defaults() {
        let config = from_env(&[
            ("KULL_PROVIDER", "ollama"),
            ("KULL_MODEL", "llama3"),
            ("KULL_ENDPOINT", "http://gpu:11434"),
            ("KULL_WINDOW_BYTES", "2048"),
            ("KULL_MAX_TOKENS", "64"),
            ("KULL_REDACT", "off"),
        ]);
        assert_eq!(config.provider, ProviderKind::Ollama);
        assert_eq!(config.model, "llama3");
        assert_eq!(config.endpoint().as_deref(), Some("http://gpu:11434"));
        assert_eq!(config.window_bytes, 2048);
        assert_eq!(config.max_tokens, 64);
        assert_eq!(config.redact, Redact::Off);
        assert_eq!(config.key_env_name(), None);
    }

    #[test]
    fn test_bad_env_values_keep_defaults() {
        let config = from_env(&[
            ("KULL_PROVIDER", "gemini"),
            ("KULL_WINDOW_BYTES", "lots"),
            ("KULL_REDACT", "aggressive"),
        ]);
        assert_eq!(config.provider, ProviderKind::OpenAI);
        assert_eq!(config.window_bytes, DEFAULT_WINDOW_BYTES);
        assert_eq!(config.redact, Redact::Basic);
    }

    #[test]
    fn test_file_overrides_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "# written by hand\nprovider = \"anthropic\"\nmodel = \"claude-3-5-haiku-latest\"\nwindow_bytes = 4096\nkey_env = \"WORK_ANTHROPIC_KEY\"\ntheme = \"dark\"\n",
        )
        .unwrap();

        let mut config = from_env(&[("KULL_PROVIDER", "ollama"), ("KULL_MAX_TOKENS", "99")]);
        config.merge_file(load_file(&path).unwrap().unwrap());

        assert_eq!(config.provider, ProviderKind::Anthropic);
        assert_eq!(config.model, "claude-3-5-haiku-latest");
        assert_eq!(config.window_bytes, 4096);
        assert_eq!(config.max_tokens, 99);
        assert_eq!(config.key_env_name(), Some("WORK_ANTHROPIC_KEY"));
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_file(&dir.path().join("nope.toml")).unwrap(), None);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "provider = \n").unwrap();
        assert!(load_file(&path).is_err());
    }

    #[test]
    fn test_cli_overrides_everything() {
        let mut config = from_env(&[("KULL_MODEL", "from-env")]);
        config.merge_file(ConfigFile {
            model: Some("from-file".to_string()),
            window_bytes: Some(10),
            ..Default::default()
        });
        let args = Args::try_parse_from([
            "kull", "-p", "vllm", "-m", "from-cli", "-L", "20", "-T", "30",
        ])
        .unwrap();
        config.apply_args(&args);

        assert_eq!(config.provider, ProviderKind::Vllm);
        assert_eq!(config.model, "from-cli");
        assert_eq!(config.window_bytes, 20);
        assert_eq!(config.max_tokens, 30);
    }

    fn anthropic_file_with_key_env(var: &str) -> ConfigFile {
        ConfigFile {
            provider: Some("anthropic".to_string()),
            key_env: Some(var.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_key_env_is_not_used_for_another_provider() {
        std::env::set_var("KULL_TEST_WORK_ANTHROPIC_KEY", "sk-ant-secret");
        let mut config = from_env(&[]);
        config.merge_file(anthropic_file_with_key_env("KULL_TEST_WORK_ANTHROPIC_KEY"));
        let args = Args::try_parse_from(["kull", "-p", "openai"]).unwrap();
        config.apply_args(&args);

        assert_eq!(config.provider, ProviderKind::OpenAI);
        assert_eq!(config.api_key(), None);
        assert_eq!(config.key_env_name(), Some("OPENAI_API_KEY"));
        assert_eq!(config.to_file().key_env, None);
    }

    #[test]
    fn test_key_env_kept_when_provider_flag_matches() {
        std::env::set_var("KULL_TEST_MATCHING_ANTHROPIC_KEY", "sk-ant-work");
        let mut config = from_env(&[]);
        config.merge_file(anthropic_file_with_key_env("KULL_TEST_MATCHING_ANTHROPIC_KEY"));
        let args = Args::try_parse_from(["kull", "-p", "anthropic"]).unwrap();
        config.apply_args(&args);

        assert_eq!(config.api_key().as_deref(), Some("sk-ant-work"));
        assert_eq!(config.key_env_name(), Some("KULL_TEST_MATCHING_ANTHROPIC_KEY"));
    }

    #[test]
    fn test_key_env_binds_to_env_provider_when_file_names_none() {
        let mut config = from_env(&[("KULL_PROVIDER", "openrouter")]);
        config.merge_file(ConfigFile {
            key_env: Some("TEAM_ROUTER_KEY".to_string()),
            ..Default::default()
        });
        assert_eq!(config.key_env_name(), Some("TEAM_ROUTER_KEY"));

        config.apply_args(&Args::try_parse_from(["kull", "-p", "vllm"]).unwrap());
        assert_eq!(config.key_env_name(), Some("VLLM_API_KEY"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kullexai").join("config.toml");
        let config = Config {
            provider: ProviderKind::OpenRouter,
            model: "meta-llama/llama-3-8b-instruct".to_string(),
            redact: Redact::Off,
            key_env: Some(KeyEnv {
                var: "MY_KEY".to_string(),
                provider: ProviderKind::OpenRouter,
            }),
            ..Config::default()
        };
        config.save(&path).unwrap();

        let mut reloaded = Config::default();
        reloaded.merge_file(load_file(&path).unwrap().unwrap());
        assert_eq!(reloaded, config);
    }
}
