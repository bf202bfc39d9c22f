use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_BASE_URL: &str = "https://bridge-back.admlr.lipetsk.ru";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Model name advertised to callers and echoed in every response.
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub params: ParamsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions_url: Option<String>,
    /// Backend model identifier; never shown to callers.
    #[serde(default = "default_bridge_model")]
    pub model: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub default_api_key: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Sampling parameters forwarded to the bridge in addition to
/// `temperature` and `max_tokens`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamsConfig {
    #[serde(default)]
    pub forward: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_model_name() -> String {
    "deepseek-v3".to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_bridge_model() -> String {
    "deepseek-ai/DeepSeek-V3-0324".to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_request_timeout() -> u64 {
    300
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            completions_url: None,
            model: default_bridge_model(),
            user_agent: default_user_agent(),
            default_api_key: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            model_name: default_model_name(),
            bridge: BridgeConfig::default(),
            params: ParamsConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file, falling back to defaults.
    /// Priority: CLI arg > CWD > XDG config > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Apply the process environment on top of the file settings.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup. Empty values are ignored
    /// except for `DEFAULT_API_KEY`, where empty means "no default".
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("BRIDGE_BASE_URL") {
            self.bridge.base_url = url;
        }
        if let Some(url) = non_empty("BRIDGE_COMPLETIONS_URL") {
            self.bridge.completions_url = Some(url);
        }
        if let Some(key) = lookup("DEFAULT_API_KEY") {
            self.bridge.default_api_key = key;
        }
        if let Some(name) = non_empty("MODEL_NAME") {
            self.model_name = name;
        }
        if let Some(model) = non_empty("BRIDGE_MODEL") {
            self.bridge.model = model;
        }
        if let Some(ua) = non_empty("USER_AGENT") {
            self.bridge.user_agent = ua;
        }
        if let Some(port) = non_empty("PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| GatewayError::config(format!("PORT is not a valid port: {port}")))?;
        }
        Ok(())
    }

    /// Full URL of the bridge completions endpoint.
    pub fn completions_url(&self) -> String {
        match self.bridge.completions_url {
            Some(ref url) => url.clone(),
            None => format!(
                "{}/api/v1/completions",
                self.bridge.base_url.trim_end_matches('/')
            ),
        }
    }

    /// The configured fallback credential, if any.
    pub fn default_api_key(&self) -> Option<&str> {
        let key = self.bridge.default_api_key.trim();
        (!key.is_empty()).then_some(key)
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("bridge-gateway.toml")];

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("bridge-gateway").join("config.toml"));
    }

    if let Some(home) = std::env::var("HOME").ok().map(PathBuf::from) {
        paths.push(home.join(".config").join("bridge-gateway").join("config.toml"));
        paths.push(home.join(".bridge-gateway.toml"));
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 9100
model_name = "gpt-4o"

[bridge]
base_url = "https://bridge.example.com/"
model = "org/Model-1"
default_api_key = "fallback"

[params]
forward = ["top_p"]
"#
        )
        .unwrap();

        let config = GatewayConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.model_name, "gpt-4o");
        assert_eq!(config.bridge.model, "org/Model-1");
        assert_eq!(config.bridge.request_timeout_secs, 300);
        assert_eq!(config.default_api_key(), Some("fallback"));
        assert_eq!(config.params.forward, vec!["top_p".to_string()]);
        assert_eq!(
            config.completions_url(),
            "https://bridge.example.com/api/v1/completions"
        );
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.model_name, "deepseek-v3");
        assert_eq!(config.bridge.model, "deepseek-ai/DeepSeek-V3-0324");
        assert_eq!(config.default_api_key(), None);
        assert_eq!(
            config.completions_url(),
            "https://bridge-back.admlr.lipetsk.ru/api/v1/completions"
        );
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("BRIDGE_BASE_URL", "http://localhost:9000"),
            ("MODEL_NAME", "public-model"),
            ("BRIDGE_MODEL", "backend-model"),
            ("DEFAULT_API_KEY", "  "),
            ("PORT", "8123"),
        ]);

        let mut config = GatewayConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.completions_url(), "http://localhost:9000/api/v1/completions");
        assert_eq!(config.model_name, "public-model");
        assert_eq!(config.bridge.model, "backend-model");
        assert_eq!(config.default_api_key(), None);
        assert_eq!(config.port, 8123);
    }

    #[test]
    fn test_explicit_completions_url_wins() {
        let env = HashMap::from([
            ("BRIDGE_BASE_URL", "http://a"),
            ("BRIDGE_COMPLETIONS_URL", "http://b/v2/complete"),
        ]);
        let mut config = GatewayConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.completions_url(), "http://b/v2/complete");
    }

    #[test]
    fn test_bad_port_is_config_error() {
        let mut config = GatewayConfig::default();
        let err = config
            .apply_overrides(|k| (k == "PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config { .. }));
    }
}
