//! Configuration Module
//!
//! Layers, lowest precedence first:
//! 1. built-in defaults
//! 2. TOML file (`--config`, else `~/.a2a-purchasing/config.toml` if present)
//! 3. the environment variables the services are documented with
//!    (`API_KEY`, `AUTH_USERNAME`, `PIZZA_SELLER_AGENT_URL`, `GOOGLE_API_KEY`, ...)
//! 4. command-line `--host` / `--port`

use crate::seller::SellerKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub burger: SellerConfig,
    pub pizza: SellerConfig,
    pub concierge: ConciergeConfig,
    pub logging: LoggingConfig,
}

/// Gemini access shared by all three services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Use Vertex AI instead of Google AI Studio.
    pub use_vertexai: bool,
    pub project: Option<String>,
    pub location: String,
    pub api_key: Option<String>,
    /// OAuth access token for Vertex AI, e.g. from `gcloud auth print-access-token`.
    pub access_token: Option<String>,
    /// Overrides each service's default model.
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    /// Retries after the first attempt on 429/5xx.
    pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer secret (pizza).
    pub api_key: Option<String>,
    /// Basic credentials (burger).
    pub username: Option<String>,
    pub password: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConciergeConfig {
    pub host: String,
    pub port: u16,
    pub pizza_url: String,
    /// Credential presented to the pizza seller.
    pub pizza_auth: String,
    pub burger_url: String,
    /// `user:pass` presented to the burger seller.
    pub burger_auth: String,
    pub model: Option<String>,
    pub max_iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
    /// Directory for daily rolling log files; stdout only when unset.
    pub dir: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            use_vertexai: false,
            project: None,
            location: "us-central1".to_string(),
            api_key: None,
            access_token: None,
            model: None,
            base_url: None,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

impl SellerConfig {
    pub fn on_port(port: u16) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port,
            api_key: None,
            username: None,
            password: None,
            model: None,
        }
    }
}

impl Default for ConciergeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            pizza_url: "http://localhost:10000".to_string(),
            pizza_auth: "api_key".to_string(),
            burger_url: "http://localhost:10001".to_string(),
            burger_auth: "user:pass".to_string(),
            model: None,
            max_iterations: crate::brain::agent::DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            dir: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            burger: SellerConfig::on_port(SellerKind::Burger.default_port()),
            pizza: SellerConfig::on_port(SellerKind::Pizza.default_port()),
            concierge: ConciergeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Environment variable → config key. The first variable set wins.
const ENV_MAP: &[(&[&str], &str)] = &[
    (&["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT_ID"], "model.project"),
    (&["GOOGLE_CLOUD_LOCATION", "GCLOUD_LOCATION"], "model.location"),
    (&["GOOGLE_API_KEY"], "model.api_key"),
    (&["GOOGLE_CLOUD_ACCESS_TOKEN"], "model.access_token"),
    (&["GEMINI_MODEL"], "model.model"),
    (&["GEMINI_BASE_URL"], "model.base_url"),
    (&["AUTH_USERNAME"], "burger.username"),
    (&["AUTH_PASSWORD"], "burger.password"),
    (&["API_KEY"], "pizza.api_key"),
    (&["PORT"], "concierge.port"),
    (&["PIZZA_SELLER_AGENT_URL"], "concierge.pizza_url"),
    (&["PIZZA_SELLER_AGENT_AUTH"], "concierge.pizza_auth"),
    (&["BURGER_SELLER_AGENT_URL"], "concierge.burger_url"),
    (&["BURGER_SELLER_AGENT_AUTH"], "concierge.burger_auth"),
];

impl Config {
    /// Load from the given file (or the default location) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load with an explicit environment lookup.
    pub fn load_with(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?);

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                tracing::debug!("Loading config from {}", path.display());
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    tracing::debug!("Loading config from {}", default_path.display());
                }
                builder = builder.add_source(config::File::from(default_path).required(false));
            }
        }

        for (vars, key) in ENV_MAP {
            let value = vars.iter().find_map(|var| env(*var));
            builder = builder.set_override_option(*key, value)?;
        }
        if let Some(flag) = env("GOOGLE_GENAI_USE_VERTEXAI") {
            builder = builder.set_override("model.use_vertexai", parse_flag(&flag))?;
        }

        Ok(builder.build()?.try_deserialize()?)
    }
}

/// `1`, `true`, `yes`, `on` (any case) are true; everything else is false.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Home of local state: `~/.a2a-purchasing/`
pub fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".a2a-purchasing")
}

pub fn default_config_path() -> PathBuf {
    app_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("tempfile");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn test_defaults() {
        let empty = write_config("");
        let config = Config::load_with(Some(empty.path()), env_of(&[])).expect("load");
        assert_eq!(config, Config::default());
        assert_eq!(config.burger.port, 10001);
        assert_eq!(config.pizza.port, 10000);
        assert_eq!(config.concierge.port, 8000);
        assert_eq!(config.concierge.burger_auth, "user:pass");
    }

    #[test]
    fn test_env_overrides() {
        let empty = write_config("");
        let config = Config::load_with(
            Some(empty.path()),
            env_of(&[
                ("API_KEY", "pizza-secret"),
                ("AUTH_USERNAME", "burger"),
                ("AUTH_PASSWORD", "hunter2"),
                ("PORT", "8080"),
                ("GCLOUD_PROJECT_ID", "legacy-project"),
                ("GOOGLE_GENAI_USE_VERTEXAI", "TRUE"),
                ("PIZZA_SELLER_AGENT_URL", "http://pizza:10000"),
                ("GEMINI_MODEL", ""),
            ]),
        )
        .expect("load");

        assert_eq!(config.pizza.api_key.as_deref(), Some("pizza-secret"));
        assert_eq!(config.burger.username.as_deref(), Some("burger"));
        assert_eq!(config.burger.password.as_deref(), Some("hunter2"));
        assert_eq!(config.concierge.port, 8080);
        assert_eq!(config.concierge.pizza_url, "http://pizza:10000");
        assert_eq!(config.model.project.as_deref(), Some("legacy-project"));
        assert!(config.model.use_vertexai);
        assert_eq!(config.model.model, None);
    }

    #[test]
    fn test_first_alias_wins() {
        let empty = write_config("");
        let config = Config::load_with(
            Some(empty.path()),
            env_of(&[
                ("GOOGLE_CLOUD_LOCATION", "europe-west4"),
                ("GCLOUD_LOCATION", "asia-southeast1"),
            ]),
        )
        .expect("load");
        assert_eq!(config.model.location, "europe-west4");
    }

    #[test]
    fn test_file_then_env() {
        let file = write_config(
            r#"
[concierge]
port = 9000
burger_url = "http://burger.internal:10001"

[logging]
level = "debug"
json = true
"#,
        );
        let config = Config::load_with(Some(file.path()), env_of(&[("PORT", "7000")]))
            .expect("load");

        assert_eq!(config.concierge.port, 7000);
        assert_eq!(config.concierge.burger_url, "http://burger.internal:10001");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.concierge.pizza_url, "http://localhost:10000");
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load_with(Some(Path::new("/nonexistent/config.toml")), env_of(&[]))
            .expect_err("missing file");
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("True"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("false"));
    }
}
