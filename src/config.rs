//! TOML configuration
//!
//! Every section is optional; a missing file or section falls back to the
//! defaults below. Cloud backends read their API key from the file or, when
//! absent there, from the `VITALS_API_KEY` environment variable.

use crate::ai::{
    GeminiBackend, MockBackend, OllamaBackend, OpenAIBackend, TextGenerator, UserProfile,
};
use crate::error::ConfigError;
use crate::providers::{FileProvider, HealthDataProvider, SyntheticProvider};
use crate::store::NotificationSettings;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "VITALS_API_KEY";

/// Where the loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Defaults,
    /// The given path did not exist, so defaults were used
    MissingFile(PathBuf),
    File(PathBuf),
}

impl ConfigSource {
    /// Log how the configuration was resolved
    pub fn report(&self) {
        match self {
            ConfigSource::Defaults => info!("Using default configuration"),
            ConfigSource::MissingFile(path) => warn!(
                "Configuration file '{}' not found, using defaults",
                path.display()
            ),
            ConfigSource::File(path) => {
                info!("Loaded configuration from: {}", path.display());
                if path.extension().map_or(true, |ext| ext != "toml") {
                    warn!(
                        "Configuration file does not have .toml extension: {}",
                        path.display()
                    );
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ai: AIBackendConfig,
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    pub profile: UserProfile,
    /// Seeded into the store when no settings row exists yet
    pub notifications: NotificationSettings,
    pub logging: LoggingConfig,
}

/// Text generation backend, selected by the `backend` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum AIBackendConfig {
    Gemini {
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_gemini_model")]
        model: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    OpenAI {
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    Ollama {
        #[serde(default = "default_ollama_endpoint")]
        endpoint: String,
        #[serde(default = "default_ollama_model")]
        model: String,
    },
    /// Offline backend; answers with `response` or `NO_NOTIFICATION`
    Mock {
        #[serde(default)]
        response: Option<String>,
    },
}

impl Default for AIBackendConfig {
    fn default() -> Self {
        AIBackendConfig::Mock { response: None }
    }
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("vitals.db"),
        }
    }
}

/// Where health samples come from, selected by the `kind` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderConfig {
    Synthetic {
        #[serde(default)]
        seed: u64,
    },
    /// JSON export re-read on every query
    File { path: PathBuf },
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Synthetic { seed: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `env_logger` filter used when neither `--verbose` nor `RUST_LOG` is set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(contents: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Read and validate a configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        contents.parse()
    }

    /// Load `path` if given; a missing file yields the defaults
    ///
    /// Nothing is logged here since logging is configured from the result.
    /// Call `ConfigSource::report` once the logger is up.
    pub fn load(path: Option<&Path>) -> Result<(Self, ConfigSource), ConfigError> {
        let Some(path) = path else {
            return Ok((Config::default(), ConfigSource::Defaults));
        };

        if !path.exists() {
            return Ok((
                Config::default(),
                ConfigSource::MissingFile(path.to_path_buf()),
            ));
        }

        let config = Self::from_file(path)?;
        Ok((config, ConfigSource::File(path.to_path_buf())))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_with_env_key(std::env::var(API_KEY_ENV).ok())
    }

    fn validate_with_env_key(&self, env_key: Option<String>) -> Result<(), ConfigError> {
        self.notifications
            .validate()
            .map_err(ConfigError::ValidationError)?;

        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.path must not be empty".to_string(),
            ));
        }

        if let ProviderConfig::File { path } = &self.provider {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::ValidationError(
                    "provider.path must not be empty".to_string(),
                ));
            }
        }

        match &self.ai {
            AIBackendConfig::Gemini { api_key, model, .. }
            | AIBackendConfig::OpenAI { api_key, model, .. } => {
                if resolve_api_key(api_key.as_deref(), env_key).is_none() {
                    return Err(ConfigError::ValidationError(format!(
                        "an API key is required for the cloud backend (set ai.api_key or {})",
                        API_KEY_ENV
                    )));
                }
                if model.trim().is_empty() {
                    return Err(ConfigError::ValidationError(
                        "ai.model must not be empty".to_string(),
                    ));
                }
            }
            AIBackendConfig::Ollama { endpoint, model } => {
                if endpoint.trim().is_empty() || model.trim().is_empty() {
                    return Err(ConfigError::ValidationError(
                        "ai.endpoint and ai.model must not be empty".to_string(),
                    ));
                }
            }
            AIBackendConfig::Mock { .. } => {}
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "logging.level must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Instantiate the configured text generation backend
    pub fn build_backend(&self) -> Result<Arc<dyn TextGenerator>, ConfigError> {
        self.build_backend_with_env_key(std::env::var(API_KEY_ENV).ok())
    }

    fn build_backend_with_env_key(
        &self,
        env_key: Option<String>,
    ) -> Result<Arc<dyn TextGenerator>, ConfigError> {
        let missing_key = || {
            ConfigError::ValidationError(format!("no API key configured and {} is unset", API_KEY_ENV))
        };

        let backend: Arc<dyn TextGenerator> = match &self.ai {
            AIBackendConfig::Gemini {
                api_key,
                model,
                base_url,
            } => {
                let key = resolve_api_key(api_key.as_deref(), env_key).ok_or_else(missing_key)?;
                match base_url {
                    Some(url) => Arc::new(GeminiBackend::with_base_url(key, model.clone(), url.clone())),
                    None => Arc::new(GeminiBackend::new(key, model.clone())),
                }
            }
            AIBackendConfig::OpenAI {
                api_key,
                model,
                base_url,
            } => {
                let key = resolve_api_key(api_key.as_deref(), env_key).ok_or_else(missing_key)?;
                match base_url {
                    Some(url) => Arc::new(OpenAIBackend::with_base_url(key, model.clone(), url.clone())),
                    None => Arc::new(OpenAIBackend::new(key, model.clone())),
                }
            }
            AIBackendConfig::Ollama { endpoint, model } => {
                Arc::new(OllamaBackend::new(endpoint.clone(), model.clone()))
            }
            AIBackendConfig::Mock { response } => match response {
                Some(text) => Arc::new(MockBackend::with_text(text.clone())),
                None => Arc::new(MockBackend::silent()),
            },
        };

        info!("Using '{}' text generation backend", backend.name());
        Ok(backend)
    }

    /// Instantiate the configured health data provider
    pub fn build_provider(&self) -> Arc<dyn HealthDataProvider> {
        match &self.provider {
            ProviderConfig::Synthetic { seed } => Arc::new(SyntheticProvider::new(*seed)),
            ProviderConfig::File { path } => Arc::new(FileProvider::new(path.clone())),
        }
    }
}

fn resolve_api_key(configured: Option<&str>, env_key: Option<String>) -> Option<String> {
    configured
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .or_else(|| env_key.filter(|key| !key.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const FULL_CONFIG: &str = r#"
[ai]
backend = "gemini"
api_key = "secret"
model = "gemini-1.5-pro"

[database]
path = "/tmp/vitals/test.db"

[provider]
kind = "file"
path = "/tmp/vitals/export.json"

[profile]
name = "Sam"
age = 34
goals = "Walk more"

[notifications]
enabled = true
start_hour = 22
end_hour = 8
allow_overnight = true
check_interval_minutes = 30

[logging]
level = "debug"
"#;

    #[test]
    fn test_parse_full_config() {
        let config: Config = FULL_CONFIG.parse().unwrap();

        assert_eq!(
            config.ai,
            AIBackendConfig::Gemini {
                api_key: Some("secret".to_string()),
                model: "gemini-1.5-pro".to_string(),
                base_url: None,
            }
        );
        assert_eq!(config.database.path, PathBuf::from("/tmp/vitals/test.db"));
        assert_eq!(
            config.provider,
            ProviderConfig::File {
                path: PathBuf::from("/tmp/vitals/export.json")
            }
        );
        assert_eq!(config.profile.name, "Sam");
        assert_eq!(config.profile.age, Some(34));
        assert_eq!(config.notifications.start_hour, 22);
        assert!(config.notifications.allow_overnight);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = "".parse().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.ai, AIBackendConfig::Mock { response: None });
        assert_eq!(config.notifications, NotificationSettings::default());
    }

    #[test]
    fn test_backend_defaults_fill_missing_fields() {
        let config: Config = "[ai]\nbackend = \"ollama\"\n".parse().unwrap();
        assert_eq!(
            config.ai,
            AIBackendConfig::Ollama {
                endpoint: "http://localhost:11434".to_string(),
                model: "llama3".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result: Result<Config, _> = "[ai]\nbackend = \"claude\"\n".parse();
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_invalid_hours_are_rejected() {
        let result: Result<Config, _> = "[notifications]\nstart_hour = 24\n".parse();
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_empty_paths_are_rejected() {
        let mut config = Config::default();
        config.database.path = PathBuf::new();
        assert!(matches!(
            config.validate_with_env_key(None),
            Err(ConfigError::ValidationError(_))
        ));

        let config = Config {
            provider: ProviderConfig::File {
                path: PathBuf::new(),
            },
            ..Default::default()
        };
        assert!(config.validate_with_env_key(None).is_err());
    }

    #[test]
    fn test_cloud_backend_requires_key() {
        let config = Config {
            ai: AIBackendConfig::OpenAI {
                api_key: None,
                model: default_openai_model(),
                base_url: None,
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate_with_env_key(None),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(config
            .validate_with_env_key(Some("from-env".to_string()))
            .is_ok());
        assert!(config.build_backend_with_env_key(None).is_err());

        let backend = config
            .build_backend_with_env_key(Some("from-env".to_string()))
            .unwrap();
        assert_eq!(backend.name(), "openai");
    }

    #[test]
    fn test_configured_key_wins_over_env() {
        assert_eq!(
            resolve_api_key(Some("file"), Some("env".to_string())),
            Some("file".to_string())
        );
        assert_eq!(
            resolve_api_key(Some("  "), Some("env".to_string())),
            Some("env".to_string())
        );
        assert_eq!(resolve_api_key(None, Some(" ".to_string())), None);
    }

    #[test]
    fn test_build_mock_backend_and_provider() {
        let config: Config = "[ai]\nbackend = \"mock\"\nresponse = \"[NOTIFICATION: hi]\"\n\n[provider]\nkind = \"synthetic\"\nseed = 9\n"
            .parse()
            .unwrap();
        assert_eq!(config.build_backend().unwrap().name(), "mock");
        assert_eq!(config.build_provider().name(), "synthetic");
    }

    #[test]
    fn test_from_file_and_missing_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FULL_CONFIG.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.profile.goals.as_deref(), Some("Walk more"));

        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Config::from_file(&missing),
            Err(ConfigError::ReadError(_))
        ));
        assert_eq!(
            Config::load(Some(&missing)).unwrap(),
            (Config::default(), ConfigSource::MissingFile(missing.clone()))
        );
        assert_eq!(
            Config::load(None).unwrap(),
            (Config::default(), ConfigSource::Defaults)
        );

        let (loaded, source) = Config::load(Some(file.path())).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(source, ConfigSource::File(file.path().to_path_buf()));
    }
}
