use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::boxes::manager::DEFAULT_MAX_LOAD;

pub const DEFAULT_CONFIG_FILE: &str = "zettelstore.toml";
pub const CONFIG_ENV: &str = "ZS_CONFIG";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    pub read_only_mode: bool,
    pub log_level: String,
    pub anteroom_max_load: usize,
    #[serde(rename = "box")]
    pub boxes: Vec<BoxConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BoxConfig {
    pub uri: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_only_mode: false,
            log_level: "info".to_string(),
            anteroom_max_load: DEFAULT_MAX_LOAD,
            boxes: vec![BoxConfig {
                uri: "mem:".to_string(),
            }],
        }
    }
}

impl Config {
    pub fn with_boxes<S: AsRef<str>>(uris: &[S]) -> Self {
        Self {
            boxes: uris
                .iter()
                .map(|uri| BoxConfig {
                    uri: uri.as_ref().to_string(),
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        match fs::read_to_string(&path) {
            Ok(raw) => Self::parse(&raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound && !explicit => {
                tracing::debug!(path = %path.display(), "no configuration file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Io { path, source: err }),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.boxes.is_empty() {
            return Err(ConfigError::Invalid("at least one box is required".to_string()));
        }
        if let Some(blank) = self.boxes.iter().position(|b| b.uri.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("box {} has an empty uri", blank + 1)));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read configuration {}: {}", path.display(), source)
            }
            ConfigError::Toml(err) => write!(f, "invalid configuration TOML: {}", err),
            ConfigError::Invalid(message) => write!(f, "invalid configuration: {}", message),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Toml(value)
    }
}
