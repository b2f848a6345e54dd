//! Effective configuration with provenance
//!
//! Captures the merged configuration plus where each layer came from.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use hostcall_protocol::PROTOCOL_VERSION;

use crate::call::CallerSettings;
use crate::host::CommandConfig;
use crate::request::normalize_object_name;
use crate::structure::ErrorPolicy;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;

/// Project configuration file name, looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "hostcall.toml";

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    User,
    Project,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Merged configuration with its sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// The merged configuration object
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

/// Typed view of the merged configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub protocol_version: i32,
    #[serde(default)]
    pub default_collection: String,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    #[serde(default)]
    pub transport: CommandConfig,
    pub log_level: String,
    /// Opaque session correlation token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl Settings {
    /// Orchestrator settings derived from this configuration
    pub fn caller_settings(&self) -> CallerSettings {
        CallerSettings {
            protocol_version: self.protocol_version,
            default_collection: self.default_collection.clone(),
            session: self.session_token.clone(),
        }
    }
}

/// Keys that contain secrets and are redacted when printed
const SECRET_KEYS: &[&str] = &["password", "token", "secret", "credential"];

/// `~/.config/hostcall/config.toml`, when HOME is set
pub fn user_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("hostcall")
            .join("config.toml")
    })
}

impl EffectiveConfig {
    /// Build effective config from layers; missing files are skipped
    pub fn build(
        user_path: Option<&Path>,
        project_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        for (origin, path) in [
            (ConfigOrigin::User, user_path),
            (ConfigOrigin::Project, project_path),
        ] {
            if let Some(path) = path.filter(|p| p.exists()) {
                let (value, digest) = Self::load_toml_file(path)?;
                debug!(path = %path.display(), digest = %digest, "Loaded config layer");
                layers.push(value);
                sources.push(ConfigSource {
                    origin,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            }
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        Self::validate_config(&merged)?;

        Ok(Self {
            created_at: Utc::now(),
            config: merged,
            sources,
        })
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;
        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        Ok((Self::toml_to_json(toml_value), digest))
    }

    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => Value::Array(arr.into_iter().map(Self::toml_to_json).collect()),
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    fn validate_config(config: &Value) -> Result<(), ConfigError> {
        match config.get("protocol_version").and_then(Value::as_i64) {
            Some(v) if v == PROTOCOL_VERSION as i64 => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "protocol_version must be {} (got {})",
                    PROTOCOL_VERSION,
                    other.map_or("none".to_string(), |v| v.to_string())
                )))
            }
        }

        if let Some(collection) = config.get("default_collection").and_then(Value::as_str) {
            if !collection.is_empty() && normalize_object_name(collection).is_err() {
                return Err(ConfigError::ValidationError(format!(
                    "default_collection '{}' is not a valid object name",
                    collection
                )));
            }
        }

        if let Some(policy) = config.get("error_policy") {
            if serde_json::from_value::<ErrorPolicy>(policy.clone()).is_err() {
                return Err(ConfigError::ValidationError(
                    "error_policy must be \"capture\" or \"escalate\"".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Typed settings
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        serde_json::from_value(self.config.clone())
            .map_err(|e| ConfigError::ValidationError(format!("Invalid configuration: {}", e)))
    }

    /// Copy of the merged config with secret-like values replaced, plus the redacted paths
    pub fn redacted(&self) -> (Value, Vec<String>) {
        let mut value = self.config.clone();
        let mut redactions = Vec::new();
        Self::redact_recursive(&mut value, String::new(), &mut redactions);
        (value, redactions)
    }

    fn redact_recursive(value: &mut Value, path: String, redactions: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let current_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };
                    let key_lower = key.to_lowercase();
                    let is_secret = SECRET_KEYS.iter().any(|s| key_lower.contains(s));

                    if is_secret && !val.is_object() && !val.is_array() {
                        *val = Value::String("[REDACTED]".to_string());
                        redactions.push(current_path);
                    } else {
                        Self::redact_recursive(val, current_path, redactions);
                    }
                }
            }
            Value::Array(arr) => {
                for (i, val) in arr.iter_mut().enumerate() {
                    Self::redact_recursive(val, format!("{}[{}]", path, i), redactions);
                }
            }
            _ => {}
        }
    }

    /// Printable JSON with secrets redacted
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let (config, redactions) = self.redacted();
        serde_json::to_string_pretty(&serde_json::json!({
            "created_at": self.created_at,
            "config": config,
            "sources": self.sources,
            "redactions": redactions,
        }))
    }

    /// Get a config value by path (dot-separated)
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.config;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
