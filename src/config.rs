// src/config.rs - Layered configuration system

//! Configuration for the storefront core.
//!
//! Settings are resolved from stacked layers: built-in defaults, an optional
//! configuration file (JSON, YAML, or TOML, detected by extension), process
//! environment variables, and runtime overrides. Higher-priority layers win
//! key by key; changes made at runtime are broadcast to subscribers.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::manager::{ManagedState, Manager, ManagerState, ManagerStatus};
use crate::utils::validation;

/// Prefix for environment-variable configuration keys.
/// `SOLEWORKS_STORE__FREE_SHIPPING_THRESHOLD=120` maps to
/// `store.free_shipping_threshold`.
pub const ENV_PREFIX: &str = "SOLEWORKS";

const PRIORITY_DEFAULTS: u32 = 0;
const PRIORITY_FILE: u32 = 50;
const PRIORITY_ENVIRONMENT: u32 = 100;
const PRIORITY_OVERRIDE: u32 = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigChangeEvent {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub key: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(Self::Json),
            Some("yaml") | Some("yml") => Some(Self::Yaml),
            Some("toml") => Some(Self::Toml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Defaults,
    File(PathBuf),
    Environment,
    Override,
}

#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub name: String,
    pub source: ConfigSource,
    pub priority: u32,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSettings,
    pub store: StoreConfig,
    pub session: SessionConfig,
    pub generation: GenerationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "Soleworks".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Storefront pricing and display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// ISO currency code used for display formatting
    pub currency: String,
    /// Orders strictly above this subtotal ship free
    pub free_shipping_threshold: f64,
    /// Flat fee applied below the free-shipping threshold
    pub standard_shipping_fee: f64,
    /// Number of products surfaced on the landing slice
    pub featured_count: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            currency: "KES".to_string(),
            free_shipping_threshold: 150.0,
            standard_shipping_fee: 15.0,
            featured_count: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub session_timeout_minutes: u64,
    pub password_min_length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout_minutes: 480, // 8 hours
            password_min_length: 6,
        }
    }
}

/// Settings for the external generation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub image_model: String,
    pub text_model: String,
    /// Name of the environment variable holding the API key. The key itself
    /// never lives in configuration files.
    pub api_key_env: String,
    pub image_aspect_ratio: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            image_model: "gemini-3-pro-image-preview".to_string(),
            text_model: "gemini-2.0-flash".to_string(),
            api_key_env: "GENAI_API_KEY".to_string(),
            image_aspect_ratio: "1:1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub console: bool,
    pub file: Option<FileLogConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            console: true,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLogConfig {
    pub directory: PathBuf,
    pub file_name_prefix: String,
}

impl Default for FileLogConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_name_prefix: "soleworks".to_string(),
        }
    }
}

/// Layered configuration manager
pub struct ConfigManager {
    state: ManagedState,
    layers: RwLock<Vec<ConfigLayer>>,
    change_tx: broadcast::Sender<ConfigChangeEvent>,
    config_path: Option<PathBuf>,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("config_path", &self.config_path)
            .finish()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(64);
        Self {
            state: ManagedState::new(Uuid::new_v4(), "config_manager"),
            layers: RwLock::new(Vec::new()),
            change_tx,
            config_path: None,
        }
    }

    pub fn with_config_file<P: AsRef<Path>>(config_path: P) -> Self {
        let mut manager = Self::new();
        manager.config_path = Some(config_path.as_ref().to_path_buf());
        manager
    }

    fn defaults_layer() -> Result<ConfigLayer> {
        let data = serde_json::to_value(AppConfig::default())?;
        Ok(ConfigLayer {
            name: "defaults".to_string(),
            source: ConfigSource::Defaults,
            priority: PRIORITY_DEFAULTS,
            data,
        })
    }

    fn file_layer(path: &Path) -> Result<ConfigLayer> {
        let format = ConfigFormat::from_extension(path).ok_or_else(|| {
            Error::config(format!(
                "Unrecognized configuration file extension: {}",
                path.display()
            ))
        })?;

        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}", path.display())).caused_by(e)
        })?;

        let data = match format {
            ConfigFormat::Json => serde_json::from_str::<Value>(&raw).map_err(|e| {
                Error::config(format!("Invalid JSON in {}", path.display())).caused_by(e)
            })?,
            ConfigFormat::Yaml => serde_yaml::from_str::<Value>(&raw).map_err(|e| {
                Error::config(format!("Invalid YAML in {}", path.display())).caused_by(e)
            })?,
            ConfigFormat::Toml => {
                let parsed: toml::Value = toml::from_str(&raw).map_err(|e| {
                    Error::config(format!("Invalid TOML in {}", path.display())).caused_by(e)
                })?;
                serde_json::to_value(parsed)?
            }
        };

        Ok(ConfigLayer {
            name: format!("file:{}", path.display()),
            source: ConfigSource::File(path.to_path_buf()),
            priority: PRIORITY_FILE,
            data,
        })
    }

    fn env_layer() -> ConfigLayer {
        let prefix = format!("{}_", ENV_PREFIX);
        let mut data = Value::Object(serde_json::Map::new());

        for (name, raw) in std::env::vars() {
            let Some(stripped) = name.strip_prefix(&prefix) else {
                continue;
            };
            let key = stripped
                .split("__")
                .map(|part| part.to_lowercase())
                .collect::<Vec<_>>()
                .join(".");

            // Scalars parse as JSON where possible so numbers and booleans
            // keep their types; everything else stays a string.
            let value =
                serde_json::from_str::<Value>(&raw).unwrap_or_else(|_| Value::String(raw));
            Self::insert_path(&mut data, &key, value);
        }

        ConfigLayer {
            name: "environment".to_string(),
            source: ConfigSource::Environment,
            priority: PRIORITY_ENVIRONMENT,
            data,
        }
    }

    fn insert_path(root: &mut Value, key: &str, value: Value) {
        let mut current = root;
        let parts: Vec<&str> = key.split('.').collect();

        for (i, part) in parts.iter().enumerate() {
            if !current.is_object() {
                *current = Value::Object(serde_json::Map::new());
            }
            let map = match current.as_object_mut() {
                Some(map) => map,
                None => return,
            };

            if i == parts.len() - 1 {
                map.insert((*part).to_string(), value);
                return;
            }

            current = map
                .entry((*part).to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
        }
    }

    fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
        let mut current = root;
        for part in key.split('.') {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    fn merge_into(base: &mut Value, overlay: &Value) {
        match (base, overlay) {
            (Value::Object(base_map), Value::Object(overlay_map)) => {
                for (key, overlay_value) in overlay_map {
                    match base_map.get_mut(key) {
                        Some(base_value) => Self::merge_into(base_value, overlay_value),
                        None => {
                            base_map.insert(key.clone(), overlay_value.clone());
                        }
                    }
                }
            }
            (base, overlay) => *base = overlay.clone(),
        }
    }

    async fn merged(&self) -> Value {
        let layers = self.layers.read().await;
        let mut sorted: Vec<&ConfigLayer> = layers.iter().collect();
        sorted.sort_by_key(|layer| layer.priority);

        let mut merged = Value::Object(serde_json::Map::new());
        for layer in sorted {
            Self::merge_into(&mut merged, &layer.data);
        }
        merged
    }

    /// Rebuilds the defaults, file, and environment layers, preserving
    /// runtime overrides.
    pub async fn reload(&self) -> Result<()> {
        let mut rebuilt = vec![Self::defaults_layer()?];
        if let Some(path) = &self.config_path {
            rebuilt.push(Self::file_layer(path)?);
        }
        rebuilt.push(Self::env_layer());

        let mut layers = self.layers.write().await;
        layers.retain(|layer| layer.source == ConfigSource::Override);
        layers.extend(rebuilt);
        Ok(())
    }

    /// Gets a value by dotted key from the merged view
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let merged = self.merged().await;
        let value = Self::lookup(&merged, key)
            .ok_or_else(|| Error::config_key(key, format!("Configuration key '{}' not found", key)))?;
        serde_json::from_value(value.clone())
            .map_err(|e| Error::config_key(key, format!("Type mismatch for '{}'", key)).caused_by(e))
    }

    /// Sets a runtime override by dotted key and broadcasts the change
    pub async fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let new_value = serde_json::to_value(value)?;
        let old_value = Self::lookup(&self.merged().await, key).cloned();

        {
            let mut layers = self.layers.write().await;
            let overrides = layers
                .iter_mut()
                .find(|layer| layer.source == ConfigSource::Override);
            match overrides {
                Some(layer) => Self::insert_path(&mut layer.data, key, new_value.clone()),
                None => {
                    let mut data = Value::Object(serde_json::Map::new());
                    Self::insert_path(&mut data, key, new_value.clone());
                    layers.push(ConfigLayer {
                        name: "overrides".to_string(),
                        source: ConfigSource::Override,
                        priority: PRIORITY_OVERRIDE,
                        data,
                    });
                }
            }
        }

        let _ = self.change_tx.send(ConfigChangeEvent {
            key: key.to_string(),
            old_value,
            new_value,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Deserializes the merged view into the typed configuration tree
    pub async fn app_config(&self) -> Result<AppConfig> {
        let merged = self.merged().await;
        serde_json::from_value(merged)
            .map_err(|e| Error::config("Configuration does not match the expected shape").caused_by(e))
    }

    pub fn subscribe_to_changes(&self) -> broadcast::Receiver<ConfigChangeEvent> {
        self.change_tx.subscribe()
    }

    /// Validates the merged configuration, returning all issues found
    pub async fn validate(&self) -> Result<Vec<ValidationIssue>> {
        let config = self.app_config().await?;
        let mut issues = Vec::new();

        if config.store.free_shipping_threshold < 0.0 {
            issues.push(ValidationIssue {
                key: "store.free_shipping_threshold".to_string(),
                message: "Free-shipping threshold must be non-negative".to_string(),
            });
        }
        if config.store.standard_shipping_fee < 0.0 {
            issues.push(ValidationIssue {
                key: "store.standard_shipping_fee".to_string(),
                message: "Shipping fee must be non-negative".to_string(),
            });
        }
        if config.store.currency.trim().is_empty() {
            issues.push(ValidationIssue {
                key: "store.currency".to_string(),
                message: "Currency code must not be empty".to_string(),
            });
        }
        if config.session.password_min_length == 0 {
            issues.push(ValidationIssue {
                key: "session.password_min_length".to_string(),
                message: "Minimum password length must be at least 1".to_string(),
            });
        }
        if !validation::is_valid_url(&config.generation.endpoint) {
            issues.push(ValidationIssue {
                key: "generation.endpoint".to_string(),
                message: "Generation endpoint must be an http(s) URL".to_string(),
            });
        }
        if config.generation.api_key_env.trim().is_empty() {
            issues.push(ValidationIssue {
                key: "generation.api_key_env".to_string(),
                message: "API key environment variable name must not be empty".to_string(),
            });
        }

        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        let level = config.logging.level.to_lowercase();
        if !LEVELS.contains(&level.as_str()) && !level.contains('=') {
            issues.push(ValidationIssue {
                key: "logging.level".to_string(),
                message: format!("Unknown log level '{}'", config.logging.level),
            });
        }

        Ok(issues)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Manager for ConfigManager {
    fn name(&self) -> &str {
        "config_manager"
    }

    fn id(&self) -> Uuid {
        self.state.id()
    }

    async fn initialize(&mut self) -> Result<()> {
        self.state.set_state(ManagerState::Initializing).await;
        self.reload().await?;

        let layer_count = self.layers.read().await.len();
        self.state
            .add_metadata("layers", serde_json::Value::from(layer_count))
            .await;
        if let Some(path) = &self.config_path {
            self.state
                .add_metadata(
                    "config_file",
                    serde_json::Value::String(path.display().to_string()),
                )
                .await;
        }

        self.state.set_state(ManagerState::Running).await;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.state.set_state(ManagerState::ShuttingDown).await;
        self.state.set_state(ManagerState::Shutdown).await;
        Ok(())
    }

    async fn status(&self) -> ManagerStatus {
        self.state.status().await
    }

    async fn get_config(&self) -> Option<serde_json::Value> {
        Some(self.merged().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_defaults() {
        let mut manager = ConfigManager::new();
        manager.initialize().await.unwrap();

        let config = manager.app_config().await.unwrap();
        assert_eq!(config.store.free_shipping_threshold, 150.0);
        assert_eq!(config.store.standard_shipping_fee, 15.0);
        assert_eq!(config.session.password_min_length, 6);
        assert!(config.logging.console);
    }

    #[tokio::test]
    async fn test_file_layer_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"store": {{"free_shipping_threshold": 200.0, "currency": "USD"}}}}"#
        )
        .unwrap();

        let mut manager = ConfigManager::with_config_file(file.path());
        manager.initialize().await.unwrap();

        let config = manager.app_config().await.unwrap();
        assert_eq!(config.store.free_shipping_threshold, 200.0);
        assert_eq!(config.store.currency, "USD");
        // Untouched keys keep their defaults
        assert_eq!(config.store.standard_shipping_fee, 15.0);
    }

    #[tokio::test]
    async fn test_toml_file_layer() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "[store]\nstandard_shipping_fee = 9.5\n").unwrap();

        let mut manager = ConfigManager::with_config_file(file.path());
        manager.initialize().await.unwrap();

        let fee: f64 = manager.get("store.standard_shipping_fee").await.unwrap();
        assert_eq!(fee, 9.5);
    }

    #[tokio::test]
    async fn test_set_broadcasts_and_wins() {
        let mut manager = ConfigManager::new();
        manager.initialize().await.unwrap();
        let mut changes = manager.subscribe_to_changes();

        manager.set("store.featured_count", 8usize).await.unwrap();

        let count: usize = manager.get("store.featured_count").await.unwrap();
        assert_eq!(count, 8);

        let event = changes.try_recv().unwrap();
        assert_eq!(event.key, "store.featured_count");
        assert_eq!(event.new_value, serde_json::Value::from(8));
    }

    #[tokio::test]
    async fn test_overrides_survive_reload() {
        let mut manager = ConfigManager::new();
        manager.initialize().await.unwrap();

        manager.set("app.environment", "staging").await.unwrap();
        manager.reload().await.unwrap();

        let environment: String = manager.get("app.environment").await.unwrap();
        assert_eq!(environment, "staging");
    }

    #[tokio::test]
    async fn test_validate_flags_bad_values() {
        let mut manager = ConfigManager::new();
        manager.initialize().await.unwrap();

        manager
            .set("store.free_shipping_threshold", -1.0f64)
            .await
            .unwrap();
        manager.set("logging.level", "loud").await.unwrap();

        let issues = manager.validate().await.unwrap();
        let keys: Vec<&str> = issues.iter().map(|i| i.key.as_str()).collect();
        assert!(keys.contains(&"store.free_shipping_threshold"));
        assert!(keys.contains(&"logging.level"));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension(Path::new("app.json")),
            Some(ConfigFormat::Json)
        );
        assert_eq!(
            ConfigFormat::from_extension(Path::new("app.yml")),
            Some(ConfigFormat::Yaml)
        );
        assert_eq!(
            ConfigFormat::from_extension(Path::new("app.toml")),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(ConfigFormat::from_extension(Path::new("app.ini")), None);
    }

    #[test]
    fn test_insert_and_lookup_paths() {
        let mut root = Value::Object(serde_json::Map::new());
        ConfigManager::insert_path(&mut root, "store.currency", Value::String("USD".into()));

        let found = ConfigManager::lookup(&root, "store.currency").unwrap();
        assert_eq!(found, &Value::String("USD".into()));
        assert!(ConfigManager::lookup(&root, "store.missing").is_none());
    }
}
