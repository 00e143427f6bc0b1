// src/app.rs - Application core with all systems integrated

//! Composition root for the storefront. Managers are initialized in
//! dependency order (configuration, logging, events, storefront state,
//! generation), the demo catalog is seeded, and shutdown walks the same
//! chain in reverse. The generation boundary is optional at runtime: when
//! no API key is present the rest of the storefront still works.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::catalog::demo_catalog;
use crate::config::{AppConfig, ConfigManager};
use crate::error::{Error, ErrorKind, Result};
use crate::event::EventBusManager;
use crate::generation::{GenerationManager, HttpGenerationProvider};
use crate::logging::LoggingManager;
use crate::manager::{HealthStatus, ManagedState, Manager, ManagerState, ManagerStatus};
use crate::store::{StorePolicy, StorefrontManager};

static APP_CORE: OnceCell<Arc<RwLock<ApplicationCore>>> = OnceCell::new();

/// Publishes the application core for global access
pub fn set_application_core(core: ApplicationCore) {
    let _ = APP_CORE.set(Arc::new(RwLock::new(core)));
}

/// Returns the globally published application core, when set
pub fn get_application_core() -> Option<Arc<RwLock<ApplicationCore>>> {
    APP_CORE.get().cloned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationState {
    Created,
    Initializing,
    Running,
    ShuttingDown,
    Shutdown,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationHealth {
    pub status: HealthStatus,
    pub uptime: Duration,
    pub managers: HashMap<String, HealthStatus>,
    pub last_check: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationStats {
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub uptime: Duration,
    pub state: ApplicationState,
    pub manager_count: usize,
    pub product_count: usize,
    pub cart_item_count: u32,
    pub generation_enabled: bool,
}

/// Application core wiring every manager together
pub struct ApplicationCore {
    state: ManagedState,
    app_state: Arc<RwLock<ApplicationState>>,
    started_at: DateTime<Utc>,

    config_manager: Option<Arc<ConfigManager>>,
    logging_manager: Option<LoggingManager>,
    event_bus_manager: Option<Arc<EventBusManager>>,
    storefront_manager: Option<Arc<StorefrontManager>>,
    generation_manager: Option<GenerationManager>,
}

impl std::fmt::Debug for ApplicationCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationCore")
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl ApplicationCore {
    pub fn new() -> Self {
        Self {
            state: ManagedState::new(Uuid::new_v4(), "application_core"),
            app_state: Arc::new(RwLock::new(ApplicationState::Created)),
            started_at: Utc::now(),
            config_manager: Some(Arc::new(ConfigManager::new())),
            logging_manager: None,
            event_bus_manager: None,
            storefront_manager: None,
            generation_manager: None,
        }
    }

    pub fn with_config_file(config_path: impl AsRef<Path>) -> Self {
        let mut core = Self::new();
        core.config_manager = Some(Arc::new(ConfigManager::with_config_file(config_path)));
        core
    }

    /// Initializes all managers in dependency order
    pub async fn initialize(&mut self) -> Result<()> {
        *self.app_state.write().await = ApplicationState::Initializing;
        self.state.set_state(ManagerState::Initializing).await;

        match self.initialize_managers().await {
            Ok(()) => {
                *self.app_state.write().await = ApplicationState::Running;
                self.state.set_state(ManagerState::Running).await;
                tracing::info!("Application core initialized");
                Ok(())
            }
            Err(e) => {
                *self.app_state.write().await = ApplicationState::Error;
                self.state.set_state(ManagerState::Error).await;
                Err(e)
            }
        }
    }

    async fn initialize_managers(&mut self) -> Result<()> {
        self.init_config_manager().await?;
        let config = self.app_config().await?;

        self.init_logging_manager(&config).await?;
        self.init_event_bus_manager().await?;
        self.init_storefront_manager(&config).await?;
        self.init_generation_manager(&config).await?;
        Ok(())
    }

    async fn init_config_manager(&mut self) -> Result<()> {
        let config_arc = self
            .config_manager
            .as_mut()
            .ok_or_else(|| Error::config("Configuration manager missing"))?;
        // The Arc is unshared until initialization completes
        let manager = Arc::get_mut(config_arc)
            .ok_or_else(|| Error::config("Configuration manager already shared"))?;
        manager.initialize().await
    }

    async fn init_logging_manager(&mut self, config: &AppConfig) -> Result<()> {
        let mut manager = LoggingManager::new(config.logging.clone());
        manager.initialize().await?;
        self.logging_manager = Some(manager);
        Ok(())
    }

    async fn init_event_bus_manager(&mut self) -> Result<()> {
        let mut manager = EventBusManager::new();
        manager.initialize().await?;
        self.event_bus_manager = Some(Arc::new(manager));
        Ok(())
    }

    async fn init_storefront_manager(&mut self, config: &AppConfig) -> Result<()> {
        let policy = StorePolicy::from_config(&config.store, config.session.clone());
        let mut manager = StorefrontManager::new(policy);
        if let Some(event_bus) = &self.event_bus_manager {
            manager = manager.with_event_bus(Arc::clone(event_bus));
        }
        manager.initialize().await?;

        let manager = Arc::new(manager);
        let seeded = manager.seed(demo_catalog()).await;
        tracing::info!(products = seeded, "Seeded demo catalog");

        self.storefront_manager = Some(manager);
        Ok(())
    }

    async fn init_generation_manager(&mut self, config: &AppConfig) -> Result<()> {
        let provider = match HttpGenerationProvider::from_config(&config.generation) {
            Ok(provider) => provider,
            Err(e) => {
                // The storefront stays usable without the generation boundary
                tracing::warn!("Generation disabled: {}", e.message);
                return Ok(());
            }
        };

        let mut manager = GenerationManager::new(Box::new(provider));
        if let Some(event_bus) = &self.event_bus_manager {
            manager = manager.with_event_bus(Arc::clone(event_bus));
        }
        manager.initialize().await?;
        self.generation_manager = Some(manager);
        Ok(())
    }

    /// Shuts down all managers in reverse initialization order
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down application core");
        *self.app_state.write().await = ApplicationState::ShuttingDown;
        self.state.set_state(ManagerState::ShuttingDown).await;

        if let Some(mut manager) = self.generation_manager.take() {
            if let Err(e) = manager.shutdown().await {
                tracing::warn!("Generation manager shutdown failed: {}", e);
            }
        }

        if let Some(arc) = self.storefront_manager.take() {
            match Arc::try_unwrap(arc) {
                Ok(mut manager) => {
                    if let Err(e) = manager.shutdown().await {
                        tracing::warn!("Storefront manager shutdown failed: {}", e);
                    }
                }
                Err(_) => tracing::debug!("Storefront manager still shared at shutdown"),
            }
        }

        if let Some(arc) = self.event_bus_manager.take() {
            match Arc::try_unwrap(arc) {
                Ok(mut manager) => {
                    if let Err(e) = manager.shutdown().await {
                        tracing::warn!("Event bus shutdown failed: {}", e);
                    }
                }
                Err(_) => tracing::debug!("Event bus still shared at shutdown"),
            }
        }

        if let Some(mut manager) = self.logging_manager.take() {
            if let Err(e) = manager.shutdown().await {
                tracing::warn!("Logging manager shutdown failed: {}", e);
            }
        }

        if let Some(arc) = self.config_manager.take() {
            match Arc::try_unwrap(arc) {
                Ok(mut manager) => {
                    if let Err(e) = manager.shutdown().await {
                        tracing::warn!("Config manager shutdown failed: {}", e);
                    }
                }
                Err(_) => tracing::debug!("Config manager still shared at shutdown"),
            }
        }

        *self.app_state.write().await = ApplicationState::Shutdown;
        self.state.set_state(ManagerState::Shutdown).await;
        Ok(())
    }

    /// Blocks until the process receives a shutdown signal
    pub async fn wait_for_shutdown(&self) -> Result<()> {
        tokio::signal::ctrl_c().await.map_err(|e| {
            Error::new(ErrorKind::Application, "Failed to listen for shutdown signal").caused_by(e)
        })?;
        tracing::info!("Shutdown signal received");
        Ok(())
    }

    /// Aggregated health across all initialized managers
    pub async fn get_health(&self) -> ApplicationHealth {
        let mut managers = HashMap::new();

        if let Some(manager) = &self.config_manager {
            managers.insert("config_manager".to_string(), manager.health_check().await);
        }
        if let Some(manager) = &self.logging_manager {
            managers.insert("logging_manager".to_string(), manager.health_check().await);
        }
        if let Some(manager) = &self.event_bus_manager {
            managers.insert("event_bus_manager".to_string(), manager.health_check().await);
        }
        if let Some(manager) = &self.storefront_manager {
            managers.insert("storefront_manager".to_string(), manager.health_check().await);
        }
        if let Some(manager) = &self.generation_manager {
            managers.insert("generation_manager".to_string(), manager.health_check().await);
        }

        let status = if managers.values().any(|h| *h == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if managers.values().all(|h| *h == HealthStatus::Healthy) && !managers.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        ApplicationHealth {
            status,
            uptime: self.uptime(),
            managers,
            last_check: Utc::now(),
        }
    }

    /// Runtime statistics snapshot
    pub async fn get_stats(&self) -> ApplicationStats {
        let (product_count, cart_item_count) = match &self.storefront_manager {
            Some(manager) => {
                let state = manager.snapshot().await;
                (state.catalog.len(), state.cart.item_count())
            }
            None => (0, 0),
        };

        ApplicationStats {
            version: crate::VERSION.to_string(),
            started_at: self.started_at,
            uptime: self.uptime(),
            state: self.get_state().await,
            manager_count: self.manager_count(),
            product_count,
            cart_item_count,
            generation_enabled: self.generation_manager.is_some(),
        }
    }

    fn manager_count(&self) -> usize {
        [
            self.config_manager.is_some(),
            self.logging_manager.is_some(),
            self.event_bus_manager.is_some(),
            self.storefront_manager.is_some(),
            self.generation_manager.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    fn uptime(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    pub async fn get_state(&self) -> ApplicationState {
        *self.app_state.read().await
    }

    pub fn storefront(&self) -> Option<Arc<StorefrontManager>> {
        self.storefront_manager.clone()
    }

    pub fn generation(&self) -> Option<&GenerationManager> {
        self.generation_manager.as_ref()
    }

    pub fn event_bus(&self) -> Option<Arc<EventBusManager>> {
        self.event_bus_manager.clone()
    }

    pub fn config(&self) -> Option<Arc<ConfigManager>> {
        self.config_manager.clone()
    }

    async fn app_config(&self) -> Result<AppConfig> {
        match &self.config_manager {
            Some(manager) => manager.app_config().await,
            None => Ok(AppConfig::default()),
        }
    }
}

impl Default for ApplicationCore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Manager for ApplicationCore {
    fn name(&self) -> &str {
        "application_core"
    }

    fn id(&self) -> Uuid {
        self.state.id()
    }

    async fn initialize(&mut self) -> Result<()> {
        ApplicationCore::initialize(self).await
    }

    async fn shutdown(&mut self) -> Result<()> {
        ApplicationCore::shutdown(self).await
    }

    async fn status(&self) -> ManagerStatus {
        let mut status = self.state.status().await;
        status.add_metadata(
            "managers",
            serde_json::Value::from(self.manager_count()),
        );
        status.add_metadata(
            "generation_enabled",
            serde_json::Value::from(self.generation_manager.is_some()),
        );
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Action;

    #[tokio::test]
    async fn test_application_lifecycle() {
        let mut app = ApplicationCore::new();
        assert_eq!(app.get_state().await, ApplicationState::Created);

        app.initialize().await.unwrap();
        assert_eq!(app.get_state().await, ApplicationState::Running);

        let stats = app.get_stats().await;
        assert_eq!(stats.product_count, 6);
        assert_eq!(stats.cart_item_count, 0);
        assert!(stats.manager_count >= 4);

        app.shutdown().await.unwrap();
        assert_eq!(app.get_state().await, ApplicationState::Shutdown);
    }

    #[tokio::test]
    async fn test_application_health() {
        let mut app = ApplicationCore::new();
        app.initialize().await.unwrap();

        let health = app.get_health().await;
        assert_ne!(health.status, HealthStatus::Unhealthy);
        assert!(health.managers.contains_key("storefront_manager"));

        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_storefront_reachable_through_core() {
        let mut app = ApplicationCore::new();
        app.initialize().await.unwrap();

        let storefront = app.storefront().unwrap();
        storefront
            .dispatch(Action::AddToCart {
                product_id: "1".to_string(),
                size: 9.0,
                quantity: 2,
            })
            .await
            .unwrap();

        let stats = app.get_stats().await;
        assert_eq!(stats.cart_item_count, 2);

        app.shutdown().await.unwrap();
    }
}
