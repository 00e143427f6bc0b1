// src/logging.rs

//! Structured logging for the storefront core.
//!
//! Installs a tracing subscriber assembled from configuration: an optional
//! console layer (pretty, compact, or JSON) and an optional daily-rotated
//! file layer. The level string accepts either a simple level name or a
//! full env-filter directive.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};
use uuid::Uuid;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::Result;
use crate::manager::{ManagedState, Manager, ManagerState, ManagerStatus};

/// Logging system manager
pub struct LoggingManager {
    state: ManagedState,
    config: LoggingConfig,
    guard: Option<WorkerGuard>,
}

impl std::fmt::Debug for LoggingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingManager")
            .field("config", &self.config)
            .finish()
    }
}

impl LoggingManager {
    pub fn new(config: LoggingConfig) -> Self {
        Self {
            state: ManagedState::new(Uuid::new_v4(), "logging_manager"),
            config,
            guard: None,
        }
    }

    fn build_filter(level: &str) -> EnvFilter {
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    }

    fn console_layer(&self) -> Option<Box<dyn Layer<Registry> + Send + Sync>> {
        if !self.config.console {
            return None;
        }
        let layer = match self.config.format {
            LogFormat::Json => fmt::layer().json().boxed(),
            LogFormat::Pretty => fmt::layer().pretty().boxed(),
            LogFormat::Compact => fmt::layer().compact().boxed(),
        };
        Some(layer)
    }

    fn file_layer(&mut self) -> Option<Box<dyn Layer<Registry> + Send + Sync>> {
        let file_config = self.config.file.as_ref()?;
        let appender =
            tracing_appender::rolling::daily(&file_config.directory, &file_config.file_name_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        self.guard = Some(guard);
        Some(fmt::layer().with_ansi(false).with_writer(writer).boxed())
    }
}

#[async_trait::async_trait]
impl Manager for LoggingManager {
    fn name(&self) -> &str {
        "logging_manager"
    }

    fn id(&self) -> Uuid {
        self.state.id()
    }

    async fn initialize(&mut self) -> Result<()> {
        self.state.set_state(ManagerState::Initializing).await;

        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
        if let Some(console) = self.console_layer() {
            layers.push(console);
        }
        if let Some(file) = self.file_layer() {
            layers.push(file);
        }

        let filter = Self::build_filter(&self.config.level);
        match tracing_subscriber::registry()
            .with(layers)
            .with(filter)
            .try_init()
        {
            Ok(()) => {
                self.state
                    .add_metadata("subscriber", serde_json::Value::String("installed".into()))
                    .await;
            }
            Err(_) => {
                // Another subscriber owns the global dispatcher (tests, or a
                // host embedding the core); keep using it.
                tracing::debug!("Global tracing subscriber already installed");
                self.state
                    .add_metadata("subscriber", serde_json::Value::String("external".into()))
                    .await;
            }
        }

        self.state
            .add_metadata(
                "level",
                serde_json::Value::String(self.config.level.clone()),
            )
            .await;
        self.state
            .add_metadata("console", serde_json::Value::from(self.config.console))
            .await;
        if let Some(file) = &self.config.file {
            self.state
                .add_metadata(
                    "file",
                    serde_json::Value::String(file.directory.display().to_string()),
                )
                .await;
        }

        self.state.set_state(ManagerState::Running).await;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.state.set_state(ManagerState::ShuttingDown).await;
        // Dropping the guard flushes buffered file output
        self.guard.take();
        self.state.set_state(ManagerState::Shutdown).await;
        Ok(())
    }

    async fn status(&self) -> ManagerStatus {
        self.state.status().await
    }
}
