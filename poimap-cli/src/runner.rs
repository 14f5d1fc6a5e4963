//! Shared setup for commands: config, logging, runtime and engine parts.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::info;

use poimap::cache::ResultCache;
use poimap::config::{config_file_path, EngineConfig};
use poimap::logging::{self, LogConfig, WorkerGuard};
use poimap::transport::{ReqwestMirrorClient, TransportClient};

use crate::error::CliError;

/// Console output is for results; logs stay quiet unless asked for.
const DEFAULT_LOG_LEVEL: &str = "warn";

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
}

/// Loads configuration and builds the engine for a command.
pub struct CliRunner {
    config: EngineConfig,
    config_path: PathBuf,
    _log_guard: Option<WorkerGuard>,
}

impl CliRunner {
    pub fn new(options: &GlobalOptions) -> Result<Self, CliError> {
        let level = options.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL);
        let mut log_config = LogConfig::default().with_level(level);
        if let Some(dir) = &options.log_dir {
            log_config = log_config.with_file_dir(dir.clone());
        }
        let log_guard = logging::init(&log_config);

        let config_path = match &options.config {
            Some(path) => path.clone(),
            None => config_file_path()?,
        };
        let config = EngineConfig::load_from(&config_path)?;

        Ok(Self {
            config,
            config_path,
            _log_guard: log_guard,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            command,
            version = env!("CARGO_PKG_VERSION"),
            config = %self.config_path.display(),
            mirrors = self.config.mirrors.len(),
            "poimap starting"
        );
    }

    pub fn runtime(&self) -> Result<Runtime, CliError> {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::Runtime(e.to_string()))
    }

    pub fn transport(&self) -> Result<TransportClient<ReqwestMirrorClient>, CliError> {
        let transport = &self.config.transport;
        let http = ReqwestMirrorClient::new(transport.request_timeout)?;
        Ok(TransportClient::new(
            http,
            self.config.mirrors.clone(),
            transport.policy.clone(),
            transport.query_builder(),
        )?)
    }

    pub fn cache(&self) -> Arc<ResultCache> {
        Arc::new(ResultCache::new(self.config.cache.ttl))
    }

    /// Token cancelled on Ctrl+C.
    pub fn shutdown_token(&self) -> Result<CancellationToken, CliError> {
        let token = CancellationToken::new();
        let handler_token = token.clone();
        ctrlc::set_handler(move || {
            eprintln!();
            eprintln!("Received shutdown signal, stopping...");
            handler_token.cancel();
        })
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;
        Ok(token)
    }
}
