//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::app::options::{AppOptions, LifecycleOptions, ServerOptions};
use crate::channel::stream::logs_url;
use crate::errors::DashError;
use crate::filesys::file::File;
use crate::logs::{LogLevel, LogOptions};

/// Dashboard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit diagnostics as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// Directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Backend configuration
    #[serde(default)]
    pub backend: BackendSettings,

    /// Prefix stripped from deployment URLs for display
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Lines shown by the tail-followed log view
    #[serde(default = "default_view_height")]
    pub view_height: usize,

    /// Local HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Console configuration
    #[serde(default)]
    pub console: ConsoleSettings,

    /// Maximum delay for graceful shutdown in seconds
    #[serde(default = "default_max_shutdown_delay")]
    pub max_shutdown_delay_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_public_base_url() -> String {
    "http://localhost:8070/".to_string()
}

fn default_view_height() -> usize {
    300
}

fn default_max_shutdown_delay() -> u64 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            log_dir: None,
            backend: BackendSettings::default(),
            public_base_url: default_public_base_url(),
            view_height: default_view_height(),
            server: ServerSettings::default(),
            console: ConsoleSettings::default(),
            max_shutdown_delay_secs: default_max_shutdown_delay(),
        }
    }
}

impl Settings {
    /// Read settings from `file`, falling back to defaults when it is absent
    pub async fn load(file: &File) -> Result<Self, DashError> {
        if !file.exists().await {
            info!("No settings file at {}, using defaults", file.path().display());
            return Ok(Self::default());
        }
        file.read_json().await
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            log_level: self.log_level.clone(),
            json_format: self.json_logs,
            log_dir: self.log_dir.clone(),
            ..Default::default()
        }
    }

    /// Resolve the settings into runtime options
    pub fn to_app_options(&self) -> Result<AppOptions, DashError> {
        let logs_url = match &self.backend.logs_url {
            Some(url) => url.clone(),
            None => logs_url(&self.backend.base_url, &self.backend.logs_path)?.to_string(),
        };

        Ok(AppOptions {
            lifecycle: LifecycleOptions {
                max_shutdown_delay: Duration::from_secs(self.max_shutdown_delay_secs),
            },
            backend_base_url: self.backend.base_url.clone(),
            deploy_path: self.backend.deploy_path.clone(),
            logs_url,
            request_timeout: match self.backend.request_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            public_base_url: self.public_base_url.clone(),
            view_height: self.view_height,
            enable_socket_server: self.server.enabled,
            enable_console: self.console.enabled,
            server: ServerOptions {
                host: self.server.host.clone(),
                port: self.server.port,
            },
        })
    }
}

/// Backend API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL for the backend API
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Deploy endpoint path
    #[serde(default = "default_deploy_path")]
    pub deploy_path: String,

    /// Build-log stream path, appended to the base URL with a ws scheme
    #[serde(default = "default_logs_path")]
    pub logs_path: String,

    /// Explicit build-log stream URL, overriding `logs_path`
    #[serde(default)]
    pub logs_url: Option<String>,

    /// Timeout for one deploy round trip; 0 disables it
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_backend_url() -> String {
    "http://localhost:5673".to_string()
}

fn default_deploy_path() -> String {
    "/deploy".to_string()
}

fn default_logs_path() -> String {
    "/build-logs".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            deploy_path: default_deploy_path(),
            logs_path: default_logs_path(),
            logs_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Console settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}
