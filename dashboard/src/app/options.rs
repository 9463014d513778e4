//! Application configuration options

use std::time::Duration;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Backend API base URL
    pub backend_base_url: String,

    /// Path of the deploy endpoint, relative to the backend base URL
    pub deploy_path: String,

    /// Build-log stream URL
    pub logs_url: String,

    /// Upper bound for one deploy round trip
    pub request_timeout: Option<Duration>,

    /// Prefix stripped from deployment URLs for display
    pub public_base_url: String,

    /// Number of log lines the tail-followed view shows
    pub view_height: usize,

    /// Enable local HTTP server
    pub enable_socket_server: bool,

    /// Enable stdin/stdout console
    pub enable_console: bool,

    /// Server configuration
    pub server: ServerOptions,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            backend_base_url: "http://localhost:5673".to_string(),
            deploy_path: "/deploy".to_string(),
            logs_url: "ws://localhost:5673/build-logs".to_string(),
            request_timeout: Some(Duration::from_secs(120)),
            public_base_url: "http://localhost:8070/".to_string(),
            view_height: 300,
            enable_socket_server: true,
            enable_console: true,
            server: ServerOptions::default(),
        }
    }
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(10),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
