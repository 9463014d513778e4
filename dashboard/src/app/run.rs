//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::Dashboard;
use crate::errors::DashError;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::console;

/// Run the dashboard until a shutdown signal or a console `:quit`
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DashError> {
    info!("Initializing deployment dashboard...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let (quit_tx, mut quit_rx) = mpsc::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, &shutdown_tx, quit_tx, &mut shutdown_manager).await {
        error!("Failed to start dashboard: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    tokio::select! {
        _ = shutdown_signal => {
            info!("Shutdown signal received, shutting down...");
        }
        Some(()) = quit_rx.recv() => {
            info!("Quit requested from console, shutting down...");
        }
    }

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: &broadcast::Sender<()>,
    quit_tx: mpsc::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), DashError> {
    let dashboard = Arc::new(Dashboard::init(options)?);
    shutdown_manager.with_dashboard(dashboard.clone())?;

    if options.enable_socket_server {
        init_socket_server(options, dashboard.clone(), shutdown_manager, shutdown_tx.subscribe())
            .await?;
    }

    if options.enable_console {
        init_console_worker(
            console::Options {
                public_base_url: options.public_base_url.clone(),
            },
            dashboard,
            quit_tx,
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    }

    Ok(())
}

async fn init_socket_server(
    options: &AppOptions,
    dashboard: Arc<Dashboard>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DashError> {
    info!("Initializing local HTTP server...");

    let server_handle = serve(&options.server, Arc::new(ServerState::new(dashboard)), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_socket_server_handle(server_handle)
}

fn init_console_worker(
    options: console::Options,
    dashboard: Arc<Dashboard>,
    quit_tx: mpsc::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DashError> {
    info!("Initializing console worker...");

    let console_handle = tokio::spawn(async move {
        console::run(
            &options,
            dashboard,
            quit_tx,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_console_worker_handle(console_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    dashboard: Option<Arc<Dashboard>>,
    socket_server_handle: Option<JoinHandle<Result<(), DashError>>>,
    console_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            dashboard: None,
            socket_server_handle: None,
            console_worker_handle: None,
        }
    }

    pub fn with_dashboard(&mut self, dashboard: Arc<Dashboard>) -> Result<(), DashError> {
        if self.dashboard.is_some() {
            return Err(DashError::ShutdownError("dashboard already set".to_string()));
        }
        self.dashboard = Some(dashboard);
        Ok(())
    }

    pub fn with_socket_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), DashError>>,
    ) -> Result<(), DashError> {
        if self.socket_server_handle.is_some() {
            return Err(DashError::ShutdownError("server_handle already set".to_string()));
        }
        self.socket_server_handle = Some(handle);
        Ok(())
    }

    pub fn with_console_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), DashError> {
        if self.console_worker_handle.is_some() {
            return Err(DashError::ShutdownError("console_handle already set".to_string()));
        }
        self.console_worker_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), DashError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                Err(DashError::ShutdownError("timed out".to_string()))
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), DashError> {
        info!("Shutting down deployment dashboard...");

        // 1. Console worker
        if let Some(handle) = self.console_worker_handle.take() {
            handle.await.map_err(|e| DashError::ShutdownError(e.to_string()))?;
        }

        // 2. Socket server
        if let Some(handle) = self.socket_server_handle.take() {
            handle.await.map_err(|e| DashError::ShutdownError(e.to_string()))??;
        }

        // 3. Dashboard and its build-log stream
        if let Some(dashboard) = self.dashboard.take() {
            dashboard.shutdown().await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
