//! Deployment dashboard - Entry Point
//!
//! Submits repositories to the deploy backend and follows its build-log
//! stream.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use deploydash::app::run::run;
use deploydash::filesys::file::File;
use deploydash::logs::init_logging;
use deploydash::storage::settings::Settings;
use deploydash::utils::version_info;

use tracing::{error, info};

const DEFAULT_SETTINGS_FILE: &str = "deploydash.json";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Failed to render version info: {e}"),
        }
        return;
    }

    let settings_file = File::new(
        cli_args
            .get("settings")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE)),
    );

    // Write a default settings file and exit
    if cli_args.contains_key("init") {
        return write_default_settings(&settings_file).await;
    }

    let mut settings = match Settings::load(&settings_file).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file {}: {e}", settings_file.path().display());
            return;
        }
    };
    apply_overrides(&mut settings, &cli_args);

    // Initialize logging
    let _log_guard = match init_logging(settings.log_options()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = match settings.to_app_options() {
        Ok(options) => options,
        Err(e) => {
            error!("Invalid settings: {}", e);
            return;
        }
    };

    info!("Running deployment dashboard {} with options: {:?}", version.version, options);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Dashboard stopped with an error: {e}");
    }
}

fn apply_overrides(settings: &mut Settings, cli_args: &HashMap<String, String>) {
    if let Some(backend) = cli_args.get("backend") {
        settings.backend.base_url = backend.clone();
    }
    if let Some(logs_url) = cli_args.get("logs-url") {
        settings.backend.logs_url = Some(logs_url.clone());
    }
    if let Some(level) = cli_args.get("log-level") {
        match level.parse() {
            Ok(level) => settings.log_level = level,
            Err(e) => eprintln!("Ignoring --log-level: {e}"),
        }
    }
    if let Some(port) = cli_args.get("port") {
        match port.parse() {
            Ok(port) => settings.server.port = port,
            Err(e) => eprintln!("Ignoring --port: {e}"),
        }
    }
    if cli_args.contains_key("no-server") {
        settings.server.enabled = false;
    }
    if cli_args.contains_key("no-console") {
        settings.console.enabled = false;
    }
}

async fn write_default_settings(file: &File) {
    if file.exists().await {
        eprintln!("{} already exists", file.path().display());
        return;
    }
    let result = match serde_json::to_string_pretty(&Settings::default()) {
        Ok(json) => file.write_string(&json).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(()) => println!("Wrote {}", file.path().display()),
        Err(e) => eprintln!("Failed to write {}: {e}", file.path().display()),
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Failed to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received, shutting down...");
    }
}
