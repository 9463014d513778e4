//! Console worker: repo URLs in on stdin, build logs and results out on stdout

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use colored::Colorize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::app::state::Dashboard;
use crate::errors::SubmissionError;
use crate::models::deployment::DeploymentRecord;

/// Console worker options
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Prefix stripped from deployment URLs for display
    pub public_base_url: String,
}

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Deploy(String),
    Clear,
    List,
    Status,
    Reconnect,
    Help,
    Quit,
}

/// Parse a console line. Anything that is not a `:command` is a repo URL.
pub fn parse_command(line: &str) -> Command {
    match line.trim() {
        ":clear" => Command::Clear,
        ":list" | ":ls" => Command::List,
        ":status" => Command::Status,
        ":reconnect" => Command::Reconnect,
        ":help" | ":h" => Command::Help,
        ":quit" | ":q" => Command::Quit,
        url => Command::Deploy(url.to_string()),
    }
}

const HELP: &str = "Enter a repository URL to deploy it, or one of:
  :list        show deployments, newest first
  :clear       clear build logs
  :status      show build-log stream status
  :reconnect   re-open the build-log stream
  :quit        exit";

/// Run the console worker.
///
/// Each submission runs in its own task so that several can be pending at
/// once. Returns when stdin ends, on `:quit` (after notifying `quit_tx`), or
/// on shutdown; pending submissions are then abandoned.
pub async fn run(
    options: &Options,
    dashboard: Arc<Dashboard>,
    quit_tx: mpsc::Sender<()>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Console worker starting...");

    let subscription = dashboard.channel().subscribe(|line| {
        println!("{}", line.as_str().green());
    });

    let mut input = spawn_stdin_reader();
    let mut submissions = JoinSet::new();

    println!("{}", "Deployment Dashboard (:help for commands)".bold());

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Console worker shutting down...");
                break;
            }
            Some(_) = submissions.join_next(), if !submissions.is_empty() => {}
            line = input.recv() => {
                let Some(line) = line else {
                    debug!("Console input closed");
                    break;
                };
                match parse_command(&line) {
                    Command::Deploy(repo_url) => {
                        let dashboard = dashboard.clone();
                        let public_base_url = options.public_base_url.clone();
                        submissions.spawn(async move {
                            match dashboard.submit_deployment(&repo_url).await {
                                Ok(record) => print_deployed(&record, &public_base_url),
                                Err(e) => print_failure(&e),
                            }
                        });
                    }
                    Command::Clear => dashboard.clear_logs(),
                    Command::List => print_deployments(&dashboard.current_deployments(), &options.public_base_url),
                    Command::Status => {
                        let stats = dashboard.log_stats();
                        println!(
                            "build logs: {:?}, {} lines, {} received, {} dropped",
                            dashboard.log_state(),
                            dashboard.current_log_lines().len(),
                            stats.received,
                            stats.malformed,
                        );
                        if dashboard.log_state().is_terminal() {
                            println!("{}", "stream is down, :reconnect to re-open".yellow());
                        }
                    }
                    Command::Reconnect => dashboard.reconnect_logs(),
                    Command::Help => println!("{HELP}"),
                    Command::Quit => {
                        let _ = quit_tx.send(()).await;
                        break;
                    }
                }
            }
        }
    }

    submissions.abort_all();
    dashboard.channel().unsubscribe(subscription);
}

/// Read stdin on a plain thread; a blocking read cannot be cancelled and must
/// not hold up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn print_deployed(record: &DeploymentRecord, public_base_url: &str) {
    println!(
        "{} {} ({}) {}",
        "Deployed".green().bold(),
        record.display_name(public_base_url),
        record.kind.label(),
        record.url.blue().underline(),
    );
}

fn print_failure(err: &SubmissionError) {
    println!("{}", err.to_string().red().bold());
}

fn print_deployments(records: &[DeploymentRecord], public_base_url: &str) {
    if records.is_empty() {
        println!("{}", "No deployments yet.".dimmed());
        return;
    }
    for record in records {
        println!(
            "{:>14}  {:<24} [{}] {}  {}",
            record.id,
            record.display_name(public_base_url),
            record.status,
            record.kind.label(),
            record.url,
        );
    }
}
