//! Dashboard state: the log channel, the deployment registry and the pieces
//! that feed them

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::app::options::AppOptions;
use crate::channel::{ChannelState, ChannelStats, LogChannel};
use crate::deploy::DeploymentSubmitter;
use crate::errors::{DashError, SubmissionError};
use crate::http::client::HttpClient;
use crate::models::deployment::DeploymentRecord;
use crate::models::log_line::LogLine;
use crate::registry::DeploymentRegistry;
use crate::view::{TailFollower, Viewport};

/// Tail-followed slice of the build log
#[derive(Debug, Clone, Serialize)]
pub struct LogView {
    pub lines: Vec<LogLine>,
    pub viewport: Viewport,
    pub state: ChannelState,
}

/// Everything a presentation layer needs.
///
/// Two flows run independently: submissions complete into the registry,
/// while the log channel appends whatever the backend streams. Neither waits
/// on the other.
pub struct Dashboard {
    channel: Arc<LogChannel>,
    registry: Arc<DeploymentRegistry>,
    submitter: DeploymentSubmitter,
    follower: Arc<TailFollower>,
    logs_url: String,
    public_base_url: String,
}

impl Dashboard {
    /// Build the dashboard without connecting anything
    pub fn new(http_client: Arc<HttpClient>, options: &AppOptions) -> Self {
        let channel = Arc::new(LogChannel::new());
        let follower = Arc::new(TailFollower::new(options.view_height));
        follower.attach(&channel);

        Self {
            channel,
            registry: Arc::new(DeploymentRegistry::new()),
            submitter: DeploymentSubmitter::new(http_client, options.deploy_path.clone()),
            follower,
            logs_url: options.logs_url.clone(),
            public_base_url: options.public_base_url.clone(),
        }
    }

    /// Build the dashboard and open the build-log stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn init(options: &AppOptions) -> Result<Self, DashError> {
        info!("Initializing dashboard...");
        let http_client = Arc::new(HttpClient::new(
            &options.backend_base_url,
            options.request_timeout,
        )?);
        let dashboard = Self::new(http_client, options);
        dashboard.open_logs();
        Ok(dashboard)
    }

    /// Open the build-log stream on the configured endpoint
    pub fn open_logs(&self) {
        self.channel.open(&self.logs_url);
    }

    /// Re-open the build-log stream. Lines already received are kept.
    pub fn reconnect_logs(&self) {
        info!("Reconnecting build-log stream");
        self.open_logs();
    }

    pub fn current_deployments(&self) -> Vec<DeploymentRecord> {
        self.registry.read()
    }

    pub fn current_log_lines(&self) -> Vec<LogLine> {
        self.channel.lines()
    }

    /// Submit a deployment and prepend the record once the backend accepts.
    ///
    /// Records land in completion order: a submission that finishes later is
    /// ahead in the list, whenever it started.
    pub async fn submit_deployment(&self, repo_url: &str) -> Result<DeploymentRecord, SubmissionError> {
        let record = self.submitter.submit(repo_url).await?;
        self.registry.prepend(record.clone());
        Ok(record)
    }

    pub fn clear_logs(&self) {
        self.channel.clear();
        self.follower.follow(self.channel.len());
    }

    pub fn log_view(&self) -> LogView {
        let lines = self.channel.lines();
        self.follower.follow(lines.len());
        LogView {
            lines: self.follower.window(&lines).to_vec(),
            viewport: self.follower.viewport(),
            state: self.channel.state(),
        }
    }

    pub fn log_state(&self) -> ChannelState {
        self.channel.state()
    }

    pub fn log_stats(&self) -> ChannelStats {
        self.channel.stats()
    }

    pub fn channel(&self) -> &Arc<LogChannel> {
        &self.channel
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    /// Close the build-log stream
    pub async fn shutdown(&self) -> Result<(), DashError> {
        info!("Shutting down dashboard...");
        self.channel.shutdown().await;
        Ok(())
    }
}
