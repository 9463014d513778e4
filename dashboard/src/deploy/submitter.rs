//! Deployment submission

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, info_span, warn, Instrument};

use crate::errors::SubmissionError;
use crate::http::client::HttpClient;
use crate::models::deployment::{DeploymentRecord, DeploymentStatus, IdGenerator};

/// Turns a repository URL into a deployment record with one backend round
/// trip. It never touches the registry; callers prepend the record.
pub struct DeploymentSubmitter {
    http_client: Arc<HttpClient>,
    deploy_path: String,
    ids: IdGenerator,
}

impl DeploymentSubmitter {
    pub fn new(http_client: Arc<HttpClient>, deploy_path: impl Into<String>) -> Self {
        Self {
            http_client,
            deploy_path: deploy_path.into(),
            ids: IdGenerator::new(),
        }
    }

    /// Submit one deployment.
    ///
    /// Whitespace-only input fails with `EmptyInput` before any request is
    /// made. The id is minted when the backend accepts, so ids follow
    /// completion order.
    pub async fn submit(&self, repo_url: &str) -> Result<DeploymentRecord, SubmissionError> {
        let repo_url = repo_url.trim();
        if repo_url.is_empty() {
            return Err(SubmissionError::EmptyInput);
        }

        let span = info_span!("submit", submission = %uuid::Uuid::new_v4(), repo = repo_url);
        async {
            info!("Submitting deployment");

            let accepted = match self
                .http_client
                .request_deployment(&self.deploy_path, repo_url)
                .await
            {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("{}", e);
                    return Err(e);
                }
            };

            let record = DeploymentRecord {
                id: self.ids.next_id(),
                url: accepted.url,
                status: DeploymentStatus::Deployed,
                kind: accepted.deployment_type.into(),
                repo_url: repo_url.to_string(),
                created_at: Utc::now(),
            };
            info!("Deployed {} at {}", record.id, record.url);
            Ok(record)
        }
        .instrument(span)
        .await
    }
}
