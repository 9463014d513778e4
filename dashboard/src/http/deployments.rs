//! Deploy endpoint client

use openapi_client::{DeployRequest, DeployResponse, DeploymentType};

use crate::errors::{DashError, SubmissionError};
use crate::http::client::{HttpClient, RawResponse};

const MAX_BODY_IN_REASON: usize = 200;

/// What the backend reports for an accepted deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedDeployment {
    pub url: String,
    pub deployment_type: DeploymentType,
}

impl HttpClient {
    /// Ask the backend to deploy a repository.
    ///
    /// Transport failures, non-2xx statuses and unparseable bodies are all
    /// reported as `SubmissionFailed`, the same as `success: false`.
    pub async fn request_deployment(
        &self,
        path: &str,
        repo_url: &str,
    ) -> Result<AcceptedDeployment, SubmissionError> {
        let request = DeployRequest {
            repo_url: repo_url.to_string(),
        };
        let raw = self
            .post_json(path, &request)
            .await
            .map_err(|e| SubmissionError::failed(transport_reason(&e)))?;
        interpret_deploy_response(&raw)
    }
}

fn transport_reason(err: &DashError) -> String {
    match err {
        DashError::HttpError(e) if e.is_timeout() => "request timed out".to_string(),
        DashError::HttpError(e) if e.is_connect() => format!("could not reach backend: {e}"),
        other => other.to_string(),
    }
}

/// Translate a raw deploy response into an accepted deployment or a failure
pub fn interpret_deploy_response(raw: &RawResponse) -> Result<AcceptedDeployment, SubmissionError> {
    let parsed = serde_json::from_str::<DeployResponse>(&raw.body);

    match parsed {
        Ok(DeployResponse {
            success: false,
            error,
            ..
        }) => Err(SubmissionError::failed(error.unwrap_or_else(|| {
            format!("backend rejected the deployment (HTTP {})", raw.status)
        }))),
        Ok(_) if !raw.status.is_success() => {
            Err(SubmissionError::failed(format!("HTTP {}", raw.status)))
        }
        Ok(DeployResponse {
            url: Some(url),
            deployment_type: Some(deployment_type),
            ..
        }) => Ok(AcceptedDeployment {
            url,
            deployment_type,
        }),
        Ok(DeployResponse { url: None, .. }) => Err(SubmissionError::failed(
            "malformed response: missing url",
        )),
        Ok(_) => Err(SubmissionError::failed("malformed response: missing type")),
        Err(_) if !raw.status.is_success() => Err(SubmissionError::failed(format!(
            "HTTP {}: {}",
            raw.status,
            truncate(raw.body.trim(), MAX_BODY_IN_REASON)
        ))),
        Err(e) => Err(SubmissionError::failed(format!("malformed response: {e}"))),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
