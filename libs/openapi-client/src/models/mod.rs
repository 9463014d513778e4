//! API models

use serde::{Deserialize, Serialize};

/// Deploy request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    #[serde(rename = "repoUrl")]
    pub repo_url: String,
}

/// How the backend packaged the deployed artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentType {
    Static,
    Dynamic,
}

/// Deploy response body.
///
/// On success `url` and `type` are set, on failure `error` is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub deployment_type: Option<DeploymentType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeployResponse {
    pub fn deployed(url: impl Into<String>, deployment_type: DeploymentType) -> Self {
        Self {
            success: true,
            url: Some(url.into()),
            deployment_type: Some(deployment_type),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            url: None,
            deployment_type: None,
            error: Some(error.into()),
        }
    }
}

/// One inbound build-log event. Fields other than `message` are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub message: String,
}
