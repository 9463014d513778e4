//! Deployment models

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use openapi_client::DeploymentType;
use serde::{Deserialize, Serialize};

/// Session-local deployment identifier.
///
/// Minted locally from the wall clock in milliseconds, bumped when two
/// records are created within the same millisecond. Not stable across
/// processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(pub u64);

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Mints strictly increasing deployment ids
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> DeploymentId {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let prev = match self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(now.max(prev + 1)))
        {
            Ok(prev) | Err(prev) => prev,
        };
        DeploymentId(now.max(prev + 1))
    }
}

/// Deployment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStatus {
    Deployed,
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentStatus::Deployed => f.pad("Deployed"),
        }
    }
}

/// How a deployment is served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentKind {
    /// Static files behind Nginx
    Static,

    /// A container image
    Dynamic,
}

impl DeploymentKind {
    pub fn label(&self) -> &'static str {
        match self {
            DeploymentKind::Static => "Static (Nginx)",
            DeploymentKind::Dynamic => "Dynamic (Docker)",
        }
    }
}

impl From<DeploymentType> for DeploymentKind {
    fn from(value: DeploymentType) -> Self {
        match value {
            DeploymentType::Static => DeploymentKind::Static,
            DeploymentType::Dynamic => DeploymentKind::Dynamic,
        }
    }
}

/// The stored result of one successful submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: DeploymentId,

    /// Where the deployed artifact is reachable
    pub url: String,

    pub status: DeploymentStatus,

    #[serde(rename = "type")]
    pub kind: DeploymentKind,

    /// Repository the deployment was built from
    pub repo_url: String,

    pub created_at: DateTime<Utc>,
}

impl DeploymentRecord {
    /// Short name for display: the url with the hosting prefix stripped
    pub fn display_name<'a>(&'a self, public_base_url: &str) -> &'a str {
        if public_base_url.is_empty() {
            return &self.url;
        }
        self.url.strip_prefix(public_base_url).unwrap_or(&self.url)
    }
}
