use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where a location lives, derived from its URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    Local,
    S3,
    Gcs,
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Starting,
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub target: String,
    pub status: HealthStatus,
    pub attempts: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub output_path: String,
    pub bytes_written: u64,
}
