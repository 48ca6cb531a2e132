use crate::domain::service::HealthCheck;
use crate::utils::error::{Result, WqError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const MIN_CHUNK_SIZE_MB: u64 = 1;
const MAX_CHUNK_SIZE_MB: u64 = 1024;

/// Settings file (`water-quality.toml`). Every table is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub download: DownloadSettings,
    pub healthcheck: HealthCheckSettings,
    pub stack: StackSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub aws_region: String,
    pub anon: bool,
    pub s3_endpoint: Option<String>,
    pub gcs_endpoint: String,
    /// Environment variable holding a GCS OAuth token for non-anonymous access.
    pub gcs_token_env: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            aws_region: crate::core::paths::DEFAULT_AWS_REGION.to_string(),
            anon: true,
            s3_endpoint: None,
            gcs_endpoint: "https://storage.googleapis.com".to_string(),
            gcs_token_env: "GOOGLE_OAUTH_ACCESS_TOKEN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub chunk_size_mb: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self { chunk_size_mb: 100 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckSettings {
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub retries: u32,
    pub start_period_secs: u64,
}

impl Default for HealthCheckSettings {
    fn default() -> Self {
        Self {
            interval_secs: HealthCheck::DEFAULT_INTERVAL.as_secs(),
            timeout_secs: HealthCheck::DEFAULT_TIMEOUT.as_secs(),
            retries: HealthCheck::DEFAULT_RETRIES,
            start_period_secs: HealthCheck::DEFAULT_START_PERIOD.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSettings {
    pub db_image: String,
    pub explorer_image: String,
    pub jupyter_build_context: String,
    pub jupyter_workdir: String,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            db_image: "kartoza/postgis:16-3.4".to_string(),
            explorer_image: "opendatacube/explorer:latest".to_string(),
            jupyter_build_context: ".".to_string(),
            jupyter_workdir: "/home/jovyan/water_quality".to_string(),
        }
    }
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// Replaces `${VAR}` with the process environment; unknown names are left as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}")?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn health_policy(&self, test: Vec<String>) -> HealthCheck {
        HealthCheck {
            test,
            interval: Duration::from_secs(self.healthcheck.interval_secs),
            timeout: Duration::from_secs(self.healthcheck.timeout_secs),
            retries: self.healthcheck.retries,
            start_period: Duration::from_secs(self.healthcheck.start_period_secs),
        }
    }

    /// Download buffer size in bytes, from `override_mb` when given.
    pub fn chunk_size_bytes(&self, override_mb: Option<u64>) -> Result<usize> {
        let (field, mb) = match override_mb {
            Some(mb) => ("chunk_mb", mb),
            None => ("download.chunk_size_mb", self.download.chunk_size_mb),
        };
        validation::validate_range(field, mb, MIN_CHUNK_SIZE_MB, MAX_CHUNK_SIZE_MB)?;

        usize::try_from(mb)
            .ok()
            .and_then(|mb| mb.checked_mul(1024 * 1024))
            .ok_or_else(|| WqError::InvalidConfigValueError {
                field: field.to_string(),
                value: mb.to_string(),
                reason: "does not fit in memory on this platform".to_string(),
            })
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validation::validate_aws_region("storage.aws_region", &self.storage.aws_region)?;
        validation::validate_url("storage.gcs_endpoint", &self.storage.gcs_endpoint)?;
        if let Some(endpoint) = &self.storage.s3_endpoint {
            validation::validate_url("storage.s3_endpoint", endpoint)?;
        }
        validation::validate_range(
            "download.chunk_size_mb",
            self.download.chunk_size_mb,
            MIN_CHUNK_SIZE_MB,
            MAX_CHUNK_SIZE_MB,
        )?;
        validation::validate_positive_number(
            "healthcheck.interval_secs",
            self.healthcheck.interval_secs,
            1,
        )?;
        validation::validate_positive_number(
            "healthcheck.timeout_secs",
            self.healthcheck.timeout_secs,
            1,
        )?;
        validation::validate_positive_number("healthcheck.retries", self.healthcheck.retries.into(), 1)?;
        validation::validate_non_empty_string("stack.db_image", &self.stack.db_image)?;
        validation::validate_non_empty_string("stack.explorer_image", &self.stack.explorer_image)?;

        if self.healthcheck.timeout_secs > self.healthcheck.interval_secs {
            return Err(WqError::ConfigValidationError {
                field: "healthcheck.timeout_secs".to_string(),
                message: "timeout must not exceed the probe interval".to_string(),
            });
        }
        Ok(())
    }
}
