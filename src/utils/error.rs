use thiserror::Error;

#[derive(Error, Debug)]
pub enum WqError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Missing or blank environment variables: {}", variables.join(", "))]
    MissingEnvironmentError { variables: Vec<String> },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Unsupported location: {path}")]
    UnsupportedPathError { path: String },

    #[error("Invalid URI {uri}: {reason}")]
    InvalidUriError { uri: String, reason: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Health check for {target} failed after {attempts} attempts")]
    HealthCheckFailed { target: String, attempts: u32 },

    #[error("Dependency cycle between services: {}", services.join(", "))]
    DependencyCycleError { services: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Storage,
    Data,
    Health,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl WqError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            WqError::HttpError(_) | WqError::UrlError(_) => ErrorCategory::Network,
            WqError::IoError(_) | WqError::StorageError { .. } => ErrorCategory::Storage,
            WqError::SerializationError(_) | WqError::YamlError(_) => ErrorCategory::Data,
            WqError::HealthCheckFailed { .. } => ErrorCategory::Health,
            WqError::TomlError(_)
            | WqError::PatternError(_)
            | WqError::MissingConfigError { .. }
            | WqError::MissingEnvironmentError { .. }
            | WqError::InvalidConfigValueError { .. }
            | WqError::ConfigValidationError { .. }
            | WqError::UnsupportedPathError { .. }
            | WqError::InvalidUriError { .. }
            | WqError::DependencyCycleError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // Transient: the remote side may recover on its own.
            WqError::HttpError(_) | WqError::HealthCheckFailed { .. } => ErrorSeverity::Medium,
            WqError::IoError(_) | WqError::StorageError { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            WqError::HttpError(_) => {
                "Check network connectivity and that the URL is reachable".to_string()
            }
            WqError::IoError(_) => "Check file permissions and available disk space".to_string(),
            WqError::MissingEnvironmentError { variables } => format!(
                "Define {} in the .env file or the shell environment",
                variables.join(", ")
            ),
            WqError::MissingConfigError { field } => {
                format!("Add a value for '{}' to the configuration", field)
            }
            WqError::InvalidConfigValueError { field, .. }
            | WqError::ConfigValidationError { field, .. } => {
                format!("Correct the value of '{}'", field)
            }
            WqError::TomlError(_) => "Make sure the settings file is valid TOML".to_string(),
            WqError::UnsupportedPathError { .. } | WqError::InvalidUriError { .. } => {
                "Use a local path or an s3://, gs:// or http(s):// location".to_string()
            }
            WqError::StorageError { .. } => {
                "Check credentials and bucket permissions, or retry with anonymous access"
                    .to_string()
            }
            WqError::HealthCheckFailed { .. } => {
                "Make sure the database container is running and its port is published"
                    .to_string()
            }
            WqError::DependencyCycleError { .. } => {
                "Remove the circular depends_on entries".to_string()
            }
            _ => "Re-run with --verbose for more detail".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Storage => format!("Storage problem: {}", self),
            ErrorCategory::Data => format!("Data problem: {}", self),
            ErrorCategory::Health => format!("Service not ready: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, WqError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_environment_lists_every_variable() {
        let err = WqError::MissingEnvironmentError {
            variables: vec!["POSTGRES_DB".to_string(), "POSTGRES_PASS".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Missing or blank environment variables: POSTGRES_DB, POSTGRES_PASS"
        );
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.recovery_suggestion().contains("POSTGRES_PASS"));
    }

    #[test]
    fn test_health_failure_is_retryable() {
        let err = WqError::HealthCheckFailed {
            target: "db".to_string(),
            attempts: 3,
        };
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.user_friendly_message().starts_with("Service not ready"));
    }
}
