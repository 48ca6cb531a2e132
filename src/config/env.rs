//! The `.env` configuration surface shared by the db, jupyter and explorer
//! services.

use crate::utils::error::{Result, WqError};
use crate::utils::validation::{validate_cidr, validate_port};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

pub const REQUIRED_VARIABLES: &[&str] = &[
    "POSTGRES_PORT",
    "POSTGRES_DB",
    "POSTGRES_USER",
    "POSTGRES_PASS",
    "JUPYTER_PORT",
    "EXPLORER_PORT",
];

pub const DEFAULT_ALLOW_IP_RANGE: &str = "0.0.0.0/0";
pub const DEFAULT_EXTENSIONS: &str = "postgis,hstore,postgis_topology,postgis_raster,pgrouting";
pub const DEFAULT_TIMEZONE: &str = "Africa/Johannesburg";

/// Key/value pairs read from a dotenv file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    entries: BTreeMap<String, String>,
}

impl EnvFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();

        for (index, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);

            let (key, value) = line.split_once('=').ok_or_else(|| {
                WqError::ConfigValidationError {
                    field: format!(".env line {}", index + 1),
                    message: format!("expected KEY=VALUE, found '{}'", raw_line),
                }
            })?;

            let key = key.trim();
            if key.is_empty() || key.chars().any(char::is_whitespace) {
                return Err(WqError::ConfigValidationError {
                    field: format!(".env line {}", index + 1),
                    message: format!("invalid variable name '{}'", key),
                });
            }

            // Single-quoted values are literal; the rest may reference
            // the shell or earlier lines.
            let (value, literal) = unquote(value.trim());
            let value = if literal {
                value
            } else {
                interpolate(&value, |name| {
                    std::env::var(name).ok().or_else(|| entries.get(name).cloned())
                })?
            };
            entries.insert(key.to_string(), value);
        }

        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Process environment first, then the file, as compose does.
    pub fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .or_else(|| self.get(key).map(str::to_string))
    }
}

/// Strips quotes; the flag is set for single-quoted (literal) values.
fn unquote(value: &str) -> (String, bool) {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return (value[1..value.len() - 1].to_string(), quote == '\'');
        }
    }
    // Unquoted values may carry a trailing ` # comment`.
    match value.find(" #") {
        Some(idx) => (value[..idx].trim_end().to_string(), false),
        None => (value.to_string(), false),
    }
}

/// Expands `${VAR}` and `${VAR:-default}` using `lookup`. Unset variables
/// without a default expand to an empty string.
pub fn interpolate<F>(template: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")?;

    let result = re.replace_all(template, |caps: &regex::Captures| {
        let value = lookup(&caps[1]).filter(|v| !v.is_empty());
        match (value, caps.get(2)) {
            (Some(value), _) => value,
            (None, Some(default)) => default.as_str().to_string(),
            (None, None) => String::new(),
        }
    });

    Ok(result.into_owned())
}

/// Validated values for the three services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackEnv {
    pub postgres_port: u16,
    pub postgres_db: String,
    pub postgres_user: String,
    pub postgres_pass: String,
    pub allow_ip_range: String,
    pub postgres_multiple_extensions: Vec<String>,
    pub jupyter_port: u16,
    pub explorer_port: u16,
    pub cubedash_default_timezone: String,
}

impl StackEnv {
    pub fn from_env_file(env_file: &EnvFile) -> Result<Self> {
        Self::resolve(|key| env_file.lookup(key))
    }

    /// Fails with every missing or blank required variable at once, so a
    /// stack never comes up with empty credentials.
    pub fn resolve<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<String> = REQUIRED_VARIABLES
            .iter()
            .copied()
            .filter(|key| value(*key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(WqError::MissingEnvironmentError { variables: missing });
        }

        let required = |key: &str| {
            value(key).ok_or_else(|| WqError::MissingConfigError {
                field: key.to_string(),
            })
        };

        let allow_ip_range =
            value("ALLOW_IP_RANGE").unwrap_or_else(|| DEFAULT_ALLOW_IP_RANGE.to_string());
        validate_cidr("ALLOW_IP_RANGE", &allow_ip_range)?;

        let extensions = value("POSTGRES_MULTIPLE_EXTENSIONS")
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|ext| !ext.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            postgres_port: validate_port("POSTGRES_PORT", &required("POSTGRES_PORT")?)?,
            postgres_db: required("POSTGRES_DB")?,
            postgres_user: required("POSTGRES_USER")?,
            postgres_pass: required("POSTGRES_PASS")?,
            allow_ip_range,
            postgres_multiple_extensions: extensions,
            jupyter_port: validate_port("JUPYTER_PORT", &required("JUPYTER_PORT")?)?,
            explorer_port: validate_port("EXPLORER_PORT", &required("EXPLORER_PORT")?)?,
            cubedash_default_timezone: value("CUBEDASH_DEFAULT_TIMEZONE")
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        })
    }

    pub fn extensions_list(&self) -> String {
        self.postgres_multiple_extensions.join(",")
    }

    /// Host ports must be distinct or compose refuses to bind.
    pub fn check_port_conflicts(&self) -> Result<()> {
        let ports = [
            ("POSTGRES_PORT", self.postgres_port),
            ("JUPYTER_PORT", self.jupyter_port),
            ("EXPLORER_PORT", self.explorer_port),
        ];
        for (i, (name, port)) in ports.iter().enumerate() {
            if let Some((other, _)) = ports[..i].iter().find(|(_, p)| p == port) {
                return Err(WqError::InvalidConfigValueError {
                    field: name.to_string(),
                    value: port.to_string(),
                    reason: format!("host port already used by {}", other),
                });
            }
        }
        Ok(())
    }
}
