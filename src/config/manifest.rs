//! Reads the Python packaging manifest (`pyproject.toml`) that ships the
//! notebooks' dependencies.

use crate::utils::error::{Result, WqError};
use regex::Regex;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct PyProject {
    pub project: ProjectTable,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectTable {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub license: Option<toml::Value>,
    pub requires_python: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub optional_dependencies: BTreeMap<String, Vec<String>>,
}

/// One PEP 508 requirement line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub extras: Vec<String>,
    pub specifier: String,
    pub marker: Option<String>,
}

impl Requirement {
    pub fn parse(line: &str) -> Result<Self> {
        let re = Regex::new(
            r"^\s*([A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:\[([^\]]*)\])?\s*(\([^)]*\)|[^;]*)?\s*(?:;\s*(.*))?$",
        )?;
        let caps = re.captures(line).ok_or_else(|| WqError::InvalidConfigValueError {
            field: "project.dependencies".to_string(),
            value: line.to_string(),
            reason: "not a valid requirement".to_string(),
        })?;

        let extras = caps
            .get(2)
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let specifier = caps
            .get(3)
            .map(|m| m.as_str().trim().trim_start_matches('(').trim_end_matches(')').trim())
            .unwrap_or("")
            .to_string();

        Ok(Self {
            name: caps[1].to_string(),
            extras,
            specifier,
            marker: caps.get(4).map(|m| m.as_str().trim().to_string()),
        })
    }

    /// No version constraint and no direct URL reference.
    pub fn is_unpinned(&self) -> bool {
        self.specifier.is_empty()
    }
}

impl PyProject {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn requirements(&self) -> Result<Vec<Requirement>> {
        self.project
            .dependencies
            .iter()
            .map(|line| Requirement::parse(line))
            .collect()
    }

    pub fn extras(&self) -> Result<BTreeMap<String, Vec<Requirement>>> {
        self.project
            .optional_dependencies
            .iter()
            .map(|(group, lines)| {
                let reqs = lines
                    .iter()
                    .map(|line| Requirement::parse(line))
                    .collect::<Result<Vec<_>>>()?;
                Ok((group.clone(), reqs))
            })
            .collect()
    }

    /// Requirements (core and every extra) without any version constraint.
    pub fn unpinned_dependencies(&self) -> Result<Vec<Requirement>> {
        let mut unpinned: Vec<Requirement> = self
            .requirements()?
            .into_iter()
            .filter(Requirement::is_unpinned)
            .collect();
        for reqs in self.extras()?.into_values() {
            unpinned.extend(reqs.into_iter().filter(Requirement::is_unpinned));
        }
        Ok(unpinned)
    }

    pub fn license_name(&self) -> Option<String> {
        match self.project.license.as_ref()? {
            toml::Value::String(s) => Some(s.clone()),
            toml::Value::Table(t) => t
                .get("text")
                .or_else(|| t.get("file"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            _ => None,
        }
    }

    /// Evaluates `requires-python` against an interpreter version. No
    /// constraint means any version is accepted.
    pub fn python_supported(&self, version: &str) -> Result<bool> {
        match &self.project.requires_python {
            Some(spec) => specifier_matches(spec, version),
            None => Ok(true),
        }
    }
}

fn parse_version(field: &str, version: &str) -> Result<Vec<u64>> {
    version
        .trim()
        .split('.')
        .map(|part| {
            part.parse::<u64>()
                .map_err(|_| WqError::InvalidConfigValueError {
                    field: field.to_string(),
                    value: version.to_string(),
                    reason: "expected a dotted numeric version".to_string(),
                })
        })
        .collect()
}

fn compare_versions(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Comma-separated PEP 440 clauses; every clause must hold.
pub fn specifier_matches(spec: &str, version: &str) -> Result<bool> {
    let candidate = parse_version("python version", version)?;

    for clause in spec.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        let (op, rest) = ["~=", "==", "!=", ">=", "<=", ">", "<"]
            .iter()
            .find_map(|op| clause.strip_prefix(op).map(|rest| (*op, rest.trim())))
            .ok_or_else(|| WqError::InvalidConfigValueError {
                field: "project.requires-python".to_string(),
                value: clause.to_string(),
                reason: "unknown comparison operator".to_string(),
            })?;

        let holds = if let Some(prefix) = rest.strip_suffix(".*") {
            let prefix = parse_version("project.requires-python", prefix)?;
            let matches_prefix = candidate.len() >= prefix.len()
                && candidate[..prefix.len()] == prefix[..];
            match op {
                "==" => matches_prefix,
                "!=" => !matches_prefix,
                _ => {
                    return Err(WqError::InvalidConfigValueError {
                        field: "project.requires-python".to_string(),
                        value: clause.to_string(),
                        reason: "wildcards only apply to == and !=".to_string(),
                    })
                }
            }
        } else {
            let bound = parse_version("project.requires-python", rest)?;
            let ord = compare_versions(&candidate, &bound);
            match op {
                "==" => ord == Ordering::Equal,
                "!=" => ord != Ordering::Equal,
                ">=" => ord != Ordering::Less,
                "<=" => ord != Ordering::Greater,
                ">" => ord == Ordering::Greater,
                "<" => ord == Ordering::Less,
                // ~=X.Y means >=X.Y, ==X.*
                _ => {
                    let prefix = &bound[..bound.len().saturating_sub(1).max(1)];
                    ord != Ordering::Less
                        && candidate.len() >= prefix.len()
                        && candidate[..prefix.len()] == *prefix
                }
            }
        };

        if !holds {
            return Ok(false);
        }
    }
    Ok(true)
}
