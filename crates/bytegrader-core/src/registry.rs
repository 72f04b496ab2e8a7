//! Assignment registry: a YAML document mapping assignment id to grader
//! configuration, read fresh on every admission per spec §4.3 so operators
//! can hot-edit it without restarting the process.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

static ASSIGNMENT_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Resource limits applied to a grader container.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResourceLimits {
    #[serde(default)]
    pub memory_mb: Option<u64>,
    #[serde(default)]
    pub cpu_limit: Option<f64>,
    #[serde(default)]
    pub pids_limit: Option<i64>,
}

/// A single assignment's grader configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentConfig {
    pub image: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub timeout_minutes: u64,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub resources: ResourceLimits,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    assignments: HashMap<String, AssignmentConfig>,
}

/// Reads and validates the registry file on demand.
#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry file not found at {0}")]
    NotFound(String),
    #[error("registry file is not valid YAML: {0}")]
    ParseError(String),
    #[error("assignment id has invalid format")]
    InvalidAssignmentId,
    #[error("assignment not found or not enabled")]
    UnknownOrDisabled,
}

impl Registry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Validate the assignment id grammar: `^[A-Za-z0-9_-]{1,50}$` (spec §6).
    pub fn is_valid_assignment_id_format(id: &str) -> bool {
        !id.is_empty() && id.len() <= 50 && ASSIGNMENT_ID_RE.is_match(id)
    }

    fn load(&self) -> Result<HashMap<String, AssignmentConfig>, RegistryError> {
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|_| RegistryError::NotFound(self.path.display().to_string()))?;
        let parsed: RegistryFile = serde_yaml::from_str(&contents)
            .map_err(|e| RegistryError::ParseError(e.to_string()))?;
        Ok(parsed.assignments)
    }

    /// Resolve an assignment id to its config, re-reading the registry file
    /// from disk. Returns an error if the format is invalid, the file can't
    /// be parsed, or the assignment is missing/disabled.
    pub fn resolve(&self, assignment_id: &str) -> Result<AssignmentConfig, RegistryError> {
        if !Self::is_valid_assignment_id_format(assignment_id) {
            return Err(RegistryError::InvalidAssignmentId);
        }
        let assignments = self.load()?;
        match assignments.get(assignment_id) {
            Some(cfg) if cfg.enabled => Ok(cfg.clone()),
            _ => Err(RegistryError::UnknownOrDisabled),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_registry(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn resolves_enabled_assignment() {
        let file = write_registry(
            "assignments:\n  test-stub:\n    image: demo/stub\n    enabled: true\n    timeout_minutes: 1\n",
        );
        let registry = Registry::new(file.path());
        let cfg = registry.resolve("test-stub").unwrap();
        assert_eq!(cfg.image, "demo/stub");
        assert_eq!(cfg.timeout_minutes, 1);
    }

    #[test]
    fn rejects_disabled_assignment() {
        let file = write_registry(
            "assignments:\n  foo:\n    image: demo/x\n    enabled: false\n",
        );
        let registry = Registry::new(file.path());
        assert!(matches!(
            registry.resolve("foo"),
            Err(RegistryError::UnknownOrDisabled)
        ));
    }

    #[test]
    fn rejects_unknown_assignment() {
        let file = write_registry("assignments: {}\n");
        let registry = Registry::new(file.path());
        assert!(matches!(
            registry.resolve("nope"),
            Err(RegistryError::UnknownOrDisabled)
        ));
    }

    #[test]
    fn rejects_malformed_id_before_touching_disk() {
        assert!(!Registry::is_valid_assignment_id_format(""));
        assert!(!Registry::is_valid_assignment_id_format("has.dots"));
        assert!(!Registry::is_valid_assignment_id_format(&"a".repeat(51)));
        assert!(Registry::is_valid_assignment_id_format(&"a".repeat(50)));
    }

    #[test]
    fn reloads_from_disk_on_every_call() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"assignments:\n  foo:\n    image: demo/x\n    enabled: false\n")
            .unwrap();
        let registry = Registry::new(file.path());
        assert!(registry.resolve("foo").is_err());

        file.as_file()
            .set_len(0)
            .unwrap();
        use std::io::Seek;
        file.as_file().seek(std::io::SeekFrom::Start(0)).unwrap();
        file.write_all(b"assignments:\n  foo:\n    image: demo/x\n    enabled: true\n")
            .unwrap();

        assert!(registry.resolve("foo").is_ok());
    }
}
