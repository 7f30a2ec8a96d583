//! Project configuration resolution.
//!
//! A metasync project is marked by a `metasync.json` file at its root. The
//! workflow reads exactly one field from it: the alias of the org it deploys
//! to. Resolution searches upward from the working directory, the same way
//! the workspace root is located from a subdirectory of a repository.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Project configuration file name.
pub const PROJECT_FILE: &str = "metasync.json";

/// Configuration errors for project and manifest resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no {PROJECT_FILE} found searching upward from {start}")]
    ProjectNotFound { start: PathBuf },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid project configuration in {path}: {source}")]
    ProjectParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("manifest {path} is not well-formed XML: {source}")]
    ManifestXml {
        path: PathBuf,
        source: roxmltree::Error,
    },
    #[error("manifest {path} has no root Package element")]
    ManifestNoPackage { path: PathBuf },
    #[error("manifest {path} is missing the Package version attribute")]
    ManifestNoVersion { path: PathBuf },
    #[error("manifest {path} declares no artifact types")]
    ManifestNoTypes { path: PathBuf },
}

#[derive(Debug, Deserialize)]
struct ProjectConfig {
    #[serde(rename = "target-org")]
    target_org: String,
}

/// A resolved project: its root directory and parsed configuration.
#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    target_org: String,
}

impl Project {
    /// Resolve the project containing `start` by walking upward until a
    /// `metasync.json` is found.
    pub fn resolve(start: &Path) -> Result<Self, ConfigError> {
        let mut dir = Some(start);
        while let Some(current) = dir {
            let candidate = current.join(PROJECT_FILE);
            if candidate.exists() {
                return Self::load(current, &candidate);
            }
            dir = current.parent();
        }
        Err(ConfigError::ProjectNotFound {
            start: start.to_path_buf(),
        })
    }

    fn load(root: &Path, config_path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(config_path).map_err(|source| ConfigError::Io {
            path: config_path.to_path_buf(),
            source,
        })?;
        let config: ProjectConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::ProjectParse {
                path: config_path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            root: root.to_path_buf(),
            target_org: config.target_org,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Alias of the org this project targets.
    pub fn target_org(&self) -> &str {
        &self.target_org
    }

    /// Default manifest location for the project.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest").join("package.xml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn resolves_from_nested_directory() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(PROJECT_FILE),
            r#"{"target-org": "dev"}"#,
        )
        .unwrap();
        let nested = tmp.path().join("src").join("classes");
        fs::create_dir_all(&nested).unwrap();

        let project = Project::resolve(&nested).unwrap();
        assert_eq!(project.target_org(), "dev");
        assert_eq!(project.root(), tmp.path());
    }

    #[test]
    fn missing_project_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = Project::resolve(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ProjectNotFound { .. }));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(PROJECT_FILE), "{").unwrap();
        let err = Project::resolve(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ProjectParse { .. }));
    }

    #[test]
    fn manifest_path_is_under_manifest_dir() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(PROJECT_FILE),
            r#"{"target-org": "dev"}"#,
        )
        .unwrap();
        let project = Project::resolve(tmp.path()).unwrap();
        assert!(project.manifest_path().ends_with("manifest/package.xml"));
    }
}
