//! Read-only access to stored org authorizations.
//!
//! Authorizations are created by the platform's own tooling; metasync only
//! reads them. Records live in `~/.metasync/authorizations.json`, with a
//! `METASYNC_AUTH` environment variable override (a single JSON record)
//! taking priority for the current process.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable holding a single authorization record as JSON.
pub const AUTH_ENV_VAR: &str = "METASYNC_AUTH";

/// One stored org authorization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRecord {
    #[serde(default)]
    pub aliases: Vec<String>,
    pub instance_url: String,
    pub access_token: String,
    pub username: String,
}

impl AuthRecord {
    fn is_valid(&self) -> bool {
        !self.instance_url.is_empty() && !self.access_token.is_empty()
    }

    pub fn matches_alias(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a == alias) || self.username == alias
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not determine home directory")]
    NoHome,
    #[error("failed to read authorization store {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("authorization store {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Store of org authorizations discovered on the local machine.
pub struct AuthStore {
    store_path: PathBuf,
    env_override: Option<String>,
}

impl AuthStore {
    /// Open the store at the default location (`~/.metasync`), or a custom
    /// directory when given. The `METASYNC_AUTH` override is captured once
    /// here, so lookups are stable for the store's lifetime.
    pub fn new(store_dir: Option<PathBuf>) -> Result<Self, AuthError> {
        Self::with_override(store_dir, std::env::var(AUTH_ENV_VAR).ok())
    }

    fn with_override(
        store_dir: Option<PathBuf>,
        env_override: Option<String>,
    ) -> Result<Self, AuthError> {
        let base_dir = match store_dir {
            Some(dir) => dir,
            None => dirs::home_dir().ok_or(AuthError::NoHome)?.join(".metasync"),
        };
        Ok(Self {
            store_path: base_dir.join("authorizations.json"),
            env_override,
        })
    }

    pub fn store_path(&self) -> &PathBuf {
        &self.store_path
    }

    /// List every stored authorization.
    ///
    /// The `METASYNC_AUTH` override, when present and valid, is returned
    /// ahead of the file-backed records. A missing store file is an empty
    /// list, not an error.
    pub fn list_all(&self) -> Result<Vec<AuthRecord>, AuthError> {
        let mut records = Vec::new();

        if let Some(env_auth) = self.env_override.as_deref() {
            match serde_json::from_str::<AuthRecord>(env_auth) {
                Ok(record) if record.is_valid() => {
                    debug!("using authorization from {}", AUTH_ENV_VAR);
                    records.push(record);
                }
                Ok(_) => warn!("{} is missing required fields, ignoring", AUTH_ENV_VAR),
                Err(e) => warn!("{} is not valid JSON, ignoring: {}", AUTH_ENV_VAR, e),
            }
        }

        if !self.store_path.exists() {
            return Ok(records);
        }

        let content = std::fs::read_to_string(&self.store_path).map_err(|source| AuthError::Io {
            path: self.store_path.clone(),
            source,
        })?;
        let stored: Vec<AuthRecord> =
            serde_json::from_str(&content).map_err(|source| AuthError::Parse {
                path: self.store_path.clone(),
                source,
            })?;

        for record in stored {
            if record.is_valid() {
                records.push(record);
            } else {
                warn!(
                    "skipping stored authorization for {:?}: missing instance URL or token",
                    record.username
                );
            }
        }

        Ok(records)
    }

    /// Find the stored authorization matching an org alias.
    pub fn find_by_alias(&self, alias: &str) -> Result<Option<AuthRecord>, AuthError> {
        Ok(self
            .list_all()?
            .into_iter()
            .find(|r| r.matches_alias(alias)))
    }
}

/// Read one record out of the store for display, failing with remediation
/// guidance when nothing is stored.
pub fn describe_store(store: &AuthStore) -> Result<String> {
    let records = store
        .list_all()
        .context("failed to list stored authorizations")?;

    if records.is_empty() {
        return Ok(format!(
            "No stored authorizations found in {}.\nAuthorize an org with your platform tooling first.",
            store.store_path().display()
        ));
    }

    let mut out = String::new();
    for record in &records {
        out.push_str(&format!(
            "  {} ({})\n    aliases: {}\n",
            record.username,
            record.instance_url,
            if record.aliases.is_empty() {
                "-".to_string()
            } else {
                record.aliases.join(", ")
            }
        ));
    }
    Ok(out)
}
