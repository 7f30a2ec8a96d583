//! The retrieve–diff–confirm–deploy workflow.
//!
//! One invocation drives a single file through:
//!
//! ```text
//! Idle -> ResolvingIdentity -> Retrieving -> Decoding -> Diffing
//!      -> AwaitingConfirmation -> Deploying -> Done
//! ```
//!
//! `Aborted` is reachable from the confirmation prompt, `Failed` from any
//! state on error. All remote access goes through [`RemoteGateway`], all user
//! interaction through [`Editor`]; both are trait seams so the state machine
//! is testable without an org.

pub mod editor;
pub mod gateway;
pub mod lock;
pub mod select;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::api::deploy::{DeployError, DeployOutcome, DeployRequest};
use crate::api::retrieve::RetrievalError;
use crate::api::{DeployOptions, RetrieveRequest};
use crate::archive::{self, CodecError};
use crate::auth::{AuthError, AuthStore};
use crate::diff;
use crate::manifest::Manifest;

use self::editor::{Confirmation, Document, Editor};
use self::lock::SyncLocks;
use self::select::TargetSelector;

/// Workflow states, in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    ResolvingIdentity,
    Retrieving,
    Decoding,
    Diffing,
    AwaitingConfirmation,
    Deploying,
    Done,
    Aborted,
    Failed,
}

/// Resolved connection parameters for this invocation. Immutable once built;
/// the gateway is constructed from it exactly once.
#[derive(Debug, Clone)]
pub struct IdentityContext {
    pub endpoint: String,
    pub access_token: String,
    pub username: String,
}

/// Remote side of the workflow: target listing, packaging, deployment.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn list_targets(
        &self,
        target_type: &str,
        api_version: &str,
    ) -> Result<BTreeSet<String>, RetrievalError>;

    /// Start a packaging job and await its archive.
    async fn retrieve_archive(&self, request: &RetrieveRequest) -> Result<Vec<u8>, RetrievalError>;

    async fn deploy(&self, request: DeployRequest) -> Result<DeployOutcome, DeployError>;
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no document is currently open")]
    NoActiveDocument,
    #[error("a sync for {0} is already in progress")]
    AlreadyInProgress(PathBuf),
    #[error("no stored authorization matches target org {alias:?}; authorize the org first, then retry")]
    NoAuthorization { alias: String },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("could not package the local artifact: {0}")]
    Packaging(CodecError),
    #[error(transparent)]
    Deploy(#[from] DeployError),
}

impl SyncError {
    /// The stage named in the user-facing failure message.
    pub fn stage(&self) -> &'static str {
        match self {
            SyncError::NoActiveDocument | SyncError::AlreadyInProgress(_) => "startup",
            SyncError::NoAuthorization { .. } | SyncError::Auth(_) => "identity resolution",
            SyncError::Retrieval(_) => "retrieval",
            SyncError::Codec(_) => "archive decoding",
            SyncError::Packaging(_) | SyncError::Deploy(_) => "deployment",
        }
    }
}

/// Terminal result of one invocation.
#[derive(Debug)]
pub enum SyncOutcome {
    Deployed(DeployOutcome),
    Aborted,
    Failed(SyncError),
}

/// The workflow controller. Owns every invocation-scoped value; nothing
/// crosses invocations except the advisory lock registry.
pub struct SyncWorkflow<E, S, G, F>
where
    E: Editor,
    S: TargetSelector,
    G: RemoteGateway,
    F: Fn(&IdentityContext) -> G,
{
    auth: AuthStore,
    target_org: String,
    manifest: Manifest,
    options: DeployOptions,
    editor: E,
    selector: S,
    locks: Arc<SyncLocks>,
    connect: F,
    states: Vec<SyncState>,
}

impl<E, S, G, F> SyncWorkflow<E, S, G, F>
where
    E: Editor,
    S: TargetSelector,
    G: RemoteGateway,
    F: Fn(&IdentityContext) -> G,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        auth: AuthStore,
        target_org: String,
        manifest: Manifest,
        options: DeployOptions,
        editor: E,
        selector: S,
        locks: Arc<SyncLocks>,
        connect: F,
    ) -> Self {
        Self {
            auth,
            target_org,
            manifest,
            options,
            editor,
            selector,
            locks,
            connect,
            states: Vec::new(),
        }
    }

    /// States visited so far, in order.
    pub fn states(&self) -> &[SyncState] {
        &self.states
    }

    fn enter(&mut self, state: SyncState) {
        debug!("sync state -> {:?}", state);
        self.states.push(state);
    }

    /// Run the workflow to a terminal state. Errors are reported to the
    /// user through the editor surface and folded into the outcome.
    pub async fn run(&mut self) -> SyncOutcome {
        match self.drive().await {
            Ok(outcome) => outcome,
            Err(err) => {
                // NoActiveDocument returns to Idle rather than Failed: the
                // workflow never actually started.
                if !matches!(err, SyncError::NoActiveDocument) {
                    self.enter(SyncState::Failed);
                }
                self.editor
                    .show_message(&format!("Sync failed during {}: {}", err.stage(), err));
                SyncOutcome::Failed(err)
            }
        }
    }

    async fn drive(&mut self) -> Result<SyncOutcome, SyncError> {
        self.enter(SyncState::Idle);

        let document = self
            .editor
            .active_document()
            .ok_or(SyncError::NoActiveDocument)?;
        let _guard = self
            .locks
            .acquire(&document.path)
            .ok_or_else(|| SyncError::AlreadyInProgress(document.path.clone()))?;

        self.enter(SyncState::ResolvingIdentity);
        let identity = self.resolve_identity()?;
        let gateway = (self.connect)(&identity);

        self.enter(SyncState::Retrieving);
        let raw_archive = self.retrieve(&gateway, &document).await?;

        self.enter(SyncState::Decoding);
        let snapshot = archive::decode(&raw_archive)?;

        self.enter(SyncState::Diffing);
        let artifact = artifact_name(&document.path);
        let remote_text = remote_text_for(&snapshot, &document.path)
            .cloned()
            .unwrap_or_default();
        let script = diff::compute_changes(&document.text, &remote_text);

        self.enter(SyncState::AwaitingConfirmation);
        let prompt = if script.is_empty() {
            format!("{} is identical to the remote copy.", artifact)
        } else {
            format!(
                "Changes between local and remote {}:\n{}",
                artifact,
                diff::render_summary(&script)
            )
        };
        if self.editor.confirm(&prompt).await == Confirmation::Abort {
            self.enter(SyncState::Aborted);
            self.editor.show_message("Sync aborted; the org was not changed.");
            return Ok(SyncOutcome::Aborted);
        }

        self.enter(SyncState::Deploying);
        let mut entries = BTreeMap::new();
        entries.insert(artifact.clone(), document.text.clone());
        let package = archive::encode(&entries).map_err(SyncError::Packaging)?;
        let outcome = gateway
            .deploy(DeployRequest {
                archive: package,
                options: self.options.clone(),
            })
            .await?;

        self.enter(SyncState::Done);
        info!("deployment job {} finished", outcome.id);
        if let Some(at) = outcome.completed_at {
            debug!("deployment job {} completed at {}", outcome.id, at);
        }
        self.editor.show_message(&format!(
            "{} successfully {} to {} ({} component(s)).",
            artifact,
            if outcome.check_only {
                "validated against"
            } else {
                "deployed"
            },
            identity.username,
            outcome.components_deployed
        ));
        Ok(SyncOutcome::Deployed(outcome))
    }

    fn resolve_identity(&self) -> Result<IdentityContext, SyncError> {
        let record = self
            .auth
            .find_by_alias(&self.target_org)?
            .ok_or_else(|| SyncError::NoAuthorization {
                alias: self.target_org.clone(),
            })?;

        Ok(IdentityContext {
            endpoint: record.instance_url,
            access_token: record.access_token,
            username: record.username,
        })
    }

    async fn retrieve(
        &self,
        gateway: &G,
        document: &Document,
    ) -> Result<Vec<u8>, SyncError> {
        let targets = gateway
            .list_targets(self.manifest.primary_type(), &self.manifest.api_version)
            .await?;
        let specific_files = self.selector.select_targets(document);

        let request = RetrieveRequest {
            package_names: targets.into_iter().collect(),
            single_package: false,
            specific_files: specific_files.into_iter().collect(),
            api_version: self.manifest.api_version.clone(),
        };
        debug!(
            "retrieving {} package(s), narrowed to {:?}",
            request.package_names.len(),
            request.specific_files
        );

        Ok(gateway.retrieve_archive(&request).await?)
    }
}

/// Artifact name for a local file: its file name component.
fn artifact_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Look up the remote snapshot entry for a local file. Snapshot keys are
/// org-side paths, so a match is either the exact file name or a key ending
/// in `/<file name>`.
fn remote_text_for<'a>(
    snapshot: &'a BTreeMap<String, String>,
    path: &Path,
) -> Option<&'a String> {
    let name = artifact_name(path);
    snapshot
        .get(&name)
        .or_else(|| {
            let suffix = format!("/{}", name);
            snapshot
                .iter()
                .find(|(key, _)| key.ends_with(&suffix))
                .map(|(_, text)| text)
        })
}
