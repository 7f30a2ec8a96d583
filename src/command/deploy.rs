//! The "deploy current file" command: wires the configuration shims into
//! one workflow invocation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::api::{DeployOptions, TestLevel};
use crate::auth::AuthStore;
use crate::manifest::Manifest;
use crate::project::Project;
use crate::sync::editor::ConsoleEditor;
use crate::sync::gateway::OrgGateway;
use crate::sync::lock::SyncLocks;
use crate::sync::select::ActiveDocumentSelector;
use crate::sync::{SyncOutcome, SyncWorkflow};

pub async fn run_deploy(
    file: PathBuf,
    check_only: bool,
    test_level: TestLevel,
    run_tests: Vec<String>,
) -> Result<()> {
    let cwd = std::env::current_dir().context("could not determine working directory")?;
    let project = Project::resolve(&cwd).context("project configuration")?;
    let manifest = Manifest::read(&project.manifest_path()).context("package manifest")?;
    let auth = AuthStore::new(None).context("authorization store")?;

    let options = DeployOptions {
        rollback_on_error: true,
        check_only,
        test_level,
        run_tests,
    };

    let mut workflow = SyncWorkflow::new(
        auth,
        project.target_org().to_string(),
        manifest,
        options,
        ConsoleEditor::new(file),
        ActiveDocumentSelector,
        SyncLocks::shared(),
        OrgGateway::connect,
    );

    match workflow.run().await {
        SyncOutcome::Deployed(outcome) => {
            debug!(
                "deploy job {} done, {} component(s)",
                outcome.id, outcome.components_deployed
            );
            Ok(())
        }
        SyncOutcome::Aborted => Ok(()),
        // The workflow already showed the stage-specific message.
        SyncOutcome::Failed(err) => {
            anyhow::bail!("sync did not complete ({} stage)", err.stage())
        }
    }
}
