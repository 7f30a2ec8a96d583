//! Deployment client: upload a package and wait for the org to report a
//! terminal outcome.
//!
//! The client is fail-fast: rollback is honored by the org per the request
//! policy, and whatever terminal state the org reports is translated into a
//! single outcome here, never retried.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use super::client::{ApiFailure, Connection};
use super::poll::{poll_until_complete, PollConfig, PollError, Polled};
use super::types::{
    DeployOptions, DeployStartRequest, DeployStatusResponse, JobStarted, JobStatus,
    JobStatusRequest,
};

const DEPLOY_PATH: &str = "services/metadata/deploy";
const DEPLOY_STATUS_PATH: &str = "services/metadata/deploy/status";

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("deployment rejected before execution: {0}")]
    ValidationFailed(String),
    #[error("deployment blocked by failing tests: {0}")]
    TestFailures(String),
    #[error("deployment partially applied, rollback was disabled: {0}")]
    PartialFailure(String),
    #[error("deployment did not reach a terminal state within {0:?}")]
    TimedOut(Duration),
    #[error("deployment request failed: {0}")]
    Remote(String),
}

/// The local package plus its deployment policy.
#[derive(Debug)]
pub struct DeployRequest {
    pub archive: Vec<u8>,
    pub options: DeployOptions,
}

/// Terminal success signal for one deployment.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub id: String,
    pub components_deployed: u32,
    pub check_only: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Upload the package and await the terminal outcome.
pub async fn deploy(
    conn: &Connection,
    request: DeployRequest,
    config: &PollConfig,
) -> Result<DeployOutcome, DeployError> {
    let check_only = request.options.check_only;
    let start = DeployStartRequest {
        archive: BASE64.encode(&request.archive),
        options: request.options,
    };

    let started: JobStarted = conn
        .post_json(DEPLOY_PATH, &start)
        .await
        .map_err(remote_failure)?;
    info!("deployment job {} submitted", started.id);

    let job_id = started.id.clone();
    let result = poll_until_complete(config, || {
        let id = job_id.clone();
        async move {
            let status: DeployStatusResponse = conn
                .post_json(DEPLOY_STATUS_PATH, &JobStatusRequest { id })
                .await?;

            Ok::<_, ApiFailure>(match status.status {
                JobStatus::Queued | JobStatus::Running => Polled::Pending,
                JobStatus::Succeeded | JobStatus::Failed => Polled::Complete(status),
            })
        }
    })
    .await;

    let status = match result {
        Ok(status) => status,
        Err(PollError::TimedOut(bound)) => return Err(DeployError::TimedOut(bound)),
        Err(PollError::Failed(reason)) => return Err(DeployError::Remote(reason)),
        Err(PollError::Api(failure)) => return Err(remote_failure(failure)),
    };

    match status.status {
        JobStatus::Succeeded => {
            info!(
                "deployment job {} succeeded ({} component(s))",
                started.id, status.components_deployed
            );
            Ok(DeployOutcome {
                id: started.id,
                components_deployed: status.components_deployed,
                check_only,
                completed_at: status.completed_at,
            })
        }
        _ => Err(classify_failure(&status)),
    }
}

fn remote_failure(failure: ApiFailure) -> DeployError {
    DeployError::Remote(failure.to_string())
}

/// Translate a failed deploy status into the error taxonomy. Server
/// diagnostics pass through verbatim.
fn classify_failure(status: &DeployStatusResponse) -> DeployError {
    if !status.test_failures.is_empty() {
        let detail = status
            .test_failures
            .iter()
            .map(|t| format!("{}: {}", t.name, t.message))
            .collect::<Vec<_>>()
            .join("; ");
        return DeployError::TestFailures(detail);
    }

    let component_detail = status
        .component_failures
        .iter()
        .map(|c| format!("{}: {}", c.component, c.problem))
        .collect::<Vec<_>>()
        .join("; ");

    if !status.component_failures.is_empty()
        && status.rolled_back == Some(false)
        && status.components_deployed > 0
    {
        return DeployError::PartialFailure(format!(
            "{} component(s) deployed before the failure; {}",
            status.components_deployed, component_detail
        ));
    }

    let detail = match status.error_message.as_deref() {
        Some(msg) if !msg.is_empty() => msg.to_string(),
        _ if !component_detail.is_empty() => component_detail,
        _ => "no diagnostic provided".to_string(),
    };
    DeployError::ValidationFailed(detail)
}
