//! Retrieval client: package current server-side artifact state and wait
//! for the packaging job to finish.

use std::collections::BTreeSet;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;
use tracing::{debug, info};

use super::client::{ApiFailure, Connection};
use super::poll::{poll_until_complete, PollConfig, PollError, Polled};
use super::types::{
    JobStarted, JobStatus, JobStatusRequest, ListTargetsRequest, ListTargetsResponse,
    RetrieveRequest, RetrieveStatusResponse,
};

const LIST_PATH: &str = "services/metadata/list";
const RETRIEVE_PATH: &str = "services/metadata/retrieve";
const RETRIEVE_STATUS_PATH: &str = "services/metadata/retrieve/status";

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("org rejected the stored credentials: {0}")]
    AuthFailure(String),
    #[error("requested targets do not exist in the org: {0}")]
    TargetNotFound(String),
    #[error("remote packaging job failed: {reason}")]
    JobFailed { reason: String },
    #[error("retrieval did not reach a terminal state within {0:?}")]
    TimedOut(Duration),
    #[error("retrieval request failed: {0}")]
    Remote(String),
}

impl From<ApiFailure> for RetrievalError {
    fn from(failure: ApiFailure) -> Self {
        match failure {
            ApiFailure::Unauthorized { message, .. } => RetrievalError::AuthFailure(message),
            ApiFailure::NotFound { message } => RetrievalError::TargetNotFound(message),
            other => RetrievalError::Remote(other.to_string()),
        }
    }
}

/// Handle for an in-flight server-side packaging job.
#[derive(Debug, Clone)]
pub struct RetrieveJob {
    pub id: String,
}

/// List the identifiers of every target of `target_type` in the org,
/// deduplicated.
pub async fn list_targets(
    conn: &Connection,
    target_type: &str,
    api_version: &str,
) -> Result<BTreeSet<String>, RetrievalError> {
    let response: ListTargetsResponse = conn
        .post_json(
            LIST_PATH,
            &ListTargetsRequest {
                target_type: target_type.to_string(),
                api_version: api_version.to_string(),
            },
        )
        .await?;

    let targets: BTreeSet<String> = response
        .targets
        .into_iter()
        .map(|t| t.full_name)
        .collect();
    debug!("org lists {} {} target(s)", targets.len(), target_type);
    Ok(targets)
}

/// Start a packaging job for the requested targets. Returns immediately
/// with the job handle; completion is awaited separately.
pub async fn begin_retrieve(
    conn: &Connection,
    request: &RetrieveRequest,
) -> Result<RetrieveJob, RetrievalError> {
    let started: JobStarted = conn.post_json(RETRIEVE_PATH, request).await?;
    info!("retrieval job {} started", started.id);
    Ok(RetrieveJob { id: started.id })
}

/// Poll the packaging job to its terminal state and return the raw archive
/// bytes on success.
pub async fn await_completion(
    conn: &Connection,
    job: &RetrieveJob,
    config: &PollConfig,
) -> Result<Vec<u8>, RetrievalError> {
    let result = poll_until_complete(config, || {
        let id = job.id.clone();
        async move {
            let status: RetrieveStatusResponse = conn
                .post_json(RETRIEVE_STATUS_PATH, &JobStatusRequest { id })
                .await?;

            Ok::<_, ApiFailure>(match status.status {
                JobStatus::Queued | JobStatus::Running => Polled::Pending,
                JobStatus::Failed => Polled::Failed(
                    status
                        .error_message
                        .unwrap_or_else(|| "no reason supplied".to_string()),
                ),
                JobStatus::Succeeded => match status.archive {
                    Some(encoded) => match BASE64.decode(encoded.as_bytes()) {
                        Ok(bytes) => Polled::Complete(bytes),
                        Err(e) => {
                            Polled::Failed(format!("archive payload is not valid base64: {}", e))
                        }
                    },
                    None => Polled::Failed("job succeeded but returned no archive".to_string()),
                },
            })
        }
    })
    .await;

    match result {
        Ok(bytes) => {
            info!("retrieval job {} complete ({} bytes)", job.id, bytes.len());
            Ok(bytes)
        }
        Err(PollError::TimedOut(bound)) => Err(RetrievalError::TimedOut(bound)),
        Err(PollError::Failed(reason)) => Err(RetrievalError::JobFailed { reason }),
        Err(PollError::Api(failure)) => Err(failure.into()),
    }
}
