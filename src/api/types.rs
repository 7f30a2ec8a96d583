//! Wire types for the metadata platform API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a server-side job as reported by status checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Request to list the targets of one artifact type present in the org.
#[derive(Debug, Serialize)]
pub(super) struct ListTargetsRequest {
    pub target_type: String,
    pub api_version: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ListTargetsResponse {
    pub targets: Vec<TargetDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct TargetDescriptor {
    pub full_name: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub last_modified: Option<DateTime<Utc>>,
}

/// Request to package current server-side artifact state for download.
#[derive(Debug, Clone, Serialize)]
pub struct RetrieveRequest {
    pub package_names: Vec<String>,
    pub single_package: bool,
    pub specific_files: Vec<String>,
    pub api_version: String,
}

/// Response to starting either asynchronous job.
#[derive(Debug, Deserialize)]
pub(super) struct JobStarted {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub(super) struct JobStatusRequest {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RetrieveStatusResponse {
    pub status: JobStatus,
    /// Base64-encoded archive, present once the job succeeds.
    #[serde(default)]
    pub archive: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Level of test execution gating a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum TestLevel {
    NoTests,
    RunSpecifiedTests,
    RunLocalTests,
    RunAllTests,
}

/// Deployment policy sent alongside the package.
#[derive(Debug, Clone, Serialize)]
pub struct DeployOptions {
    pub rollback_on_error: bool,
    pub check_only: bool,
    pub test_level: TestLevel,
    pub run_tests: Vec<String>,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            rollback_on_error: true,
            check_only: false,
            test_level: TestLevel::RunSpecifiedTests,
            run_tests: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct DeployStartRequest {
    /// Base64-encoded package archive.
    pub archive: String,
    pub options: DeployOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ComponentFailure {
    pub component: String,
    pub problem: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct TestFailureDetail {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct DeployStatusResponse {
    pub status: JobStatus,
    #[serde(default)]
    pub rolled_back: Option<bool>,
    #[serde(default)]
    pub components_deployed: u32,
    #[serde(default)]
    pub component_failures: Vec<ComponentFailure>,
    #[serde(default)]
    pub test_failures: Vec<TestFailureDetail>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}
