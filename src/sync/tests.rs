//! Orchestrator scenario tests with a mock editor and gateway.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::api::deploy::{DeployError, DeployOutcome, DeployRequest};
use crate::api::retrieve::RetrievalError;
use crate::api::{DeployOptions, RetrieveRequest};
use crate::archive::{self, CodecError};
use crate::auth::AuthStore;
use crate::manifest::Manifest;

use super::editor::{Confirmation, Document, Editor};
use super::lock::SyncLocks;
use super::select::ActiveDocumentSelector;
use super::{RemoteGateway, SyncError, SyncOutcome, SyncState, SyncWorkflow};

struct MockEditor {
    document: Option<Document>,
    answer: Confirmation,
    messages: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockEditor {
    fn new(document: Option<Document>, answer: Confirmation) -> Self {
        Self {
            document,
            answer,
            messages: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Editor for MockEditor {
    fn active_document(&self) -> Option<Document> {
        self.document.clone()
    }

    fn show_message(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }

    async fn confirm(&self, prompt: &str) -> Confirmation {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer
    }
}

#[derive(Default)]
struct GatewayInner {
    list_calls: AtomicUsize,
    retrieve_calls: AtomicUsize,
    deploy_calls: AtomicUsize,
    remote: Mutex<BTreeMap<String, String>>,
    deploy_error: Mutex<Option<DeployError>>,
}

#[derive(Clone, Default)]
struct MockGateway {
    inner: Arc<GatewayInner>,
}

impl MockGateway {
    fn with_remote(entries: &[(&str, &str)]) -> Self {
        let gateway = Self::default();
        let mut remote = gateway.inner.remote.lock().unwrap();
        for (name, text) in entries {
            remote.insert(name.to_string(), text.to_string());
        }
        drop(remote);
        gateway
    }

    fn fail_deploy_with(self, error: DeployError) -> Self {
        *self.inner.deploy_error.lock().unwrap() = Some(error);
        self
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn list_targets(
        &self,
        _target_type: &str,
        _api_version: &str,
    ) -> Result<BTreeSet<String>, RetrievalError> {
        self.inner.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .inner
            .remote
            .lock()
            .unwrap()
            .keys()
            .cloned()
            .collect())
    }

    async fn retrieve_archive(&self, _request: &RetrieveRequest) -> Result<Vec<u8>, RetrievalError> {
        self.inner.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        let remote = self.inner.remote.lock().unwrap().clone();
        Ok(archive::encode(&remote).unwrap())
    }

    async fn deploy(&self, _request: DeployRequest) -> Result<DeployOutcome, DeployError> {
        self.inner.deploy_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.inner.deploy_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(DeployOutcome {
            id: "deploy-1".to_string(),
            components_deployed: 1,
            check_only: false,
            completed_at: None,
        })
    }
}

fn auth_store(tmp: &TempDir, with_dev_record: bool) -> AuthStore {
    if with_dev_record {
        std::fs::write(
            tmp.path().join("authorizations.json"),
            r#"[{
                "aliases": ["dev"],
                "instanceUrl": "https://dev.example-platform.com",
                "accessToken": "tok-1",
                "username": "dev@example.com"
            }]"#,
        )
        .unwrap();
    }
    AuthStore::new(Some(tmp.path().to_path_buf())).unwrap()
}

fn manifest() -> Manifest {
    Manifest {
        api_version: "58.0".to_string(),
        types: vec!["SourceClass".to_string()],
    }
}

fn invoice_document(text: &str) -> Document {
    Document {
        path: PathBuf::from("/work/classes/Invoice.cls"),
        text: text.to_string(),
    }
}

fn workflow(
    auth: AuthStore,
    editor: MockEditor,
    gateway: MockGateway,
    locks: Arc<SyncLocks>,
) -> SyncWorkflow<MockEditor, ActiveDocumentSelector, MockGateway, impl Fn(&super::IdentityContext) -> MockGateway>
{
    SyncWorkflow::new(
        auth,
        "dev".to_string(),
        manifest(),
        DeployOptions::default(),
        editor,
        ActiveDocumentSelector,
        locks,
        move |_identity: &super::IdentityContext| gateway.clone(),
    )
}

#[tokio::test]
async fn zero_authorizations_fails_before_any_remote_call() {
    let tmp = TempDir::new().unwrap();
    let gateway = MockGateway::default();
    let editor = MockEditor::new(Some(invoice_document("a\n")), Confirmation::Continue);

    let mut wf = workflow(
        auth_store(&tmp, false),
        editor,
        gateway.clone(),
        Arc::new(SyncLocks::new()),
    );
    let outcome = wf.run().await;

    assert!(matches!(
        outcome,
        SyncOutcome::Failed(SyncError::NoAuthorization { alias }) if alias == "dev"
    ));
    assert_eq!(
        wf.states(),
        &[
            SyncState::Idle,
            SyncState::ResolvingIdentity,
            SyncState::Failed
        ]
    );
    assert_eq!(gateway.inner.list_calls.load(Ordering::SeqCst), 0);
    assert_eq!(gateway.inner.retrieve_calls.load(Ordering::SeqCst), 0);
    assert_eq!(gateway.inner.deploy_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn no_active_document_returns_to_idle() {
    let tmp = TempDir::new().unwrap();
    let gateway = MockGateway::default();
    let editor = MockEditor::new(None, Confirmation::Continue);

    let mut wf = workflow(
        auth_store(&tmp, true),
        editor,
        gateway.clone(),
        Arc::new(SyncLocks::new()),
    );
    let outcome = wf.run().await;

    assert!(matches!(
        outcome,
        SyncOutcome::Failed(SyncError::NoActiveDocument)
    ));
    assert_eq!(wf.states(), &[SyncState::Idle]);
    assert_eq!(gateway.inner.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn abort_at_confirmation_never_deploys() {
    let tmp = TempDir::new().unwrap();
    let gateway = MockGateway::with_remote(&[("classes/Invoice.cls", "a\nx\nc\n")]);
    let editor = MockEditor::new(Some(invoice_document("a\nb\nc\n")), Confirmation::Abort);

    let mut wf = workflow(
        auth_store(&tmp, true),
        editor,
        gateway.clone(),
        Arc::new(SyncLocks::new()),
    );
    let outcome = wf.run().await;

    assert!(matches!(outcome, SyncOutcome::Aborted));
    assert_eq!(wf.states().last(), Some(&SyncState::Aborted));
    assert_eq!(gateway.inner.retrieve_calls.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.inner.deploy_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn confirmation_prompt_shows_line_markers() {
    let tmp = TempDir::new().unwrap();
    let gateway = MockGateway::with_remote(&[("classes/Invoice.cls", "a\nx\nc\n")]);
    let editor = MockEditor::new(Some(invoice_document("a\nb\nc\n")), Confirmation::Abort);
    let prompts = editor.prompts.clone();

    let mut wf = workflow(
        auth_store(&tmp, true),
        editor,
        gateway,
        Arc::new(SyncLocks::new()),
    );
    wf.run().await;

    let prompts = prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].lines().any(|l| l == "- b"));
    assert!(prompts[0].lines().any(|l| l == "+ x"));
}

#[tokio::test]
async fn confirmed_deploy_runs_to_done() {
    let tmp = TempDir::new().unwrap();
    let gateway = MockGateway::with_remote(&[("classes/Invoice.cls", "a\nx\nc\n")]);
    let editor = MockEditor::new(Some(invoice_document("a\nb\nc\n")), Confirmation::Continue);
    let messages = editor.messages.clone();

    let mut wf = workflow(
        auth_store(&tmp, true),
        editor,
        gateway.clone(),
        Arc::new(SyncLocks::new()),
    );
    let outcome = wf.run().await;

    assert!(matches!(outcome, SyncOutcome::Deployed(_)));
    assert_eq!(
        wf.states(),
        &[
            SyncState::Idle,
            SyncState::ResolvingIdentity,
            SyncState::Retrieving,
            SyncState::Decoding,
            SyncState::Diffing,
            SyncState::AwaitingConfirmation,
            SyncState::Deploying,
            SyncState::Done
        ]
    );
    assert_eq!(gateway.inner.deploy_calls.load(Ordering::SeqCst), 1);
    assert!(messages
        .lock()
        .unwrap()
        .iter()
        .any(|m| m.contains("successfully deployed") && m.contains("1 component(s)")));
}

#[test]
fn packaging_failures_report_the_deployment_stage() {
    let packaging = SyncError::Packaging(CodecError::NonText {
        entry: "Invoice.cls".to_string(),
    });
    assert_eq!(packaging.stage(), "deployment");

    // Decode failures of the retrieved archive keep their own stage name.
    let decoding = SyncError::Codec(CodecError::NonText {
        entry: "Invoice.cls".to_string(),
    });
    assert_eq!(decoding.stage(), "archive decoding");
}

#[tokio::test]
async fn deploy_test_failures_surface_the_diagnostic_verbatim() {
    let tmp = TempDir::new().unwrap();
    let diagnostic = "InvoiceTest.test_total: expected 3 rows, got 2";
    let gateway = MockGateway::with_remote(&[("classes/Invoice.cls", "a\nx\nc\n")])
        .fail_deploy_with(DeployError::TestFailures(diagnostic.to_string()));
    let editor = MockEditor::new(Some(invoice_document("a\nb\nc\n")), Confirmation::Continue);
    let messages = editor.messages.clone();

    let mut wf = workflow(
        auth_store(&tmp, true),
        editor,
        gateway.clone(),
        Arc::new(SyncLocks::new()),
    );
    let outcome = wf.run().await;

    assert!(matches!(
        outcome,
        SyncOutcome::Failed(SyncError::Deploy(DeployError::TestFailures(_)))
    ));
    assert_eq!(wf.states().last(), Some(&SyncState::Failed));
    assert!(messages
        .lock()
        .unwrap()
        .iter()
        .any(|m| m.contains("deployment") && m.contains(diagnostic)));
}

#[tokio::test]
async fn second_sync_on_same_file_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let gateway = MockGateway::with_remote(&[("classes/Invoice.cls", "a\n")]);
    let editor = MockEditor::new(Some(invoice_document("a\n")), Confirmation::Continue);

    let locks = Arc::new(SyncLocks::new());
    let _held = locks.acquire(&PathBuf::from("/work/classes/Invoice.cls")).unwrap();

    let mut wf = workflow(auth_store(&tmp, true), editor, gateway.clone(), locks);
    let outcome = wf.run().await;

    assert!(matches!(
        outcome,
        SyncOutcome::Failed(SyncError::AlreadyInProgress(_))
    ));
    assert_eq!(gateway.inner.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_remote_artifact_diffs_against_empty_text() {
    let tmp = TempDir::new().unwrap();
    let gateway = MockGateway::with_remote(&[("classes/Other.cls", "x\n")]);
    let editor = MockEditor::new(Some(invoice_document("a\n")), Confirmation::Abort);
    let prompts = editor.prompts.clone();

    let mut wf = workflow(
        auth_store(&tmp, true),
        editor,
        gateway,
        Arc::new(SyncLocks::new()),
    );
    let outcome = wf.run().await;

    assert!(matches!(outcome, SyncOutcome::Aborted));
    // The whole local file shows as removed relative to an empty remote.
    let prompts = prompts.lock().unwrap();
    assert!(prompts[0].lines().any(|l| l == "- a"));
}
