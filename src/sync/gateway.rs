//! Production gateway: the trait seam wired to the real org connection.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::api::deploy::{self, DeployError, DeployOutcome, DeployRequest};
use crate::api::retrieve::{self, RetrievalError};
use crate::api::{Connection, ConnectionConfig, PollConfig, RetrieveRequest};

use super::{IdentityContext, RemoteGateway};

/// Deployments may run gated test suites; give them a longer bound than
/// retrieval packaging.
fn deploy_poll_config() -> PollConfig {
    PollConfig {
        timeout: std::time::Duration::from_secs(600),
        ..PollConfig::default()
    }
}

pub struct OrgGateway {
    conn: Connection,
    retrieve_poll: PollConfig,
    deploy_poll: PollConfig,
}

impl OrgGateway {
    /// Construct the gateway from the resolved identity.
    pub fn connect(identity: &IdentityContext) -> Self {
        let conn = Connection::new(ConnectionConfig {
            endpoint: identity.endpoint.clone(),
            access_token: identity.access_token.clone(),
            username: identity.username.clone(),
        });
        Self {
            conn,
            retrieve_poll: PollConfig::default(),
            deploy_poll: deploy_poll_config(),
        }
    }
}

#[async_trait]
impl RemoteGateway for OrgGateway {
    async fn list_targets(
        &self,
        target_type: &str,
        api_version: &str,
    ) -> Result<BTreeSet<String>, RetrievalError> {
        retrieve::list_targets(&self.conn, target_type, api_version).await
    }

    async fn retrieve_archive(&self, request: &RetrieveRequest) -> Result<Vec<u8>, RetrievalError> {
        let job = retrieve::begin_retrieve(&self.conn, request).await?;
        retrieve::await_completion(&self.conn, &job, &self.retrieve_poll).await
    }

    async fn deploy(&self, request: DeployRequest) -> Result<DeployOutcome, DeployError> {
        deploy::deploy(&self.conn, request, &self.deploy_poll).await
    }
}
