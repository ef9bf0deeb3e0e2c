//! The access broker.
//!
//! One invocation composes the whole caller-side pipeline: identity gate,
//! agent attachment, transport, RPC client. Each step surfaces a single
//! actionable error; nothing is retried here, and dropping the session
//! releases the transport and any forwarding subprocess.

use crate::transport::{self, Forwarder, GrpcHttp, TransportKind};
use crate::{attach, identity, tls};
use anyhow::{Context, Result};
use pulsaar_api::pulsaar_agent_client::PulsaarAgentClient;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct WorkloadRef {
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

pub struct Broker {
    client: kube::Client,
    config: kube::Config,
}

impl Broker {
    pub async fn new() -> Result<Self> {
        let config = kube::Config::infer().await.context(
            "unable to connect to the cluster; check kubeconfig or the in-cluster environment",
        )?;
        let client =
            kube::Client::try_from(config.clone()).context("failed to build a cluster client")?;
        Ok(Self { client, config })
    }

    pub async fn connect(
        &self,
        workload: &WorkloadRef,
        kind: TransportKind,
    ) -> Result<AgentSession> {
        identity::authorize(
            &self.client,
            &self.config,
            &workload.namespace,
            &workload.name,
        )
        .await?;

        let image = std::env::var(attach::AGENT_IMAGE_ENV)
            .ok()
            .filter(|image| !image.is_empty())
            .unwrap_or_else(|| attach::DEFAULT_AGENT_IMAGE.to_string());
        attach::ensure_agent(&self.client, &workload.namespace, &workload.name, &image)
            .await
            .with_context(|| format!("failed to attach the agent to {workload}"))?;

        let tls = Arc::new(tls::client_config().context(
            "failed to build the client TLS configuration; check PULSAAR_CLIENT_CERT_FILE, \
             PULSAAR_CLIENT_KEY_FILE, and PULSAAR_CA_FILE",
        )?);
        let transport = transport::establish(
            kind,
            &self.config,
            &workload.namespace,
            &workload.name,
            tls,
        )
        .await
        .with_context(|| format!("failed to establish a {kind} transport to {workload}"))?;
        AgentSession::handshake(transport).await
    }
}

/// A live connection to one agent. Dropping the session releases the
/// HTTP/2 connection and then the forwarding subprocess, in that order.
pub struct AgentSession {
    pub client: PulsaarAgentClient<GrpcHttp>,
    _forwarder: Option<Forwarder>,
}

impl AgentSession {
    async fn handshake(transport: transport::AgentTransport) -> Result<Self> {
        let (http, forwarder) = GrpcHttp::handshake(transport).await?;
        Ok(Self {
            client: PulsaarAgentClient::new(http),
            _forwarder: forwarder,
        })
    }
}
