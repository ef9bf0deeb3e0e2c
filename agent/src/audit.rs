//! Audit emission for file-access operations.
//!
//! Every operation writes one structured line to the local log before any
//! filesystem access for that request. When an aggregator URL is configured
//! the record is additionally POSTed as JSON in the background; delivery
//! failures are logged and swallowed so the aggregator can never fail an
//! RPC.

use chrono::{SecondsFormat, Utc};
use hyper::{client::HttpConnector, Body, Client, Method, Request, Uri};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::warn;

pub const AGGREGATOR_URL_ENV: &str = "PULSAAR_AUDIT_AGGREGATOR_URL";

const AGGREGATOR_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    List,
    Stat,
    Read,
    Stream,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::List => "LIST",
            Operation::Stat => "STAT",
            Operation::Read => "READ",
            Operation::Stream => "STREAM",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
struct AuditRecord {
    timestamp: String,
    operation: &'static str,
    path: String,
    agent_id: String,
}

#[derive(Clone, Debug)]
pub struct AuditEmitter {
    agent_id: String,
    aggregator: Option<Uri>,
    http: Client<HttpConnector>,
}

impl AuditEmitter {
    pub fn from_env() -> Self {
        let aggregator = std::env::var(AGGREGATOR_URL_ENV)
            .ok()
            .filter(|url| !url.is_empty())
            .and_then(|url| match url.parse::<Uri>() {
                Ok(uri) => Some(uri),
                Err(error) => {
                    warn!(%error, %url, "ignoring unparseable audit aggregator URL");
                    None
                }
            });
        Self::new(agent_id(), aggregator)
    }

    pub fn new(agent_id: String, aggregator: Option<Uri>) -> Self {
        Self {
            agent_id,
            aggregator,
            http: Client::new(),
        }
    }

    /// Emits the local audit line synchronously and fans the record out to
    /// the aggregator in the background.
    pub fn record(&self, operation: Operation, path: &str) {
        tracing::info!(target: "audit", %operation, path, "audit");

        let Some(uri) = self.aggregator.clone() else {
            return;
        };
        let record = AuditRecord {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            operation: operation.as_str(),
            path: path.to_string(),
            agent_id: self.agent_id.clone(),
        };
        let http = self.http.clone();
        tokio::spawn(async move {
            if let Err(error) = deliver(http, uri, record).await {
                warn!(%error, "failed to deliver audit record to aggregator");
            }
        });
    }
}

async fn deliver(
    http: Client<HttpConnector>,
    uri: Uri,
    record: AuditRecord,
) -> anyhow::Result<()> {
    let body = serde_json::to_vec(&record)?;
    let req = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))?;
    let rsp = tokio::time::timeout(AGGREGATOR_TIMEOUT, http.request(req)).await??;
    anyhow::ensure!(rsp.status().is_success(), "aggregator returned {}", rsp.status());
    Ok(())
}

fn agent_id() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}
