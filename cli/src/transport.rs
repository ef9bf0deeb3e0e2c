//! Transports to the in-pod agent.
//!
//! Both variants end in the same place: a TLS-secured duplex stream that
//! carries the agent's HTTP/2 traffic. `pod-forward` discovers a free
//! loopback port, launches a `kubectl port-forward` subprocess scoped to
//! the invocation, and dials the loopback endpoint; `api-proxy` dials the
//! API server and routes requests through the pod proxy subresource, so
//! each request's path is rewritten with the proxy prefix.

use anyhow::{bail, Context, Result};
use http::uri::Authority;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::process::{Child, Command};
use tonic::body::BoxBody;
use tracing::debug;

const SETTLE: Duration = Duration::from_secs(2);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransportKind {
    PodForward,
    ApiProxy,
}

impl std::str::FromStr for TransportKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pod-forward" => Ok(Self::PodForward),
            "api-proxy" => Ok(Self::ApiProxy),
            other => bail!(
                "unknown transport {other:?}; supported transports: pod-forward, api-proxy"
            ),
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::PodForward => "pod-forward",
            Self::ApiProxy => "api-proxy",
        })
    }
}

type TlsStream = tokio_rustls::client::TlsStream<TcpStream>;

/// An established TLS stream to the agent plus the request metadata the
/// HTTP/2 layer needs to use it.
pub struct AgentTransport {
    io: TlsStream,
    authority: Authority,
    path_prefix: Option<String>,
    forwarder: Option<Forwarder>,
}

pub async fn establish(
    kind: TransportKind,
    config: &kube::Config,
    namespace: &str,
    pod: &str,
    tls: Arc<rustls::ClientConfig>,
) -> Result<AgentTransport> {
    match kind {
        TransportKind::PodForward => {
            let local_port = free_port().await?;
            let forwarder = Forwarder::spawn(namespace, pod, local_port)?;
            // Give the forwarder a moment to establish the tunnel.
            tokio::time::sleep(SETTLE).await;
            let tcp = TcpStream::connect(("127.0.0.1", local_port))
                .await
                .context("failed to reach the forwarded agent port")?;
            let io = tls_connect(tls, "localhost", tcp).await?;
            let authority = format!("localhost:{local_port}")
                .parse::<Authority>()
                .context("forwarder authority")?;
            Ok(AgentTransport {
                io,
                authority,
                path_prefix: None,
                forwarder: Some(forwarder),
            })
        }
        TransportKind::ApiProxy => {
            debug!(url = %proxy_url(config, namespace, pod), "dialing through the API server proxy");
            let (host, port) = api_server_host(config)?;
            let tcp = TcpStream::connect((host.as_str(), port))
                .await
                .with_context(|| format!("failed to reach the API server at {host}:{port}"))?;
            let io = tls_connect(tls, &host, tcp).await?;
            let authority = format!("{host}:{port}")
                .parse::<Authority>()
                .context("API server authority")?;
            Ok(AgentTransport {
                io,
                authority,
                path_prefix: Some(proxy_path(namespace, pod)),
                forwarder: None,
            })
        }
    }
}

/// The pod proxy URL: `<api-host>/api/v1/namespaces/<ns>/pods/<name>/proxy/`.
pub fn proxy_url(config: &kube::Config, namespace: &str, pod: &str) -> String {
    let host = config.cluster_url.to_string();
    format!(
        "{}{}/",
        host.trim_end_matches('/'),
        proxy_path(namespace, pod)
    )
}

fn proxy_path(namespace: &str, pod: &str) -> String {
    format!("/api/v1/namespaces/{namespace}/pods/{pod}/proxy")
}

fn api_server_host(config: &kube::Config) -> Result<(String, u16)> {
    let uri = &config.cluster_url;
    let host = uri
        .host()
        .context("the cluster URL has no host")?
        .to_string();
    let port = uri
        .port_u16()
        .unwrap_or(if uri.scheme_str() == Some("http") { 80 } else { 443 });
    Ok((host, port))
}

/// Binds an ephemeral loopback port and releases it immediately; the
/// forwarder re-binds it.
async fn free_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .context("unable to find a free loopback port for port-forwarding")?;
    let port = listener
        .local_addr()
        .context("unable to read the bound loopback address")?
        .port();
    drop(listener);
    Ok(port)
}

async fn tls_connect(
    tls: Arc<rustls::ClientConfig>,
    host: &str,
    tcp: TcpStream,
) -> Result<TlsStream> {
    let server_name =
        rustls::ServerName::try_from(host).with_context(|| format!("invalid TLS server name {host:?}"))?;
    tokio_rustls::TlsConnector::from(tls)
        .connect(server_name, tcp)
        .await
        .context("TLS handshake with the agent endpoint failed")
}

/// A `kubectl port-forward` subprocess scoped to one broker invocation.
/// The child is killed on every exit path so the mapping cannot outlive
/// the caller.
#[derive(Debug)]
pub struct Forwarder {
    child: Child,
}

impl Forwarder {
    fn spawn(namespace: &str, pod: &str, local_port: u16) -> Result<Self> {
        let child = Command::new("kubectl")
            .arg("port-forward")
            .arg("--namespace")
            .arg(namespace)
            .arg(format!("pod/{pod}"))
            .arg(format!("{local_port}:{}", crate::AGENT_PORT))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("failed to launch kubectl port-forward; kubectl must be installed and on PATH")?;
        debug!(%namespace, %pod, %local_port, "port-forward subprocess started");
        Ok(Self { child })
    }
}

impl Drop for Forwarder {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

/// An HTTP/2 connection to the agent over the transport's TLS stream.
/// Each request is stamped with the transport's authority, and with the
/// API-proxy path prefix when one applies.
pub struct GrpcHttp {
    tx: hyper::client::conn::SendRequest<BoxBody>,
    authority: Authority,
    path_prefix: Option<String>,
}

impl GrpcHttp {
    /// Performs the HTTP/2 handshake over the transport and splits off the
    /// forwarder so the caller can scope its lifetime.
    pub async fn handshake(transport: AgentTransport) -> Result<(Self, Option<Forwarder>)> {
        let AgentTransport {
            io,
            authority,
            path_prefix,
            forwarder,
        } = transport;
        let (tx, conn) = hyper::client::conn::Builder::new()
            .http2_only(true)
            .handshake(io)
            .await
            .context("HTTP/2 handshake with the agent failed")?;
        tokio::spawn(async move {
            if let Err(error) = conn.await {
                debug!(%error, "agent connection terminated");
            }
        });
        Ok((
            Self {
                tx,
                authority,
                path_prefix,
            },
            forwarder,
        ))
    }
}

impl hyper::service::Service<http::Request<BoxBody>> for GrpcHttp {
    type Response = http::Response<hyper::Body>;
    type Error = hyper::Error;
    type Future = hyper::client::conn::ResponseFuture;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        self.tx.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<BoxBody>) -> Self::Future {
        let (mut parts, body) = req.into_parts();
        let mut uri = parts.uri.into_parts();
        uri.scheme = Some(http::uri::Scheme::HTTPS);
        uri.authority = Some(self.authority.clone());
        if let Some(prefix) = &self.path_prefix {
            let path = uri
                .path_and_query
                .as_ref()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            uri.path_and_query = Some(
                format!("{prefix}{path}")
                    .parse()
                    .expect("prefixed gRPC path must parse"),
            );
        }
        parts.uri = http::Uri::from_parts(uri).expect("rewritten URI must be valid");

        self.tx.call(http::Request::from_parts(parts, body))
    }
}
