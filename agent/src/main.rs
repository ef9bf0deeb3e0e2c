#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use pulsaar_agent::{
    admin,
    audit::AuditEmitter,
    config,
    policy::PathPolicy,
    rate::RateGovernor,
    server::PulsaarAgentService,
    tls::TlsMaterial,
};
use pulsaar_api::pulsaar_agent_server::PulsaarAgentServer;
use std::net::SocketAddr;
use tokio::sync::watch;
use tonic::transport::Server;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[clap(name = "pulsaar-agent", about = "In-pod read-only file access agent")]
struct Args {
    #[clap(long, default_value = "pulsaar=info,warn", env = "PULSAAR_AGENT_LOG")]
    log_level: String,

    #[clap(long, default_value = "0.0.0.0:50051")]
    grpc_addr: SocketAddr,

    #[clap(long, default_value = "0.0.0.0:9990")]
    admin_addr: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        log_level,
        grpc_addr,
        admin_addr,
    } = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // The effective policy is resolved once and is immutable for the
    // lifetime of the process.
    let allowed_roots = config::resolve_allowed_roots().await;
    info!(roots = ?allowed_roots, "resolved allowed roots");
    let policy = PathPolicy::new(&allowed_roots);

    let material = TlsMaterial::from_env()?;
    info!(mutual_tls = material.mutual_tls(), "loaded TLS material");

    let (ready_tx, ready_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(error) = admin::serve(admin_addr, ready_rx).await {
            error!(%error, "admin server failed");
        }
    });

    let service = PulsaarAgentService::new(policy, RateGovernor::default(), AuditEmitter::from_env());
    let server = Server::builder()
        .tls_config(material.server_tls())?
        .add_service(PulsaarAgentServer::new(service));

    let _ = ready_tx.send(true);
    info!(%grpc_addr, "pulsaar agent listening");
    server.serve_with_shutdown(grpc_addr, shutdown()).await?;
    Ok(())
}

async fn shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        Err(_) => {
            let _ = ctrl_c.await;
        }
    }
    info!("shutdown signal received");
}
