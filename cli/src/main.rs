#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pulsaar_api::{Empty, ListRequest, ReadRequest, StatRequest, StreamRequest};
use pulsaar_cli::broker::{AgentSession, Broker, WorkloadRef};
use pulsaar_cli::transport::TransportKind;
use std::io::Write;

#[derive(Debug, Parser)]
#[clap(
    name = "pulsaar",
    about = "Safe, audited, read-only file access inside cluster workloads"
)]
struct Cli {
    #[clap(long, default_value = "pulsaar=warn", env = "PULSAAR_LOG")]
    log_level: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List files in a workload directory.
    Explore {
        #[clap(flatten)]
        target: Target,
        /// Directory to list.
        #[clap(long, default_value = "/")]
        path: String,
    },
    /// Read file contents from a workload.
    Read {
        #[clap(flatten)]
        target: Target,
        /// File to read.
        #[clap(long)]
        path: String,
        /// Byte offset to start reading from.
        #[clap(long, default_value_t = 0)]
        offset: i64,
        /// Bytes to read; zero reads up to the 1 MiB maximum.
        #[clap(long, default_value_t = 0)]
        length: i64,
    },
    /// Stream file contents from a workload.
    Stream {
        #[clap(flatten)]
        target: Target,
        /// File to stream.
        #[clap(long)]
        path: String,
        /// Chunk size in bytes; zero uses the 64 KiB default.
        #[clap(long, default_value_t = 64 * 1024)]
        chunk_size: i64,
    },
    /// Show file or directory metadata from a workload.
    Stat {
        #[clap(flatten)]
        target: Target,
        /// Path to inspect.
        #[clap(long)]
        path: String,
    },
    /// Check the health of a workload's agent.
    Health {
        #[clap(flatten)]
        target: Target,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Args)]
struct Target {
    /// Pod name.
    #[clap(long)]
    pod: String,

    /// Pod namespace.
    #[clap(long, default_value = "default")]
    namespace: String,

    /// How to reach the agent: pod-forward or api-proxy.
    #[clap(long, default_value = "pod-forward")]
    transport: TransportKind,
}

impl Target {
    fn workload(&self) -> WorkloadRef {
        WorkloadRef {
            namespace: self.namespace.clone(),
            name: self.pod.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { log_level, command } = Cli::parse();

    // File contents go to stdout; keep diagnostics on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match command {
        Command::Explore { target, path } => explore(target, path).await,
        Command::Read {
            target,
            path,
            offset,
            length,
        } => read(target, path, offset, length).await,
        Command::Stream {
            target,
            path,
            chunk_size,
        } => stream(target, path, chunk_size).await,
        Command::Stat { target, path } => stat(target, path).await,
        Command::Health { target } => health(target).await,
        Command::Version => {
            println!("Version: {}", pulsaar_cli::VERSION);
            println!("Commit: {}", pulsaar_cli::build_commit());
            println!("Date: {}", pulsaar_cli::build_date());
            Ok(())
        }
    }
}

async fn connect(target: &Target) -> Result<AgentSession> {
    let broker = Broker::new().await?;
    broker.connect(&target.workload(), target.transport).await
}

async fn explore(target: Target, path: String) -> Result<()> {
    let mut session = connect(&target).await?;
    let rsp = session
        .client
        .list(ListRequest {
            path: path.clone(),
            allowed_roots: Vec::new(),
        })
        .await
        .with_context(|| format!("failed to list {path:?} in pod {}", target.workload()))?
        .into_inner();

    for entry in rsp.entries {
        println!(
            "{} {} {} {}",
            entry.mode,
            entry.name,
            entry.size_bytes,
            format_mtime(entry.mtime.as_ref()),
        );
    }
    Ok(())
}

async fn read(target: Target, path: String, offset: i64, length: i64) -> Result<()> {
    let mut session = connect(&target).await?;
    let rsp = session
        .client
        .read(ReadRequest {
            path: path.clone(),
            offset,
            length,
            allowed_roots: Vec::new(),
        })
        .await
        .with_context(|| format!("failed to read {path:?} in pod {}", target.workload()))?
        .into_inner();

    if looks_binary(&rsp.data) {
        eprintln!("Warning: this file appears to be binary; output may be corrupted.");
    }
    let mut stdout = std::io::stdout();
    stdout.write_all(&rsp.data)?;
    stdout.flush()?;
    if !rsp.eof {
        println!();
        println!("... (file truncated)");
    }
    Ok(())
}

async fn stream(target: Target, path: String, chunk_size: i64) -> Result<()> {
    let mut session = connect(&target).await?;
    let mut stream = session
        .client
        .stream(StreamRequest {
            path: path.clone(),
            chunk_size,
            allowed_roots: Vec::new(),
        })
        .await
        .with_context(|| format!("failed to stream {path:?} in pod {}", target.workload()))?
        .into_inner();

    let mut warned = false;
    let mut stdout = std::io::stdout();
    while let Some(rsp) = stream
        .message()
        .await
        .with_context(|| format!("error while streaming {path:?}"))?
    {
        if !warned && looks_binary(&rsp.data) {
            eprintln!("Warning: this file appears to be binary; output may be corrupted.");
            warned = true;
        }
        stdout.write_all(&rsp.data)?;
    }
    stdout.flush()?;
    Ok(())
}

async fn stat(target: Target, path: String) -> Result<()> {
    let mut session = connect(&target).await?;
    let rsp = session
        .client
        .stat(StatRequest {
            path: path.clone(),
            allowed_roots: Vec::new(),
        })
        .await
        .with_context(|| format!("failed to stat {path:?} in pod {}", target.workload()))?
        .into_inner();

    let info = rsp.info.context("the agent returned no file info")?;
    println!("Name: {}", info.name);
    println!("IsDir: {}", info.is_dir);
    println!("Size: {} bytes", info.size_bytes);
    println!("Mode: {}", info.mode);
    println!("Modified: {}", format_mtime(info.mtime.as_ref()));
    Ok(())
}

async fn health(target: Target) -> Result<()> {
    let mut session = connect(&target).await?;
    let rsp = session
        .client
        .health(Empty {})
        .await
        .with_context(|| format!("failed to check agent health in pod {}", target.workload()))?
        .into_inner();

    println!("Ready: {}", rsp.ready);
    println!("Version: {}", rsp.version);
    println!("Status: {}", rsp.status_message);
    println!("Commit: {}", rsp.commit);
    println!("Date: {}", rsp.date);
    Ok(())
}

fn format_mtime(mtime: Option<&prost_types::Timestamp>) -> String {
    mtime
        .and_then(|ts| chrono::DateTime::from_timestamp(ts.seconds, ts.nanos.max(0) as u32))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// More than 5% of bytes outside the printable ASCII range (tab, LF, and
/// CR excepted) marks the content as binary.
fn looks_binary(data: &[u8]) -> bool {
    if data.is_empty() {
        return false;
    }
    let non_printable = data
        .iter()
        .filter(|&&b| (b < 32 && b != 9 && b != 10 && b != 13) || b > 126)
        .count();
    non_printable as f64 / data.len() as f64 > 0.05
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_not_binary() {
        assert!(!looks_binary(b""));
        assert!(!looks_binary(b"plain text with\ttabs\nand newlines\r\n"));
        assert!(!looks_binary("line one\nline two\n".as_bytes()));
    }

    #[test]
    fn high_bit_content_is_binary() {
        assert!(looks_binary(&[0u8, 1, 2, 3, 255, 254, 0, 128]));
        let mut mostly_text = b"text".to_vec();
        mostly_text.push(0);
        assert!(looks_binary(&mostly_text), "1 of 5 bytes is non-printable");
    }

    #[test]
    fn mtime_renders_or_degrades() {
        let ts = prost_types::Timestamp {
            seconds: 0,
            nanos: 0,
        };
        assert_eq!(format_mtime(Some(&ts)), "1970-01-01 00:00:00");
        assert_eq!(format_mtime(None), "unknown");
    }

    #[test]
    fn cli_parses_its_commands() {
        let cli = Cli::try_parse_from(["pulsaar", "explore", "--pod", "web-0"]).expect("explore");
        match cli.command {
            Command::Explore { target, path } => {
                assert_eq!(target.pod, "web-0");
                assert_eq!(target.namespace, "default");
                assert_eq!(target.transport, TransportKind::PodForward);
                assert_eq!(path, "/");
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from([
            "pulsaar",
            "read",
            "--pod",
            "web-0",
            "--namespace",
            "prod",
            "--path",
            "/etc/hostname",
            "--transport",
            "api-proxy",
        ])
        .expect("read");
        match cli.command {
            Command::Read { target, path, .. } => {
                assert_eq!(target.namespace, "prod");
                assert_eq!(target.transport, TransportKind::ApiProxy);
                assert_eq!(path, "/etc/hostname");
            }
            other => panic!("unexpected command {other:?}"),
        }

        Cli::try_parse_from(["pulsaar", "read", "--pod", "web-0"])
            .expect_err("read requires --path");
        Cli::try_parse_from([
            "pulsaar",
            "health",
            "--pod",
            "web-0",
            "--transport",
            "teleport",
        ])
        .expect_err("unknown transport");
    }
}
