//! The agent RPC service.
//!
//! Every file operation passes through the rate governor, emits its audit
//! record, and is checked against the path policy before the filesystem is
//! touched. Filesystem errors surface as `NotFound` or `Internal`, never as
//! `PermissionDenied`, so a bug cannot masquerade as policy.

use crate::audit::{AuditEmitter, Operation};
use crate::policy::PathPolicy;
use crate::rate::RateGovernor;
use futures::Stream;
use pulsaar_api::pulsaar_agent_server::PulsaarAgent;
use pulsaar_api::{
    Empty, FileInfo, HealthResponse, ListRequest, ListResponse, ReadRequest, ReadResponse,
    StatRequest, StatResponse, StreamRequest,
};
use std::io::SeekFrom;
use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::pin::Pin;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tonic::{Request, Response, Status};

pub const MAX_READ_SIZE: i64 = 1024 * 1024;
pub const DEFAULT_CHUNK_SIZE: i64 = 64 * 1024;

pub struct PulsaarAgentService {
    policy: PathPolicy,
    governor: RateGovernor,
    audit: AuditEmitter,
}

// === impl PulsaarAgentService ===

impl PulsaarAgentService {
    pub fn new(policy: PathPolicy, governor: RateGovernor, audit: AuditEmitter) -> Self {
        Self {
            policy,
            governor,
            audit,
        }
    }

    /// Takes a rate token for the peer. Requests with no associated peer
    /// are unlimited.
    fn throttle(&self, peer: Option<SocketAddr>) -> Result<(), Status> {
        let Some(addr) = peer else {
            return Ok(());
        };
        if self.governor.allow(&addr.ip().to_string()) {
            Ok(())
        } else {
            Err(Status::resource_exhausted(
                "rate limit exceeded; wait before retrying",
            ))
        }
    }

    /// Admits `path` against the request override when one is present, or
    /// the agent's effective policy otherwise. The override is currently
    /// authoritative; intersecting it with the effective policy is the
    /// hardening path.
    fn check_path(&self, path: &str, override_roots: &[String]) -> Result<(), Status> {
        let narrowed;
        let policy = if override_roots.is_empty() {
            &self.policy
        } else {
            narrowed = PathPolicy::new(override_roots);
            &narrowed
        };
        if policy.admit(path) {
            Ok(())
        } else {
            Err(Status::permission_denied(format!(
                "access to path {:?} is not allowed (allowed roots: {:?})",
                path,
                policy.roots(),
            )))
        }
    }
}

#[tonic::async_trait]
impl PulsaarAgent for PulsaarAgentService {
    async fn list(
        &self,
        req: Request<ListRequest>,
    ) -> Result<Response<ListResponse>, Status> {
        self.throttle(req.remote_addr())?;
        let ListRequest {
            path,
            allowed_roots,
        } = req.into_inner();
        self.audit.record(Operation::List, &path);
        self.check_path(&path, &allowed_roots)?;

        let mut dir = fs::read_dir(&path)
            .await
            .map_err(|e| io_status("unable to list directory", &path, e))?;
        let mut entries = Vec::new();
        loop {
            let entry = dir
                .next_entry()
                .await
                .map_err(|e| io_status("unable to list directory", &path, e))?;
            let Some(entry) = entry else { break };
            // Entries whose metadata cannot be read are skipped.
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(file_info(name, &meta));
        }
        Ok(Response::new(ListResponse { entries }))
    }

    async fn stat(&self, req: Request<StatRequest>) -> Result<Response<StatResponse>, Status> {
        self.throttle(req.remote_addr())?;
        let StatRequest {
            path,
            allowed_roots,
        } = req.into_inner();
        self.audit.record(Operation::Stat, &path);
        self.check_path(&path, &allowed_roots)?;

        let meta = fs::symlink_metadata(&path)
            .await
            .map_err(|e| io_status("unable to stat path", &path, e))?;
        let name = std::path::Path::new(&path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string());
        Ok(Response::new(StatResponse {
            info: Some(file_info(name, &meta)),
        }))
    }

    async fn read(&self, req: Request<ReadRequest>) -> Result<Response<ReadResponse>, Status> {
        self.throttle(req.remote_addr())?;
        let ReadRequest {
            path,
            offset,
            length,
            allowed_roots,
        } = req.into_inner();
        self.audit.record(Operation::Read, &path);
        self.check_path(&path, &allowed_roots)?;

        if offset < 0 {
            return Err(Status::invalid_argument("read offset must not be negative"));
        }
        let length = if length == 0 { MAX_READ_SIZE } else { length };
        if length < 0 {
            return Err(Status::invalid_argument("read length must not be negative"));
        }
        if length > MAX_READ_SIZE {
            return Err(Status::invalid_argument(format!(
                "requested read length ({length} bytes) exceeds the maximum of {MAX_READ_SIZE} bytes",
            )));
        }

        let mut file = fs::File::open(&path)
            .await
            .map_err(|e| io_status("unable to open file", &path, e))?;
        file.seek(SeekFrom::Start(offset as u64))
            .await
            .map_err(|e| io_status("unable to read file", &path, e))?;

        // Read one byte past the requested length so an exact-length read
        // that exhausts the file still reports eof.
        let want = length as usize;
        let mut data = read_up_to(&mut file, want + 1, &path).await?;
        let eof = data.len() <= want;
        data.truncate(want.min(data.len()));
        Ok(Response::new(ReadResponse { data, eof }))
    }

    type StreamStream = Pin<Box<dyn Stream<Item = Result<ReadResponse, Status>> + Send>>;

    async fn stream(
        &self,
        req: Request<StreamRequest>,
    ) -> Result<Response<Self::StreamStream>, Status> {
        self.throttle(req.remote_addr())?;
        let StreamRequest {
            path,
            chunk_size,
            allowed_roots,
        } = req.into_inner();
        self.audit.record(Operation::Stream, &path);
        self.check_path(&path, &allowed_roots)?;

        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        if chunk_size < 0 {
            return Err(Status::invalid_argument("chunk size must not be negative"));
        }
        if chunk_size > MAX_READ_SIZE {
            return Err(Status::invalid_argument(format!(
                "requested chunk size ({chunk_size} bytes) exceeds the maximum of {MAX_READ_SIZE} bytes",
            )));
        }
        let chunk = chunk_size as usize;

        let mut file = fs::File::open(&path)
            .await
            .map_err(|e| io_status("unable to open file", &path, e))?;

        // One chunk of readahead so the terminal message always carries
        // eof=true. Dropping the stream on caller cancellation drops the
        // file handle with it.
        let stream = async_stream::try_stream! {
            let mut cur = read_up_to(&mut file, chunk, &path).await?;
            while !cur.is_empty() {
                if cur.len() < chunk {
                    yield ReadResponse { data: cur, eof: true };
                    break;
                }
                let next = read_up_to(&mut file, chunk, &path).await?;
                let eof = next.is_empty();
                yield ReadResponse { data: cur, eof };
                if eof {
                    break;
                }
                cur = next;
            }
        };
        Ok(Response::new(Box::pin(stream)))
    }

    async fn health(&self, _req: Request<Empty>) -> Result<Response<HealthResponse>, Status> {
        Ok(Response::new(HealthResponse {
            ready: true,
            version: crate::VERSION.to_string(),
            status_message: "agent ready".to_string(),
            commit: crate::build_commit().to_string(),
            date: crate::build_date().to_string(),
        }))
    }
}

/// Reads up to `limit` bytes, stopping early only at end of file.
async fn read_up_to(file: &mut fs::File, limit: usize, path: &str) -> Result<Vec<u8>, Status> {
    let mut buf = vec![0u8; limit];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file
            .read(&mut buf[filled..])
            .await
            .map_err(|e| io_status("unable to read file", path, e))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

fn io_status(context: &str, path: &str, error: std::io::Error) -> Status {
    if error.kind() == std::io::ErrorKind::NotFound {
        Status::not_found(format!("{context} {path:?}: {error}"))
    } else {
        Status::internal(format!("{context} {path:?}: {error}"))
    }
}

fn file_info(name: String, meta: &std::fs::Metadata) -> FileInfo {
    FileInfo {
        name,
        is_dir: meta.is_dir(),
        size_bytes: meta.len() as i64,
        mode: mode_string(meta),
        mtime: meta.modified().ok().map(prost_types::Timestamp::from),
    }
}

fn mode_string(meta: &std::fs::Metadata) -> String {
    let file_type = meta.file_type();
    let kind = if file_type.is_dir() {
        'd'
    } else if file_type.is_symlink() {
        'l'
    } else {
        '-'
    };
    let mode = meta.permissions().mode();
    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(test)]
mod tests;
