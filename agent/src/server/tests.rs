use super::*;
use tokio_stream::StreamExt;
use tonic::Code;

fn service(roots: &[&str]) -> PulsaarAgentService {
    PulsaarAgentService::new(
        PathPolicy::new(roots),
        RateGovernor::default(),
        AuditEmitter::new("test-agent".to_string(), None),
    )
}

fn tempdir_with(files: &[(&str, &[u8])]) -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    for (name, contents) in files {
        std::fs::write(dir.path().join(name), contents).expect("write fixture");
    }
    let root = dir.path().to_str().expect("utf-8 path").to_string();
    (dir, root)
}

#[tokio::test]
async fn lists_directory_entries() {
    let (_dir, root) = tempdir_with(&[("file1.txt", b"12345678"), ("file2.txt", b"abcdefgh")]);
    let svc = service(&["/"]);

    let rsp = svc
        .list(Request::new(ListRequest {
            path: root.clone(),
            allowed_roots: vec![root],
        }))
        .await
        .expect("list")
        .into_inner();

    let mut entries = rsp.entries;
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "file1.txt");
    assert_eq!(entries[1].name, "file2.txt");
    for entry in &entries {
        assert!(!entry.is_dir);
        assert_eq!(entry.size_bytes, 8);
        assert!(entry.mtime.is_some());
        assert!(entry.mode.starts_with('-'));
    }
}

#[tokio::test]
async fn list_of_missing_directory_is_not_found() {
    let svc = service(&["/"]);
    let status = svc
        .list(Request::new(ListRequest {
            path: "/no/such/directory".to_string(),
            allowed_roots: Vec::new(),
        }))
        .await
        .expect_err("missing directory");
    assert_eq!(status.code(), Code::NotFound);
}

#[tokio::test]
async fn reads_whole_file_with_zero_length() {
    let contents = b"Hello, this is test content for reading.";
    let (_dir, root) = tempdir_with(&[("test.txt", contents)]);
    let svc = service(&["/"]);

    let rsp = svc
        .read(Request::new(ReadRequest {
            path: format!("{root}/test.txt"),
            offset: 0,
            length: 0,
            allowed_roots: vec![root],
        }))
        .await
        .expect("read")
        .into_inner();

    assert_eq!(rsp.data, contents);
    assert!(rsp.eof);
}

#[tokio::test]
async fn read_honors_offset_and_length() {
    let (_dir, root) = tempdir_with(&[("f", b"abcdef")]);
    let svc = service(&["/"]);
    let path = format!("{root}/f");

    let rsp = svc
        .read(Request::new(ReadRequest {
            path: path.clone(),
            offset: 2,
            length: 2,
            allowed_roots: Vec::new(),
        }))
        .await
        .expect("read")
        .into_inner();
    assert_eq!(rsp.data, b"cd");
    assert!(!rsp.eof, "two more bytes remain");

    // A read that runs past the end is short and reports eof.
    let rsp = svc
        .read(Request::new(ReadRequest {
            path: path.clone(),
            offset: 4,
            length: 10,
            allowed_roots: Vec::new(),
        }))
        .await
        .expect("read")
        .into_inner();
    assert_eq!(rsp.data, b"ef");
    assert!(rsp.eof);

    // An exact-length read that exhausts the file also reports eof.
    let rsp = svc
        .read(Request::new(ReadRequest {
            path,
            offset: 0,
            length: 6,
            allowed_roots: Vec::new(),
        }))
        .await
        .expect("read")
        .into_inner();
    assert_eq!(rsp.data, b"abcdef");
    assert!(rsp.eof);
}

#[tokio::test]
async fn oversized_read_length_is_rejected() {
    let (_dir, root) = tempdir_with(&[("f", b"x")]);
    let svc = service(&["/"]);

    let status = svc
        .read(Request::new(ReadRequest {
            path: format!("{root}/f"),
            offset: 0,
            length: MAX_READ_SIZE + 1,
            allowed_roots: Vec::new(),
        }))
        .await
        .expect_err("oversized length");
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn read_outside_allowed_roots_is_denied() {
    let svc = service(&["/app"]);
    let status = svc
        .read(Request::new(ReadRequest {
            path: "/etc/shadow".to_string(),
            offset: 0,
            length: 0,
            allowed_roots: Vec::new(),
        }))
        .await
        .expect_err("denied");
    assert_eq!(status.code(), Code::PermissionDenied);
}

#[tokio::test]
async fn request_override_narrows_the_allow_set() {
    let svc = service(&["/"]);
    let status = svc
        .read(Request::new(ReadRequest {
            path: "/etc/shadow".to_string(),
            offset: 0,
            length: 0,
            allowed_roots: vec!["/app".to_string()],
        }))
        .await
        .expect_err("denied by override");
    assert_eq!(status.code(), Code::PermissionDenied);
}

#[tokio::test]
async fn traversal_out_of_an_allowed_root_is_denied() {
    let svc = service(&["/a"]);
    let status = svc
        .stat(Request::new(StatRequest {
            path: "/a/../etc/passwd".to_string(),
            allowed_roots: Vec::new(),
        }))
        .await
        .expect_err("denied");
    assert_eq!(status.code(), Code::PermissionDenied);
}

#[tokio::test]
async fn empty_path_is_denied() {
    let svc = service(&["/"]);
    let status = svc
        .list(Request::new(ListRequest {
            path: String::new(),
            allowed_roots: Vec::new(),
        }))
        .await
        .expect_err("denied");
    assert_eq!(status.code(), Code::PermissionDenied);
}

#[tokio::test]
async fn stats_a_file() {
    let (_dir, root) = tempdir_with(&[("stat.txt", b"stat content")]);
    let svc = service(&["/"]);

    let rsp = svc
        .stat(Request::new(StatRequest {
            path: format!("{root}/stat.txt"),
            allowed_roots: vec![root],
        }))
        .await
        .expect("stat")
        .into_inner();

    let info = rsp.info.expect("info");
    assert_eq!(info.name, "stat.txt");
    assert!(!info.is_dir);
    assert_eq!(info.size_bytes, 12);
    assert!(info.mtime.is_some());
}

#[tokio::test]
async fn stat_of_a_directory_reports_is_dir() {
    let (_dir, root) = tempdir_with(&[]);
    let svc = service(&["/"]);

    let rsp = svc
        .stat(Request::new(StatRequest {
            path: root.clone(),
            allowed_roots: Vec::new(),
        }))
        .await
        .expect("stat")
        .into_inner();
    let info = rsp.info.expect("info");
    assert!(info.is_dir);
    assert!(info.mode.starts_with('d'));
}

async fn collect(
    stream: <PulsaarAgentService as PulsaarAgent>::StreamStream,
) -> Vec<ReadResponse> {
    let mut stream = stream;
    let mut out = Vec::new();
    while let Some(rsp) = stream.next().await {
        out.push(rsp.expect("stream response"));
    }
    out
}

#[tokio::test]
async fn stream_smaller_than_one_chunk_is_a_single_eof_response() {
    let mut contents = b"Hello, this is test content for streaming. ".to_vec();
    for _ in 0..100 {
        contents.extend_from_slice(b"More content. ");
    }
    let (_dir, root) = tempdir_with(&[("stream.txt", &contents)]);
    let svc = service(&["/"]);

    let stream = svc
        .stream(Request::new(StreamRequest {
            path: format!("{root}/stream.txt"),
            chunk_size: 65536,
            allowed_roots: vec![root],
        }))
        .await
        .expect("stream")
        .into_inner();

    let responses = collect(stream).await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].data, contents);
    assert!(responses[0].eof);
}

#[tokio::test]
async fn stream_concatenation_reproduces_the_file() {
    let contents: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    let (_dir, root) = tempdir_with(&[("big", &contents)]);
    let svc = service(&["/"]);

    let stream = svc
        .stream(Request::new(StreamRequest {
            path: format!("{root}/big"),
            chunk_size: 4096,
            allowed_roots: Vec::new(),
        }))
        .await
        .expect("stream")
        .into_inner();

    let responses = collect(stream).await;
    assert_eq!(responses.len(), 3);
    let joined: Vec<u8> = responses.iter().flat_map(|r| r.data.clone()).collect();
    assert_eq!(joined, contents);
    assert!(responses.last().expect("nonempty").eof);
    assert!(responses[..responses.len() - 1].iter().all(|r| !r.eof));
}

#[tokio::test]
async fn stream_of_exact_chunk_multiple_still_ends_with_eof() {
    let contents = vec![7u8; 8192];
    let (_dir, root) = tempdir_with(&[("exact", &contents)]);
    let svc = service(&["/"]);

    let stream = svc
        .stream(Request::new(StreamRequest {
            path: format!("{root}/exact"),
            chunk_size: 4096,
            allowed_roots: Vec::new(),
        }))
        .await
        .expect("stream")
        .into_inner();

    let responses = collect(stream).await;
    assert_eq!(responses.len(), 2);
    assert!(responses[1].eof);
}

#[tokio::test]
async fn stream_default_chunk_is_64k() {
    let contents = vec![1u8; DEFAULT_CHUNK_SIZE as usize + 1];
    let (_dir, root) = tempdir_with(&[("over", &contents)]);
    let svc = service(&["/"]);

    let stream = svc
        .stream(Request::new(StreamRequest {
            path: format!("{root}/over"),
            chunk_size: 0,
            allowed_roots: Vec::new(),
        }))
        .await
        .expect("stream")
        .into_inner();

    let responses = collect(stream).await;
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].data.len(), DEFAULT_CHUNK_SIZE as usize);
    assert_eq!(responses[1].data.len(), 1);
}

#[tokio::test]
async fn oversized_chunk_size_is_rejected() {
    let (_dir, root) = tempdir_with(&[("f", b"x")]);
    let svc = service(&["/"]);

    let result = svc
        .stream(Request::new(StreamRequest {
            path: format!("{root}/f"),
            chunk_size: MAX_READ_SIZE + 1,
            allowed_roots: Vec::new(),
        }))
        .await;
    let status = match result {
        Err(e) => e,
        Ok(_) => panic!("oversized chunk"),
    };
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn health_reports_ready_without_rate_tokens() {
    let svc = PulsaarAgentService::new(
        PathPolicy::new(["/"]),
        RateGovernor::new(1.0, 1.0),
        AuditEmitter::new("test-agent".to_string(), None),
    );
    for _ in 0..5 {
        let rsp = svc
            .health(Request::new(Empty {}))
            .await
            .expect("health")
            .into_inner();
        assert!(rsp.ready);
        assert_eq!(rsp.version, crate::VERSION);
        assert_eq!(rsp.status_message, "agent ready");
    }
}

#[tokio::test]
async fn throttle_exhausts_per_peer() {
    let svc = PulsaarAgentService::new(
        PathPolicy::new(["/"]),
        RateGovernor::new(1.0, 1.0),
        AuditEmitter::new("test-agent".to_string(), None),
    );
    let peer: SocketAddr = "127.0.0.1:40000".parse().expect("addr");
    svc.throttle(Some(peer)).expect("first request");
    let status = svc.throttle(Some(peer)).expect_err("second request");
    assert_eq!(status.code(), Code::ResourceExhausted);

    // Requests without a peer are unlimited.
    svc.throttle(None).expect("no peer");
    svc.throttle(None).expect("no peer");
}

#[test]
fn mode_string_renders_unix_permissions() {
    let file = tempfile::NamedTempFile::new().expect("tempfile");
    let mut perms = file.as_file().metadata().expect("meta").permissions();
    perms.set_mode(0o640);
    file.as_file().set_permissions(perms).expect("chmod");
    let meta = file.as_file().metadata().expect("meta");
    assert_eq!(mode_string(&meta), "-rw-r-----");
}
