//! Smart HTTP client and clone tests against a mock server.
//!
//! The client is blocking, so each call runs on a blocking thread while the
//! mock server keeps serving on the runtime.

use knit_git::{
    build_want_request, clone_repository, ClientConfig, GitError, PackBuilder, PktLine,
    RefRecord, SmartHttpClient,
};
use knit_storage::{
    CommitBuilder, FileMode, GitObject, ObjectId, RefStore, Signature, Tree, TreeEntry,
};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADVERTISEMENT: &str = "application/x-git-upload-pack-advertisement";
const RESULT: &str = "application/x-git-upload-pack-result";

async fn blocking<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap()
}

fn client() -> SmartHttpClient {
    SmartHttpClient::new(&ClientConfig::default()).unwrap()
}

/// Encodes an advertisement the way a smart server sends it.
fn advertisement_body(refs: &[(ObjectId, &str)], capabilities: &str) -> Vec<u8> {
    let mut body = PktLine::line("# service=git-upload-pack\n").encode();
    body.extend(PktLine::Flush.encode());
    for (i, (id, name)) in refs.iter().enumerate() {
        let line = if i == 0 {
            format!("{id} {name}\0{capabilities}\n")
        } else {
            format!("{id} {name}\n")
        };
        body.extend(PktLine::from_bytes(line.into_bytes()).encode());
    }
    body.extend(PktLine::Flush.encode());
    body
}

async fn mount_refs(server: &MockServer, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path("/repo.git/info/refs"))
        .and(query_param("service", "git-upload-pack"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, ADVERTISEMENT))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_discover_refs() {
    let server = MockServer::start().await;
    let main = ObjectId::from_bytes([0xaa; 20]);
    let tag = ObjectId::from_bytes([0xbb; 20]);
    mount_refs(
        &server,
        advertisement_body(
            &[(main, "HEAD"), (main, "refs/heads/main"), (tag, "refs/tags/v1")],
            "multi_ack side-band-64k symref=HEAD:refs/heads/main",
        ),
    )
    .await;

    let url = format!("{}/repo.git/", server.uri());
    let adv = blocking(move || client().discover_refs(&url)).await.unwrap();

    assert_eq!(adv.refs.len(), 3);
    assert_eq!(adv.head().map(|r| r.id), Some(main));
    assert_eq!(adv.head_symref(), Some("refs/heads/main"));
    assert!(adv.has_capability("side-band-64k"));
    assert_eq!(adv.refs[2], RefRecord::new(tag, "refs/tags/v1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dumb_server_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repo.git/info/refs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("ref list", "text/plain"))
        .mount(&server)
        .await;

    let url = format!("{}/repo.git", server.uri());
    let result = blocking(move || client().fetch_refs(&url)).await;
    assert!(matches!(result, Err(GitError::Protocol(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_not_found_is_a_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/missing.git", server.uri());
    let err = blocking(move || client().fetch_refs(&url)).await.unwrap_err();
    assert!(matches!(err, GitError::Protocol(_)));
    assert!(!err.is_retryable());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let url = format!("{}/repo.git", server.uri());
    let err = blocking(move || {
        let config = ClientConfig {
            timeout: Duration::from_millis(200),
            ..ClientConfig::default()
        };
        SmartHttpClient::new(&config).unwrap().fetch_refs(&url)
    })
    .await
    .unwrap_err();
    assert!(matches!(err, GitError::Network(_)));
    assert!(err.is_retryable());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_negotiate_posts_want_request() {
    let server = MockServer::start().await;
    let refs = vec![
        RefRecord::new(ObjectId::from_bytes([1; 20]), "refs/heads/main"),
        RefRecord::new(ObjectId::from_bytes([2; 20]), "refs/heads/dev"),
    ];

    Mock::given(method("POST"))
        .and(path("/repo.git/git-upload-pack"))
        .and(header("content-type", "application/x-git-upload-pack-request"))
        .and(body_bytes(build_want_request(&refs)))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"0008NAK\nPACK".to_vec(), RESULT))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/repo.git", server.uri());
    let body = blocking(move || client().negotiate_pack(&url, &refs))
        .await
        .unwrap();
    assert_eq!(body, b"0008NAK\nPACK");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_clone_over_http() {
    let readme = GitObject::blob(b"# demo\n".to_vec());
    let script = GitObject::blob(b"#!/bin/sh\necho hi\n".to_vec());
    let bin: Tree = [TreeEntry::new(FileMode::Executable, "run.sh", script.id).unwrap()]
        .into_iter()
        .collect();
    let bin = bin.to_object();
    let root: Tree = [
        TreeEntry::new(FileMode::Regular, "README.md", readme.id).unwrap(),
        TreeEntry::new(FileMode::Directory, "bin", bin.id).unwrap(),
    ]
    .into_iter()
    .collect();
    let root = root.to_object();
    let commit = CommitBuilder::new(root.id, Signature::now("Dev", "dev@example.com"), "initial")
        .to_object();
    let head = commit.id;

    let mut builder = PackBuilder::new();
    for object in [commit, root, bin, readme, script] {
        builder.add(object);
    }
    let mut pack = b"0008NAK\n".to_vec();
    pack.extend(builder.build().unwrap());

    let server = MockServer::start().await;
    mount_refs(
        &server,
        advertisement_body(
            &[(head, "HEAD"), (head, "refs/heads/main")],
            "symref=HEAD:refs/heads/main agent=git/2.43.0",
        ),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/repo.git/git-upload-pack"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(pack, RESULT))
        .expect(1)
        .mount(&server)
        .await;

    let dest = TempDir::new().unwrap();
    let target = dest.path().join("demo");
    let url = format!("{}/repo.git", server.uri());
    let outcome = {
        let target = target.clone();
        blocking(move || clone_repository(&url, &target, &ClientConfig::default()))
            .await
            .unwrap()
    };

    assert_eq!(outcome.head, Some(head));
    assert_eq!(outcome.branch.as_deref(), Some("refs/heads/main"));
    assert_eq!(outcome.objects.total(), 5);
    assert_eq!(outcome.files, 2);

    assert_eq!(std::fs::read(target.join("README.md")).unwrap(), b"# demo\n");
    assert_eq!(
        std::fs::read(target.join("bin/run.sh")).unwrap(),
        b"#!/bin/sh\necho hi\n"
    );
    let refs = RefStore::new(target.join(".git"));
    assert_eq!(refs.resolve_head().unwrap(), head);
    assert_eq!(refs.current_branch().as_deref(), Some("main"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_clone_empty_remote() {
    let server = MockServer::start().await;
    mount_refs(
        &server,
        advertisement_body(
            &[(ObjectId::from_bytes([0; 20]), "capabilities^{}")],
            "agent=git/2.43.0",
        ),
    )
    .await;

    let dest = TempDir::new().unwrap();
    let target = dest.path().to_path_buf();
    let url = format!("{}/repo.git", server.uri());
    let outcome = blocking(move || clone_repository(&url, &target, &ClientConfig::default()))
        .await
        .unwrap();

    assert_eq!(outcome.head, None);
    assert!(dest.path().join(".git/HEAD").is_file());
}
