use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use rax_store_server::{RemoteClient, Server, ServerConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct TestServer {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn start(root: &Path) -> Self {
        Self::start_with(root, |_| {}).await
    }

    async fn start_with(root: &Path, adjust: impl FnOnce(&mut ServerConfig)) -> Self {
        let mut config = ServerConfig::default();
        config.startup.port = 0;
        config.startup.server_root = root.to_string_lossy().into_owned();
        config.startup.idle_timeout_secs = 5;
        adjust(&mut config);

        let server = Server::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            server
                .run(async {
                    let _ = stopped.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            stop: Some(stop),
            handle,
        }
    }

    fn client(&self) -> RemoteClient {
        RemoteClient::new(self.addr.to_string())
    }

    async fn raw(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }

    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .unwrap()
            .unwrap();
    }
}

/// Reads until the server closes. A reset counts as closed.
async fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .unwrap();
    buf
}

#[tokio::test]
async fn test_versioned_report_lifecycle() {
    let tmp = tempfile::tempdir().unwrap();
    let server = TestServer::start(tmp.path()).await;
    let client = server.client();

    client.write("report.txt", b"first draft").await.unwrap();
    client.write("report.txt", b"second draft").await.unwrap();

    assert_eq!(
        client.list(None).await.unwrap(),
        vec!["report_v1.txt", "report_v2.txt"]
    );
    assert_eq!(
        client.get("report.txt", None).await.unwrap().as_deref(),
        Some(&b"second draft"[..])
    );
    assert_eq!(
        client.get("report.txt", Some(1)).await.unwrap().as_deref(),
        Some(&b"first draft"[..])
    );

    assert_eq!(
        client.remove("report.txt", Some(2)).await.unwrap(),
        "200 File deleted successfully."
    );
    assert_eq!(
        client.get("report.txt", None).await.unwrap().as_deref(),
        Some(&b"first draft"[..])
    );

    // Version numbers are never handed out twice
    client.write("report.txt", b"third draft").await.unwrap();
    assert_eq!(
        client.list(Some("report")).await.unwrap(),
        vec!["report_v1.txt", "report_v3.txt"]
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_payload_is_encrypted_at_rest() {
    let tmp = tempfile::tempdir().unwrap();
    let server = TestServer::start(tmp.path()).await;
    let client = server.client();

    let payload = b"plain text that should not be stored as-is".to_vec();
    client.write("secret.txt", &payload).await.unwrap();

    let on_disk = std::fs::read(tmp.path().join("secret_v1.txt")).unwrap();
    assert_eq!(on_disk.len(), payload.len());
    assert_ne!(on_disk, payload);
    assert_eq!(
        client.get("secret.txt", None).await.unwrap(),
        Some(payload)
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_large_binary_round_trip_in_nested_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let server = TestServer::start(tmp.path()).await;
    let client = server.client();

    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    client.write("data/blobs/chunk.bin", &payload).await.unwrap();

    assert_eq!(
        client.get("data/blobs/chunk.bin", None).await.unwrap(),
        Some(payload)
    );
    assert_eq!(
        client.list(None).await.unwrap(),
        vec!["data/blobs/chunk_v1.bin"]
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_missing_entries_report_size_zero() {
    let tmp = tempfile::tempdir().unwrap();
    let server = TestServer::start(tmp.path()).await;
    let client = server.client();

    assert_eq!(client.get("nothing.txt", None).await.unwrap(), None);

    client.write("doc.txt", b"v1").await.unwrap();
    assert_eq!(client.get("doc.txt", Some(9)).await.unwrap(), None);

    let mut stream = server.raw().await;
    stream.write_all(b"GET doc.txt:9\n").await.unwrap();
    assert_eq!(read_until_closed(&mut stream).await, b"SIZE 0\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_listing_filter_and_empty_result() {
    let tmp = tempfile::tempdir().unwrap();
    let server = TestServer::start(tmp.path()).await;
    let client = server.client();

    assert!(client.list(None).await.unwrap().is_empty());

    client.write("a.txt", b"1").await.unwrap();
    client.write("b.log", b"2").await.unwrap();
    client.write("a.txt", b"3").await.unwrap();

    assert_eq!(
        client.list(Some(".txt")).await.unwrap(),
        vec!["a_v1.txt", "a_v2.txt"]
    );

    let mut stream = server.raw().await;
    stream.write_all(b"LS nomatch\n").await.unwrap();
    assert_eq!(read_until_closed(&mut stream).await, b"__END__\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_remove_modes() {
    let tmp = tempfile::tempdir().unwrap();
    let server = TestServer::start(tmp.path()).await;
    let client = server.client();

    for body in [&b"1"[..], &b"2"[..], &b"3"[..]] {
        client.write("notes.txt", body).await.unwrap();
    }

    // A stored name as printed by LS removes exactly that entry
    assert_eq!(
        client.remove("notes_v2.txt", None).await.unwrap(),
        "200 File deleted successfully."
    );
    assert_eq!(
        client.list(None).await.unwrap(),
        vec!["notes_v1.txt", "notes_v3.txt"]
    );

    // The logical path removes every remaining version
    assert_eq!(
        client.remove("notes.txt", None).await.unwrap(),
        "200 File deleted successfully."
    );
    assert!(client.list(None).await.unwrap().is_empty());

    let reply = client.remove("notes.txt", None).await.unwrap();
    assert!(reply.starts_with("404 Failed to delete file: "), "{}", reply);

    server.shutdown().await;
}

#[tokio::test]
async fn test_traversal_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    let server = TestServer::start(&root).await;
    let client = server.client();

    let mut stream = server.raw().await;
    stream.write_all(b"WRITE ../escape.txt 4\nevil").await.unwrap();
    assert!(read_until_closed(&mut stream).await.is_empty());
    assert!(!tmp.path().join("escape_v1.txt").exists());
    assert!(client.list(None).await.unwrap().is_empty());

    let reply = client.remove("../escape.txt", None).await.unwrap();
    assert!(reply.starts_with("400 "), "{}", reply);

    assert_eq!(client.get("/etc/passwd", None).await.unwrap(), None);

    server.shutdown().await;
}

#[tokio::test]
async fn test_bad_headers_close_without_reply() {
    let tmp = tempfile::tempdir().unwrap();
    let server = TestServer::start_with(tmp.path(), |config| {
        config.startup.max_command_length = 1100;
    })
    .await;

    let mut stream = server.raw().await;
    let oversized = format!("LS {}\n", "x".repeat(4000));
    let _ = stream.write_all(oversized.as_bytes()).await;
    assert!(read_until_closed(&mut stream).await.is_empty());

    let mut stream = server.raw().await;
    stream.write_all(b"HELLO there\n").await.unwrap();
    assert!(read_until_closed(&mut stream).await.is_empty());

    let mut stream = server.raw().await;
    stream.write_all(b"WRITE zero.txt 0\n").await.unwrap();
    assert!(read_until_closed(&mut stream).await.is_empty());

    assert!(server.client().list(None).await.unwrap().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_oversized_upload_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let server = TestServer::start_with(tmp.path(), |config| {
        config.runtime.max_file_size_mb = 1;
    })
    .await;

    let mut stream = server.raw().await;
    stream
        .write_all(format!("WRITE big.bin {}\n", 2 * 1024 * 1024).as_bytes())
        .await
        .unwrap();
    assert!(read_until_closed(&mut stream).await.is_empty());
    assert!(server.client().list(None).await.unwrap().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_short_upload_leaves_partial_file() {
    let tmp = tempfile::tempdir().unwrap();
    let server = TestServer::start(tmp.path()).await;
    let client = server.client();

    let mut stream = server.raw().await;
    stream.write_all(b"WRITE big.bin 100\n0123456789").await.unwrap();
    stream.shutdown().await.unwrap();
    read_until_closed(&mut stream).await;

    assert!(tmp.path().join("big_v1.bin.part").exists());
    assert!(client.list(None).await.unwrap().is_empty());
    assert_eq!(client.get("big.bin", None).await.unwrap(), None);

    // The abandoned version stays consumed
    client.write("big.bin", b"complete").await.unwrap();
    assert_eq!(client.list(None).await.unwrap(), vec!["big_v2.bin"]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_uploads_get_distinct_versions() {
    let tmp = tempfile::tempdir().unwrap();
    let server = TestServer::start(tmp.path()).await;

    let mut tasks = Vec::new();
    for i in 0..12u8 {
        let client = server.client();
        tasks.push(tokio::spawn(async move {
            client.write("shared.dat", &[i; 64]).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let names = server.client().list(None).await.unwrap();
    let expected: Vec<String> = {
        let mut v: Vec<String> = (1..=12).map(|n| format!("shared_v{}.dat", n)).collect();
        v.sort();
        v
    };
    assert_eq!(names, expected);

    for n in 1..=12u32 {
        let body = server
            .client()
            .get("shared.dat", Some(n))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body.len(), 64);
        assert!(body.iter().all(|b| *b == body[0]));
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_versions_survive_restart() {
    let tmp = tempfile::tempdir().unwrap();

    let server = TestServer::start(tmp.path()).await;
    let client = server.client();
    client.write("log.txt", b"one").await.unwrap();
    client.write("log.txt", b"two").await.unwrap();
    assert!(client.remove("log.txt", Some(2)).await.unwrap().starts_with("200"));
    server.shutdown().await;

    let server = TestServer::start(tmp.path()).await;
    let client = server.client();
    assert_eq!(client.list(None).await.unwrap(), vec!["log_v1.txt"]);
    client.write("log.txt", b"three").await.unwrap();
    assert_eq!(
        client.list(None).await.unwrap(),
        vec!["log_v1.txt", "log_v3.txt"]
    );
    assert_eq!(
        client.get("log.txt", None).await.unwrap().as_deref(),
        Some(&b"three"[..])
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_drops_idle_connections() {
    let tmp = tempfile::tempdir().unwrap();
    let server = TestServer::start(tmp.path()).await;

    // Connected but never sends a header
    let mut idle = server.raw().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    server.shutdown().await;
    assert!(read_until_closed(&mut idle).await.is_empty());
}

#[tokio::test]
async fn test_connection_limit_rejects_excess_clients() {
    let tmp = tempfile::tempdir().unwrap();
    let server = TestServer::start_with(tmp.path(), |config| {
        config.runtime.max_clients = 1;
    })
    .await;

    // Occupies the only slot without sending a header
    let holder = server.raw().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut rejected = server.raw().await;
    let _ = rejected.write_all(b"LS\n").await;
    assert!(read_until_closed(&mut rejected).await.is_empty());

    // The slot frees up once the holder leaves
    drop(holder);
    let mut listed = None;
    for _ in 0..50 {
        if let Ok(names) = server.client().list(None).await {
            listed = Some(names);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(listed, Some(Vec::new()));

    server.shutdown().await;
}
