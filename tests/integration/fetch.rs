use crate::*;

use std::collections::HashSet;

use itp_core::{ImageType, Request, Response, ResponseKind};
use itp_services::client::split_file_name;
use itp_services::{ClientError, ClientState};

/// Client asks for photo.png, server holds photo.PNG.
#[tokio::test]
async fn test_fetch_existing_image() {
    let server = TestServer::start("found").await;
    let image: Vec<u8> = (0..5000u32).map(|i| (i * 7) as u8).collect();
    server.add_image("photo.PNG", &image);

    let download = temp_dir("found-dl");
    let (mut session, viewer) = client(&server, &download);

    let fetched = session.fetch("photo.png").await.unwrap();

    assert_eq!(session.state(), ClientState::Done);
    assert_eq!(fetched.path, download.join("photo.png"));
    assert_eq!(fetched.size, image.len());
    assert_eq!(std::fs::read(&fetched.path).unwrap(), image);
    assert_eq!(viewer.opened(), vec![download.join("photo.png")]);

    server.stop().await;
    let _ = std::fs::remove_dir_all(&download);
}

/// No matching resource: NotFound, nothing written, no viewer.
#[tokio::test]
async fn test_fetch_missing_image() {
    let server = TestServer::start("missing").await;
    let download = temp_dir("missing-dl");
    let (mut session, viewer) = client(&server, &download);

    let err = session.fetch("missing.gif").await.unwrap_err();

    assert!(matches!(err, ClientError::NotFound { .. }), "got {err}");
    assert_eq!(session.state(), ClientState::Failed);
    assert!(!download.join("missing.gif").exists());
    assert!(viewer.opened().is_empty());

    // The same exchange on the wire: type 2, size 0, no payload.
    let (stem, img_type) = split_file_name("missing.gif");
    assert_eq!(img_type.code(), 5);
    let reply = raw_exchange(
        server.addr,
        &Request::query(7, 1, img_type, stem).encode().unwrap(),
    )
    .await;
    assert_eq!(reply.len(), 12);
    let resp = Response::decode(&reply).unwrap();
    assert_eq!(resp.kind, ResponseKind::NotFound);
    assert!(resp.payload.is_empty());

    server.stop().await;
    let _ = std::fs::remove_dir_all(&download);
}

/// An unrecognised extension becomes type 0, which never resolves.
#[tokio::test]
async fn test_fetch_unknown_extension() {
    let server = TestServer::start("webp").await;
    server.add_image("photo.PNG", b"png");
    server.add_image("photo.webp", b"webp");
    server.add_image("photo.WEBP", b"webp");

    let (stem, img_type) = split_file_name("photo.webp");
    assert_eq!((stem, img_type), ("photo", ImageType::Unknown));

    let download = temp_dir("webp-dl");
    let (mut session, viewer) = client(&server, &download);
    let err = session.fetch("photo.webp").await.unwrap_err();

    assert!(matches!(err, ClientError::NotFound { .. }), "got {err}");
    assert!(!download.join("photo.webp").exists());
    assert!(viewer.opened().is_empty());

    server.stop().await;
    let _ = std::fs::remove_dir_all(&download);
}

/// A payload far larger than one TCP segment arrives intact.
#[tokio::test]
async fn test_fetch_large_image() {
    let server = TestServer::start("large").await;
    let image: Vec<u8> = (0..3 * 1024 * 1024u32).map(|i| (i ^ (i >> 8)) as u8).collect();
    server.add_image("big.RAW", &image);

    let download = temp_dir("large-dl");
    let (mut session, _) = client(&server, &download);
    let fetched = session.fetch("big.raw").await.unwrap();

    assert_eq!(fetched.size, image.len());
    assert_eq!(std::fs::read(&fetched.path).unwrap(), image);

    server.stop().await;
    let _ = std::fs::remove_dir_all(&download);
}

/// A second fetch of the same name replaces the first file.
#[tokio::test]
async fn test_fetch_overwrites_local_file() {
    let server = TestServer::start("overwrite").await;
    server.add_image("logo.BMP", b"first version, quite long");

    let download = temp_dir("overwrite-dl");
    let (mut session, _) = client(&server, &download);
    session.fetch("logo.bmp").await.unwrap();

    server.add_image("logo.BMP", b"second");
    let (mut session, _) = client(&server, &download);
    session.fetch("logo.bmp").await.unwrap();

    assert_eq!(std::fs::read(download.join("logo.bmp")).unwrap(), b"second");

    server.stop().await;
    let _ = std::fs::remove_dir_all(&download);
}

/// Concurrent sessions each get a response and a distinct sequence number.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_fetches() {
    let server = TestServer::start("concurrent").await;
    for i in 0..16 {
        server.add_image(&format!("img{i}.JPEG"), format!("image number {i}").as_bytes());
    }
    let download = temp_dir("concurrent-dl");

    let mut tasks = Vec::new();
    for i in 0..16 {
        let (mut session, _) = client(&server, &download);
        tasks.push(tokio::spawn(async move {
            session.fetch(&format!("img{i}.jpg")).await
        }));
    }

    let mut sequences = HashSet::new();
    for (i, task) in tasks.into_iter().enumerate() {
        let fetched = task.await.unwrap().unwrap();
        assert!(sequences.insert(fetched.sequence), "duplicate sequence {}", fetched.sequence);
        assert_eq!(
            std::fs::read(&fetched.path).unwrap(),
            format!("image number {i}").as_bytes()
        );
    }
    assert_eq!(sequences, (1..=16).collect::<HashSet<u32>>());

    server.stop().await;
    let _ = std::fs::remove_dir_all(&download);
}

/// Nothing is listening: the client fails without retrying.
#[tokio::test]
async fn test_fetch_with_server_down() {
    let server = TestServer::start("down").await;
    let download = temp_dir("down-dl");
    let (mut session, viewer) = client(&server, &download);
    server.stop().await;

    let err = session.fetch("photo.png").await.unwrap_err();
    assert!(matches!(err, ClientError::Connect { .. }), "got {err}");
    assert!(viewer.opened().is_empty());

    let _ = std::fs::remove_dir_all(&download);
}
