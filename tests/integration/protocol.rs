use crate::*;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use itp_core::{Action, ImageType, Request, Response, ResponseKind, HEADER_LEN};

async fn query(server: &TestServer, time_mark: u32, img_type: ImageType, name: &str) -> Response {
    let packet = Request::query(7, time_mark, img_type, name).encode().unwrap();
    let reply = raw_exchange(server.addr, &packet).await;
    Response::decode(&reply).unwrap()
}

#[tokio::test]
async fn test_time_mark_is_echoed() {
    let server = TestServer::start("echo").await;
    server.add_image("dot.GIF", b"GIF89a");

    for mark in [0, 1_234_567, u32::MAX] {
        let found = query(&server, mark, ImageType::Gif, "dot").await;
        assert_eq!(found.kind, ResponseKind::Found);
        assert_eq!(found.time, mark);
        assert_eq!(found.version, 7);

        let missing = query(&server, mark, ImageType::Gif, "nothing").await;
        assert_eq!(missing.kind, ResponseKind::NotFound);
        assert_eq!(missing.time, mark);
    }

    // Through the client, with a mark that has wrapped past 32 bits.
    let download = temp_dir("echo-dl");
    let (mut session, _) = client(&server, &download);
    let mark = u32::MAX.wrapping_add(5);
    let fetched = session.fetch_with_time_mark("dot.gif", mark).await.unwrap();
    assert_eq!(fetched.time, 4);

    server.stop().await;
    let _ = std::fs::remove_dir_all(&download);
}

#[tokio::test]
async fn test_response_header_layout() {
    let server = TestServer::start("layout").await;
    server.add_image("a.TIFF", &[0xAB; 300]);

    let packet = Request::query(9, 0x0102_0304, ImageType::Tiff, "a").encode().unwrap();
    let reply = raw_exchange(server.addr, &packet).await;

    assert_eq!(reply.len(), HEADER_LEN + 300);
    // version 9, type 1, sequence 1
    assert_eq!(&reply[0..4], &[0x94, 0x00, 0x00, 0x01]);
    assert_eq!(&reply[4..8], &[0x01, 0x02, 0x03, 0x04]);
    assert_eq!(&reply[8..12], &300u32.to_be_bytes());
    assert!(reply[HEADER_LEN..].iter().all(|&b| b == 0xAB));

    server.stop().await;
}

/// The request arrives one byte per segment; the server must wait for all of it.
#[tokio::test]
async fn test_fragmented_request() {
    let server = TestServer::start("fragments").await;
    server.add_image("slow.JPEG", b"jpeg data");

    let packet = Request::query(7, 77, ImageType::Jpeg, "slow").encode().unwrap();
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.set_nodelay(true).unwrap();
    for byte in packet.iter() {
        stream.write_all(&[*byte]).await.unwrap();
        stream.flush().await.unwrap();
        tokio::task::yield_now().await;
    }

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    let resp = Response::decode(&reply).unwrap();
    assert_eq!(resp.kind, ResponseKind::Found);
    assert_eq!(resp.time, 77);
    assert_eq!(&resp.payload[..], b"jpeg data");

    server.stop().await;
}

#[tokio::test]
async fn test_reserved_action_gets_no_reply() {
    let server = TestServer::start("reserved").await;
    server.add_image("photo.PNG", b"png");

    let mut request = Request::query(7, 1, ImageType::Png, "photo");
    request.action = Action::Reserved(2);
    let reply = raw_exchange(server.addr, &request.encode().unwrap()).await;
    assert!(reply.is_empty());

    // The rejected request did not consume a sequence number.
    let ok = query(&server, 1, ImageType::Png, "photo").await;
    assert_eq!(ok.sequence, 1);

    server.stop().await;
}

#[tokio::test]
async fn test_truncated_request_then_recovery() {
    let server = TestServer::start("truncated").await;
    server.add_image("photo.PNG", b"png");

    let packet = Request::query(7, 1, ImageType::Png, "photo").encode().unwrap();
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(&packet[..HEADER_LEN + 2]).await.unwrap();
    stream.shutdown().await.unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    assert!(reply.is_empty());

    let ok = query(&server, 2, ImageType::Png, "photo").await;
    assert_eq!(ok.kind, ResponseKind::Found);
    assert_eq!(&ok.payload[..], b"png");

    server.stop().await;
}

#[tokio::test]
async fn test_sequences_increment_per_response() {
    let server = TestServer::start("sequence").await;
    server.add_image("photo.PNG", b"png");

    let first = query(&server, 0, ImageType::Png, "photo").await;
    let second = query(&server, 0, ImageType::Bmp, "photo").await;
    let third = query(&server, 0, ImageType::Png, "photo").await;

    assert_eq!(
        (first.sequence, second.sequence, third.sequence),
        (1, 2, 3)
    );
    assert_eq!(second.kind, ResponseKind::NotFound);

    server.stop().await;
}

/// Names that would leave the resource root are never served.
#[tokio::test]
async fn test_traversal_is_not_found() {
    let server = TestServer::start("traversal").await;
    let outside = server.root.parent().unwrap().join("itp-it-secret.PNG");
    std::fs::write(&outside, b"secret").unwrap();

    let name = format!("../{}", "itp-it-secret");
    let resp = query(&server, 0, ImageType::Png, &name).await;
    assert_eq!(resp.kind, ResponseKind::NotFound);
    assert!(resp.payload.is_empty());

    let _ = std::fs::remove_file(&outside);
    server.stop().await;
}
