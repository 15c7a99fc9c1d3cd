use std::{path::PathBuf, time::Duration};

use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::{TcpListener, TcpStream},
};

use crate::{
    media::{self, HttpMediaResolver, MediaResolver as _},
    repository::sqlite::LocalDatabase,
};

const SUNRISE: &[u8] = b"\x89PNG\r\n\x1a\nnot really a png";

/// Minimal HTTP/1.1 responder: `/covers/sunrise.png` is served, anything
/// else is a 404.
async fn respond(mut socket: TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|window| window == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    let response = if request.starts_with(b"GET /covers/sunrise.png ") {
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            SUNRISE.len()
        )
        .into_bytes();
        response.extend_from_slice(SUNRISE);
        response
    } else {
        b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec()
    };
    socket.write_all(&response).await.ok();
    socket.shutdown().await.ok();
}

async fn serve(listener: TcpListener) {
    while let Ok((socket, _)) = listener.accept().await {
        tokio::spawn(respond(socket));
    }
}

#[tokio::test]
async fn http_resolver_hashes_and_stores() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener));

    let db = LocalDatabase::open("sqlite::memory:").await.unwrap();
    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let resolver = HttpMediaResolver::with_client(db.asset_client(), client);

    let asset = resolver
        .resolve(&format!("http://{addr}/covers/sunrise.png"))
        .await
        .unwrap();
    let hash = blake3::hash(SUNRISE);
    assert_eq!(asset.hash, hash);
    assert_eq!(
        asset.path,
        PathBuf::from(hash.to_hex().as_str()).join("sunrise.png")
    );
    assert_eq!(asset.content_type, "image/png");
    assert_eq!(asset.size, SUNRISE.len() as u64);
    assert_eq!(
        asset.source.as_str(),
        format!("http://{addr}/covers/sunrise.png")
    );

    let (content_type, content) = sqlx::query_as::<_, (String, Vec<u8>)>(
        "SELECT content_type, content FROM assets WHERE path = ?",
    )
    .bind(asset.path.display().to_string())
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(content_type, "image/png");
    assert_eq!(content, SUNRISE);

    let missing = resolver
        .resolve(&format!("http://{addr}/covers/missing.png"))
        .await;
    match missing {
        Err(media::Error::Fetch { error, .. }) => {
            assert_eq!(error.status(), Some(reqwest::StatusCode::NOT_FOUND));
        }
        other => panic!("expected a fetch error, got {other:?}"),
    }
    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assets")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(stored, 1);
}
