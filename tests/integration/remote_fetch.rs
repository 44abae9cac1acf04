//! Integration tests for downloading thumbnails over HTTP.
//!
//! Each test serves fixtures from a throwaway local axum server.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{header, StatusCode};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use kvmm::error::KvmmError;
use kvmm::fetch::ImageFetcher;

use crate::common::fixtures::png_bytes;

async fn spawn_fixture_server() -> SocketAddr {
    let png = png_bytes(32, 32);
    let big = png_bytes(256, 256);
    let app = Router::new()
        .route(
            "/ok.png",
            get(move || {
                let png = png.clone();
                async move { ([(header::CONTENT_TYPE, "image/png")], png) }
            }),
        )
        .route(
            "/big.png",
            get(move || {
                let big = big.clone();
                async move { ([(header::CONTENT_TYPE, "image/png")], big) }
            }),
        )
        .route(
            "/page.html",
            get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<html>hi</html>") }),
        )
        .route("/missing.png", get(|| async { StatusCode::NOT_FOUND }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    addr
}

fn fetch_message(err: KvmmError) -> String {
    match err {
        KvmmError::Fetch(message) => message,
        other => panic!("expected fetch error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_valid_image() {
    let addr = spawn_fixture_server().await;
    let fetcher = ImageFetcher::new().unwrap();
    let bytes = fetcher.fetch(&format!("http://{addr}/ok.png")).await.unwrap();
    assert_eq!(bytes, png_bytes(32, 32));
}

#[tokio::test]
async fn test_fetch_reports_status() {
    let addr = spawn_fixture_server().await;
    let fetcher = ImageFetcher::new().unwrap();
    let err = fetcher
        .fetch(&format!("http://{addr}/missing.png"))
        .await
        .unwrap_err();
    assert_eq!(fetch_message(err), "server returned 404");
}

#[tokio::test]
async fn test_fetch_rejects_non_image_body() {
    let addr = spawn_fixture_server().await;
    let fetcher = ImageFetcher::new().unwrap();
    let err = fetcher
        .fetch(&format!("http://{addr}/page.html"))
        .await
        .unwrap_err();
    assert_eq!(fetch_message(err), "URL did not return a valid image");
}

#[tokio::test]
async fn test_fetch_rejects_oversized_body() {
    let addr = spawn_fixture_server().await;
    let fetcher = ImageFetcher::with_limits(Duration::from_secs(5), 64).unwrap();
    let err = fetcher
        .fetch(&format!("http://{addr}/big.png"))
        .await
        .unwrap_err();
    assert!(fetch_message(err).contains("exceeds"));
}

#[tokio::test]
async fn test_fetch_connection_refused() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let fetcher = ImageFetcher::with_limits(Duration::from_secs(2), 1024).unwrap();
    assert!(matches!(
        fetcher.fetch(&format!("http://{addr}/ok.png")).await,
        Err(KvmmError::Fetch(_))
    ));
}
