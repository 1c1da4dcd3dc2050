mod common;

use axum::Router;
use axum_test::TestServer;
use cached_shortener::api::routes::url_routes;
use common::{Harness, MockConnectInfoLayer};
use serde_json::json;

fn server(h: &Harness) -> TestServer {
    let app = Router::new()
        .merge(url_routes())
        .layer(MockConnectInfoLayer)
        .with_state(h.state());

    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_shorten_success() {
    let h = Harness::new();
    let server = server(&h);

    let response = server
        .post("/url/shorten")
        .json(&json!({ "url": "https://example.com/page" }))
        .await;

    assert_eq!(response.status_code(), 201);

    let json = response.json::<serde_json::Value>();
    let code = json["code"].as_str().unwrap();
    assert_eq!(code.len(), 6);
    assert_eq!(json["long_url"], "https://example.com/page");
    assert_eq!(json["short_url"], format!("http://sho.rt/{code}"));
    assert_eq!(json["visits"], 0);
    assert!(json["created_at"].is_string());

    assert!(h.cache.memory().has_mapping(code));
    assert_eq!(h.counter(code), Some(0));
}

#[tokio::test]
async fn test_shorten_with_owner_shows_in_owner_listing() {
    let h = Harness::new();
    let server = server(&h);

    let response = server
        .post("/url/shorten")
        .json(&json!({ "url": "https://example.com", "owner_id": "user-42" }))
        .await;
    assert_eq!(response.status_code(), 201);

    let listing = server.get("/usr/user-42").await;
    listing.assert_status_ok();
    let json = listing.json::<serde_json::Value>();
    assert_eq!(json["owner_id"], "user-42");
    assert_eq!(json["urls"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_shorten_invalid_url() {
    let h = Harness::new();
    let server = server(&h);

    let response = server
        .post("/url/shorten")
        .json(&json!({ "url": "not-a-valid-url" }))
        .await;

    response.assert_status_bad_request();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["error"]["code"], "invalid_format");
}

#[tokio::test]
async fn test_shorten_unsupported_scheme() {
    let h = Harness::new();
    let server = server(&h);

    let response = server
        .post("/url/shorten")
        .json(&json!({ "url": "ftp://example.com/file" }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_shorten_missing_url_field() {
    let h = Harness::new();
    let server = server(&h);

    let response = server
        .post("/url/shorten")
        .json(&json!({ "owner_id": "user-1" }))
        .await;

    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_shorten_store_down_is_503() {
    let h = Harness::new();
    h.store.set_down(true);
    let server = server(&h);

    let response = server
        .post("/url/shorten")
        .json(&json!({ "url": "https://example.com" }))
        .await;

    assert_eq!(response.status_code(), 503);
}

#[tokio::test]
async fn test_shorten_is_rate_limited() {
    let h = Harness::new();
    let server = server(&h);

    let mut limited = false;
    for _ in 0..100 {
        let response = server
            .post("/url/shorten")
            .json(&json!({ "url": "https://example.com" }))
            .await;
        if response.status_code() == 429 {
            limited = true;
            break;
        }
    }

    assert!(limited);
}
