//! JWKS fetch and key store behaviour against a real HTTP endpoint.
mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use common::{JwksServer, TestKey, fetcher, jwks, key_store};
use utility_api::app::build_state;
use utility_api::config::Config;
use utility_api::services::auth::{JwksFetcher, KeyStore, KeyStoreError, LookupError};

#[tokio::test]
async fn fetches_and_decodes_the_published_set() {
    let k1 = TestKey::new("k1", 1);
    let k2 = TestKey::new("k2", 2);
    let server = JwksServer::start(jwks(&[&k1, &k2])).await;

    let set = fetcher(&server).fetch().await.unwrap();
    assert_eq!(set.keys.len(), 2);
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = JwksServer::start(jwks(&[])).await;
    server.respond(StatusCode::SERVICE_UNAVAILABLE, "down");

    let err = fetcher(&server).fetch().await.unwrap_err();
    assert_eq!(err, KeyStoreError::Status(503));
    // one retry configured
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = JwksServer::start(jwks(&[])).await;
    server.respond(StatusCode::NOT_FOUND, "nope");

    let err = fetcher(&server).fetch().await.unwrap_err();
    assert_eq!(err, KeyStoreError::Status(404));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn garbage_body_is_a_decode_error() {
    let server = JwksServer::start(jwks(&[])).await;
    server.respond(StatusCode::OK, "<html>not json</html>");

    let err = fetcher(&server).fetch().await.unwrap_err();
    assert!(matches!(err, KeyStoreError::Decode(_)), "{err:?}");
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn empty_published_set_fails_the_refresh() {
    let server = JwksServer::start(jwks(&[])).await;
    let store = KeyStore::new(Arc::new(fetcher(&server)));

    let err = store.refresh().await.unwrap_err();
    assert_eq!(err, KeyStoreError::EmptyKeySet);
    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn concurrent_misses_share_one_fetch() {
    let k1 = TestKey::new("k1", 1);
    let server = JwksServer::start_with_delay(jwks(&[&k1]), Duration::from_millis(50)).await;
    let store = key_store(&server).await;
    assert_eq!(server.hits(), 1);

    let k2 = TestKey::new("k2", 2);
    server.publish(jwks(&[&k1, &k2]));

    let lookups: Vec<_> = (0..16)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.resolve("k2").await })
        })
        .collect();

    for lookup in lookups {
        let key = lookup.await.unwrap().unwrap();
        assert_eq!(key.kid, "k2");
    }
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn unknown_kid_refreshes_once_then_fails() {
    let k1 = TestKey::new("k1", 1);
    let server = JwksServer::start(jwks(&[&k1])).await;
    let store = key_store(&server).await;

    let err = store.resolve("ghost").await.unwrap_err();
    assert!(matches!(err, LookupError::NotFound(ref kid) if kid == "ghost"));
    assert_eq!(server.hits(), 2);

    // the known key is still served from cache
    assert!(store.resolve("k1").await.is_ok());
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn outage_keeps_the_previous_keys() {
    let k1 = TestKey::new("k1", 1);
    let server = JwksServer::start(jwks(&[&k1])).await;
    let store = key_store(&server).await;

    server.respond(StatusCode::INTERNAL_SERVER_ERROR, "oops");
    let err = store.resolve("k9").await.unwrap_err();
    assert_eq!(err, LookupError::Refresh(KeyStoreError::Status(500)));

    assert!(store.get("k1").await.is_some());
}

#[tokio::test]
async fn startup_fails_without_keys() {
    let config = Config::from_lookup(|key| match key {
        "AUTH_ISSUER" => Some("https://idp.example.com/".to_string()),
        "AUTH_JWKS_URL" => Some("http://127.0.0.1:1/jwks".to_string()),
        "JWKS_FETCH_RETRIES" => Some("0".to_string()),
        "JWKS_FETCH_TIMEOUT_SECONDS" => Some("1".to_string()),
        _ => None,
    })
    .unwrap();

    let err = build_state(&config).await.unwrap_err();
    assert!(
        err.to_string().contains("initial JWKS fetch"),
        "unexpected error: {err:#}"
    );
}

#[tokio::test]
async fn startup_loads_keys_and_settings() {
    let k1 = TestKey::new("k1", 1);
    let server = JwksServer::start(jwks(&[&k1])).await;
    let url = server.url().to_string();

    let config = Config::from_lookup(|key| match key {
        "AUTH_ISSUER" => Some("https://idp.example.com/".to_string()),
        "AUTH_JWKS_URL" => Some(url.clone()),
        "AUTH_TOKEN_HEADER" => Some("X-Access-Token".to_string()),
        _ => None,
    })
    .unwrap();

    let state = build_state(&config).await.unwrap();
    assert_eq!(state.token_header.as_str(), "x-access-token");
    assert!(state.auth.key_store().get("k1").await.is_some());
    assert_eq!(server.hits(), 1);
}
