//! Shared fixtures: Ed25519 signing keys, a local JWKS server, and a recording
//! access-log sink.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::SigningKey;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;
use utility_api::middleware::access_log::{AccessLogSink, LogEvent};
use utility_api::services::auth::{Authenticator, HttpJwksFetcher, KeyStore, ScopePolicy};
use utility_api::state::AppState;

pub const ISSUER: &str = "https://idp.example.com/";

pub struct TestKey {
    pub kid: String,
    signing: SigningKey,
}

impl TestKey {
    pub fn new(kid: &str, seed: u8) -> Self {
        Self {
            kid: kid.to_string(),
            signing: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    pub fn jwk(&self) -> Value {
        json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "kid": self.kid,
            "alg": "EdDSA",
            "use": "sig",
            "x": URL_SAFE_NO_PAD.encode(self.signing.verifying_key().to_bytes()),
        })
    }

    pub fn sign(&self, claims: &Value) -> String {
        let der = self.signing.to_pkcs8_der().expect("pkcs8 der");
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.kid.clone());
        jsonwebtoken::encode(&header, claims, &EncodingKey::from_ed_der(der.as_bytes()))
            .expect("token")
    }
}

pub fn jwks(keys: &[&TestKey]) -> Value {
    let keys: Vec<Value> = keys.iter().map(|k| k.jwk()).collect();
    json!({ "keys": keys })
}

pub fn claims(scope: &str) -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "iss": ISSUER,
        "sub": "client-1@clients",
        "exp": now + 300,
        "scope": scope,
    })
}

pub fn expired_claims(scope: &str) -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "iss": ISSUER,
        "sub": "client-1@clients",
        "exp": now - 3600,
        "scope": scope,
    })
}

/// What the fake identity provider serves at `/jwks`.
pub struct JwksServer {
    pub addr: SocketAddr,
    body: Arc<Mutex<(StatusCode, String)>>,
    hits: Arc<AtomicUsize>,
    _handle: JoinHandle<()>,
}

#[derive(Clone)]
struct ServerState {
    body: Arc<Mutex<(StatusCode, String)>>,
    hits: Arc<AtomicUsize>,
    delay: Duration,
}

async fn serve_jwks(State(state): State<ServerState>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    let (status, body) = state.body.lock().expect("lock").clone();
    (status, [("content-type", "application/json")], body).into_response()
}

impl JwksServer {
    pub async fn start(jwks: Value) -> Self {
        Self::start_with_delay(jwks, Duration::ZERO).await
    }

    pub async fn start_with_delay(jwks: Value, delay: Duration) -> Self {
        // Binding to 127.0.0.1:0 lets the OS choose a free port.
        let body = Arc::new(Mutex::new((StatusCode::OK, jwks.to_string())));
        let hits = Arc::new(AtomicUsize::new(0));
        let state = ServerState {
            body: body.clone(),
            hits: hits.clone(),
            delay,
        };

        let app = Router::new()
            .route("/jwks", axum::routing::get(serve_jwks))
            .with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            body,
            hits,
            _handle: handle,
        }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/jwks", self.addr)).expect("url")
    }

    pub fn publish(&self, jwks: Value) {
        *self.body.lock().expect("lock") = (StatusCode::OK, jwks.to_string());
    }

    pub fn respond(&self, status: StatusCode, body: &str) {
        *self.body.lock().expect("lock") = (status, body.to_string());
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub fn fetcher(server: &JwksServer) -> HttpJwksFetcher {
    HttpJwksFetcher::new(server.url(), Duration::from_secs(2), 1)
        .expect("client")
        .with_backoff(Duration::from_millis(10))
}

/// Key store already populated from `server`.
pub async fn key_store(server: &JwksServer) -> Arc<KeyStore> {
    let store = Arc::new(KeyStore::new(Arc::new(fetcher(server))));
    store.refresh().await.expect("initial refresh");
    store
}

pub async fn app_state(server: &JwksServer, resource_server: Option<&str>) -> AppState {
    let auth = Arc::new(Authenticator::new(
        key_store(server).await,
        ISSUER,
        None,
        0,
    ));
    AppState::new(auth, ScopePolicy::new(resource_server.map(str::to_string)))
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LogEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().expect("lock").clone()
    }
}

impl AccessLogSink for RecordingSink {
    fn record(&self, event: LogEvent) {
        self.events.lock().expect("lock").push(event);
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authentication", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

pub async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
