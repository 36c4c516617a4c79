/*
 * Responsibility
 * - Load Config → build dependencies (JWKS key store, authenticator, scope policy)
 * - Populate the key store once; failing that, refuse to start
 * - Compose the request pipeline and serve with axum::serve()
 */
use std::net::SocketAddr;
use std::panic;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::{Config, LogFormat};
use crate::middleware::access_log::{SharedSink, TracingSink};
use crate::middleware::pipeline;
use crate::services::auth::{Authenticator, HttpJwksFetcher, KeyStore, ScopeMatch, ScopePolicy};
use crate::state::AppState;

/// The production JSON layer: one flat object per event.
pub(crate) fn json_layer<S, W>(writer: W) -> impl Layer<S> + Send + Sync + 'static
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_target(true)
        .with_writer(writer)
}

fn init_tracing(format: LogFormat) {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,utility_api=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    let fmt_layer = match format {
        LogFormat::Json => json_layer(std::io::stdout).boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().pretty().boxed(),
    };

    // try_init: tolerate a subscriber already installed (tests, embedding)
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn init_panic_hook(echo_to_stderr: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Surface panics via tracing so they end up next to the access log.
        // The request-level boundary turns them into 500s; the process keeps running.
        tracing::error!(%info, "panic");

        // Development: keep the default hook (location, backtrace) on stderr as well.
        if echo_to_stderr {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, Arc::new(TracingSink));

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Build process-level services and inject them into the shared state.
///
/// The first JWKS fetch must succeed: without keys no request can be authenticated.
pub async fn build_state(config: &Config) -> Result<AppState> {
    let fetcher = HttpJwksFetcher::new(
        config.auth_jwks_url.clone(),
        config.jwks_fetch_timeout,
        config.jwks_fetch_retries,
    )?;

    let keys = Arc::new(KeyStore::new(Arc::new(fetcher)));
    let initial = keys
        .refresh()
        .await
        .with_context(|| format!("initial JWKS fetch from {} failed", config.auth_jwks_url))?;
    tracing::info!(keys = initial.len(), url = %config.auth_jwks_url, "jwks loaded");

    let auth = Arc::new(Authenticator::new(
        keys,
        config.auth_issuer.clone(),
        config.auth_audience.clone(),
        config.access_token_leeway_seconds,
    ));

    let scopes = ScopePolicy::new(config.auth_resource_server.clone());
    if matches!(scopes.matching(), ScopeMatch::Suffix) {
        tracing::warn!(
            "AUTH_RESOURCE_SERVER not set; scopes are matched by suffix, \
             which also accepts longer scopes ending in the route token"
        );
    }

    Ok(AppState::new(auth, scopes).with_token_header(config.auth_token_header.clone()))
}

pub fn build_router(state: AppState, sink: SharedSink) -> Router {
    pipeline::compose(api::v1::public(), api::v1::protected(), state, sink)
}
