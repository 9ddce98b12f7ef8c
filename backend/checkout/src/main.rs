//! Storefront entry point.
//!
//! Serves the checkout API and runs a background sweeper that expires
//! abandoned payments and reclaims idle sessions.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use checkout::api::{self, ApiState};
use checkout::backend::HttpBackend;
use checkout::config::Config;
use checkout::db;
use checkout::gateway::HostedWidget;
use checkout::identity::TokenSigner;
use checkout::orchestrator::Collaborators;
use checkout::registry::{self, SessionRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    let pool = db::init_pool(&config.database_url).await?;

    let client = Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;
    let backend = Arc::new(HttpBackend::new(
        client,
        config.backend_url.clone(),
        config.currency.clone(),
        config.read_retries,
    ));

    let services = Collaborators {
        orders: backend.clone(),
        verifier: backend.clone(),
        campaigns: backend.clone(),
        gateway: Arc::new(
            HostedWidget::new(config.gateway_key_id.clone(), config.merchant_name.clone())
                .with_checkout_ttl(config.checkout_ttl()),
        ),
    };
    let registry = Arc::new(SessionRegistry::new(services));

    // ─── Session sweeper ──────────────────────────────────
    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(registry::run_sweeper(
        registry.clone(),
        pool.clone(),
        config.checkout_ttl(),
        config.sweep_interval(),
        shutdown.clone(),
    ));

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(ApiState {
        pool,
        registry,
        auth: backend.clone(),
        campaigns: backend.clone(),
        plans: backend,
        signer: TokenSigner::new(&config.session_secret, config.token_ttl_secs),
        currency: config.currency.clone(),
    });

    let app = api::router(api_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("Storefront listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    sweeper.await?;
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutting down");
    shutdown.cancel();
}
