//! HTTP surface for the relay.
//!
//! - `GET  /api/vapid-public-key` - VAPID public key for `PushManager.subscribe()`
//! - `POST /api/subscribe` - register `{endpoint, keys:{p256dh, auth}}`
//! - `POST /api/unsubscribe` - remove `{endpoint}`
//! - `POST /api/push` - broadcast `{title, body, icon?, url?}` to every subscription
//! - `GET  /health` - liveness plus subscription count
//! - `/static/*` and `/` - files from the configured static directory
//!
//! # Modules
//!
//! - [`types`] - request/response bodies and [`ApiError`]

mod handlers;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

use crate::config::Config;
use crate::notifications::{PushDelivery, SubscriptionRegistry, SubscriptionStore, WebPushDelivery};

pub use types::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    registry: Arc<SubscriptionRegistry>,
    delivery: Arc<dyn PushDelivery>,
    public_key: Arc<str>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("registry", &self.registry)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Bundle the registry, the delivery capability, and the public key to serve.
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        delivery: Arc<dyn PushDelivery>,
        public_key: &str,
    ) -> Self {
        Self {
            registry,
            delivery,
            public_key: Arc::from(public_key),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/api/vapid-public-key", get(handlers::public_key))
        .route("/api/subscribe", post(handlers::subscribe))
        .route("/api/unsubscribe", post(handlers::unsubscribe))
        .route("/api/push", post(handlers::push))
        .route("/health", get(handlers::health))
        .nest_service("/static", ServeDir::new(static_dir))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .with_state(state)
}

/// Load persisted subscriptions, bind, and serve until Ctrl-C.
pub async fn serve(config: Config) -> Result<()> {
    let store = SubscriptionStore::new(&config.subscriptions_file);
    let registry = tokio::task::spawn_blocking(move || SubscriptionRegistry::open(store))
        .await
        .context("Failed to load subscriptions")?;
    log::info!("{} subscription(s) registered", registry.count());

    let delivery = WebPushDelivery::new(&config.vapid, &config.vapid_subject, config.push_ttl)?;
    let state = AppState::new(
        Arc::new(registry),
        Arc::new(delivery),
        config.vapid.public_key_base64url(),
    );
    let app = router(state, &config.static_dir);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    log::info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}
