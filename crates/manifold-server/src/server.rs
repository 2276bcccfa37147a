//! # `GatewayServer` — axum HTTP surface
//!
//! Request routing order: CORS preflight (outermost layer) → principal
//! derivation + route-permission check (middleware) → handlers. Request
//! counters record every response for `/health`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

use manifold_auth::{Authenticator, CredentialStore, GatewayKeyStore, RouteTable, SessionStore};
use manifold_gateway::{CacheConfig, CostConfig, CostTracker, Gateway, ResponseCache};

use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::routes::{admin, auth, external, keys};
use crate::shutdown::Shutdown;
use crate::state::AppState;
use crate::stats::RequestStats;
use crate::wiring;

/// Server construction and serve errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A store failed to initialize.
    #[error("auth store error: {0}")]
    Auth(#[from] manifold_auth::AuthError),
    /// Binding or serving failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The assembled gateway server.
pub struct GatewayServer {
    state: AppState,
    sessions: Arc<SessionStore>,
    shutdown: Arc<Shutdown>,
}

impl GatewayServer {
    /// Wire every store and the pipeline from the configuration.
    ///
    /// On first start the generated admin password is printed to stdout —
    /// the only time it is ever shown.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let credentials = Arc::new(CredentialStore::new(&config.credentials_path));
        if let Some(password) = credentials.initialize()? {
            // Printed, not logged: log sinks must never carry credentials.
            println!("Initial admin password (shown once): {password}");
        }

        let sessions = Arc::new(SessionStore::new(Duration::from_secs(config.session_timeout)));
        let keys = Arc::new(GatewayKeyStore::load(&config.gateway_keys_path)?);
        let authenticator = Arc::new(Authenticator::new(
            Arc::clone(&credentials),
            Arc::clone(&sessions),
            Arc::clone(&keys),
            config.static_gateway_keys.clone(),
            config.embedded_mode,
        ));

        let registry = Arc::new(wiring::build_registry(&config));
        let cache = Arc::new(ResponseCache::new(CacheConfig {
            enabled: config.cache.enabled,
            ttl: Duration::from_secs(config.cache.ttl_seconds),
            max_size: config.cache.max_size,
        }));
        let costs = Arc::new(CostTracker::new(CostConfig {
            warning_threshold: config.cost.warning_threshold,
            limit_threshold: config.cost.limit_threshold,
            ..CostConfig::default()
        }));
        costs.on_warning(Arc::new(|spend| {
            tracing::warn!(month_to_date_usd = spend, "cost warning threshold crossed");
        }));
        costs.on_limit(Arc::new(|spend| {
            tracing::error!(month_to_date_usd = spend, "cost budget limit crossed");
        }));

        let gateway = Arc::new(Gateway::new(registry, cache, costs));

        let state = AppState {
            gateway,
            authenticator,
            keys,
            route_table: Arc::new(RouteTable::default()),
            stats: Arc::new(RequestStats::new()),
            config: Arc::new(config),
        };

        Ok(Self { state, sessions, shutdown: Arc::new(Shutdown::new()) })
    }

    /// The shared handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<Shutdown> {
        &self.shutdown
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let state = self.state.clone();

        let router = Router::new()
            // External, OpenAI-compatible surface.
            .route("/health", get(external::health))
            .route("/v1/models", get(external::list_models))
            .route("/v1/chat/completions", post(external::chat_completions))
            // Internal: auth.
            .route("/internal/auth/login", post(auth::login))
            .route("/internal/auth/logout", post(auth::logout))
            .route("/internal/auth/change-password", post(auth::change_password))
            .route("/internal/auth/me", get(auth::me))
            .route("/internal/auth/status", get(auth::status))
            // Internal: gateway keys.
            .route("/internal/gateway-keys", get(keys::list).post(keys::create))
            .route("/internal/gateway-keys/stats", get(keys::stats))
            .route(
                "/internal/gateway-keys/{id}",
                get(keys::get).put(keys::update).patch(keys::update).delete(keys::revoke),
            )
            .route("/internal/gateway-keys/{id}/enable", post(keys::enable))
            .route("/internal/gateway-keys/{id}/disable", post(keys::disable))
            .route("/internal/gateway-keys/{id}/regenerate", post(keys::regenerate))
            // Internal: providers and stats.
            .route("/internal/providers", get(admin::list_providers).post(admin::add_provider))
            .route(
                "/internal/providers/{provider}/key",
                post(admin::set_provider_key).delete(admin::delete_provider_key),
            )
            .route("/internal/stats", get(admin::stats))
            .with_state(state.clone())
            // Innermost → outermost: permission check runs inside CORS.
            .layer(middleware::from_fn_with_state(state.clone(), auth_and_permissions))
            .layer(middleware::from_fn_with_state(state.clone(), record_stats));

        match cors_layer(&state.config) {
            Some(cors) => router.layer(cors),
            None => router,
        }
    }

    /// Bind and serve. Returns the bound address and the server task.
    pub async fn listen(
        &self,
    ) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), ServerError> {
        let addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let bound_addr = listener.local_addr()?;

        // Background sweeper, bound to shutdown.
        self.shutdown.register(self.sessions.start_sweeper(self.shutdown.token()));

        info!(
            addr = %bound_addr,
            providers = self.state.gateway.registry().provider_ids().len(),
            "gateway listening"
        );

        let router = self.router();
        let shutdown_token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_token.cancelled().await;
                    info!("gateway shutdown initiated");
                })
                .await;
            info!("gateway shutdown complete");
        });

        Ok((bound_addr, handle))
    }
}

/// Derive the principal, check the permission table, then run the route.
async fn auth_and_permissions(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    fn header(request: &Request, name: &str) -> Option<String> {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }
    let authorization = header(&request, AUTHORIZATION.as_str());
    let auth_mode = header(&request, "x-auth-mode");
    let provider = header(&request, "x-provider");

    let principal = state.authenticator.authenticate(
        authorization.as_deref(),
        auth_mode.as_deref(),
        provider.as_deref(),
    );

    // A presented-but-invalid credential is an authentication failure even
    // on anonymous-allowed routes (a disabled gateway key must not fall
    // back to anonymous access).
    if authorization.is_some()
        && !principal.authenticated
        && principal.mode != manifold_auth::AuthMode::Passthrough
    {
        return ApiError(manifold_core::GatewayError::authentication(
            "invalid or disabled credentials",
        ))
        .into_response();
    }

    if let Err(e) =
        state.route_table.check(&principal, request.method().as_str(), request.uri().path())
    {
        return ApiError(e).into_response();
    }

    let _ = request.extensions_mut().insert(principal);
    next.run(request).await
}

/// Count every finished request for `/health`.
async fn record_stats(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    state.stats.record(response.status().as_u16());
    response
}

/// Build the CORS layer from config; `None` when disabled.
fn cors_layer(config: &GatewayConfig) -> Option<CorsLayer> {
    if !config.cors.enabled {
        return None;
    }

    let allow_headers = [
        CONTENT_TYPE,
        AUTHORIZATION,
        HeaderName::from_static("x-auth-mode"),
        HeaderName::from_static("x-provider"),
    ];
    let methods = [Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE];

    let layer = if config.cors.origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors
            .origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    Some(layer.allow_methods(methods).allow_headers(allow_headers))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
