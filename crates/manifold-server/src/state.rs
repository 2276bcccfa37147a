//! Shared state accessible from axum handlers.

use std::sync::Arc;

use manifold_auth::{Authenticator, GatewayKeyStore, RouteTable};
use manifold_gateway::Gateway;

use crate::config::GatewayConfig;
use crate::stats::RequestStats;

/// Everything the handlers need, cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    /// The request pipeline.
    pub gateway: Arc<Gateway>,
    /// Principal derivation and login flow.
    pub authenticator: Arc<Authenticator>,
    /// Gateway-key management (admin surface).
    pub keys: Arc<GatewayKeyStore>,
    /// The route-permission table.
    pub route_table: Arc<RouteTable>,
    /// Request counters for `/health`.
    pub stats: Arc<RequestStats>,
    /// Loaded configuration.
    pub config: Arc<GatewayConfig>,
}
