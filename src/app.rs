//! Router assembly and shared state.

use std::sync::Arc;

use axum::{Router, middleware as axum_middleware, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{auth::AuthGateway, handlers, middleware};

/// State shared with every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<AuthGateway>,
}

impl AppState {
    pub fn new(gateway: AuthGateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }
}

/// Build the HTTP router.
///
/// Routes under `/api/v1` pass through the auth middleware; `/health` is public.
pub fn router(state: AppState) -> Router {
    // Create authenticated routes (API endpoints)
    let authenticated_routes = Router::new()
        .route("/api/v1/whoami", get(handlers::whoami::whoami))
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .merge(authenticated_routes)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
