use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::{ingress_auth_middleware, metrics_middleware};
use super::{handlers, orders, products};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Calls from the commerce host, guarded by the ingress key
    let ingress_routes = Router::new()
        // Order events
        .route("/orders/sync", post(orders::sync_order))
        .route("/orders/status", post(orders::change_status))
        .route("/orders/campaign", post(orders::change_campaign))
        .route("/orders/source", post(orders::change_source))
        .route("/orders/{id}/correlation", get(orders::get_correlation))
        // Product mappings
        .route(
            "/products/{id}/mapping",
            get(products::get_product_mapping)
                .put(products::put_product_mapping)
                .delete(products::delete_product_mapping),
        )
        .route(
            "/variations/{id}/mapping",
            get(products::get_variation_mapping)
                .put(products::put_variation_mapping)
                .delete(products::delete_variation_mapping),
        )
        // CRM lookups
        .route("/cache/invalidate", post(handlers::invalidate_cache))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            ingress_auth_middleware,
        ));

    // API routes
    let api_routes = Router::new()
        // Health, config and metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::get_metrics))
        .merge(ingress_routes)
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
