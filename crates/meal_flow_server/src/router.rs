//! Router construction for the meal fulfillment server.

use axum::{
    middleware as axum_mw,
    routing::{get, patch},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::jwt::{jwt_auth, JwtConfig};
use crate::state::AppState;

/// Build the full axum router with all routes and middleware.
pub fn build_router(state: AppState, jwt_config: JwtConfig) -> Router {
    // Every /api route requires a bearer token; role checks happen in core.
    let protected = Router::new()
        .route(
            "/api/diet-charts",
            get(handlers::charts::list).post(handlers::charts::create),
        )
        .route(
            "/api/diet-charts/:id",
            get(handlers::charts::get)
                .patch(handlers::charts::update)
                .delete(handlers::charts::delete),
        )
        .route("/api/diet-charts/:id/audit", get(handlers::charts::audit))
        .route(
            "/api/diet-charts/:id/meals/:meal_id",
            patch(handlers::charts::update_meal_status),
        )
        .route("/api/tasks/pantry", get(handlers::tasks::pantry_queue))
        .route(
            "/api/tasks/pantry/completed",
            get(handlers::tasks::pantry_completed),
        )
        .route("/api/tasks/delivery", get(handlers::tasks::delivery_queue))
        .route(
            "/api/tasks/delivery/completed",
            get(handlers::tasks::delivery_completed),
        )
        .route("/api/tasks/stats", get(handlers::tasks::stats))
        .layer(axum_mw::from_fn(jwt_auth))
        .layer(Extension(jwt_config));

    let public = Router::new().route("/health", get(handlers::health::health));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
