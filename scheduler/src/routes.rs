use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the application router with all routes and middleware
#[tracing::instrument(skip(state))]
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/info", get(handlers::health::info))
        .route("/api/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::prometheus_metrics))
        .route("/api/metrics", get(handlers::metrics::scheduler_metrics))
        // Job management endpoints
        .route(
            "/api/jobs",
            post(handlers::jobs::create_job).get(handlers::jobs::list_jobs),
        )
        .route(
            "/api/jobs/:id",
            get(handlers::jobs::get_job)
                .put(handlers::jobs::update_job)
                .delete(handlers::jobs::delete_job),
        )
        // Execution history endpoints
        .route(
            "/api/jobs/:id/executions",
            get(handlers::executions::list_job_executions),
        )
        .route(
            "/api/executions",
            get(handlers::executions::list_executions),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
