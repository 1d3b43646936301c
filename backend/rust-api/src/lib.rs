use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::PortalError;
pub use services::AppState;

/// Adds a Content-Security-Policy header to every response
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    response
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/v1/papers", papers_routes(app_state.clone()))
        .nest("/api/v1/mock-tests", mock_test_routes())
        .route("/api/v1/stats", get(handlers::stats::dashboard_stats))
        .nest("/api/v1/admission", admission_routes())
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn papers_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let max_upload_bytes = app_state.config.max_upload_bytes;

    // Only the upload is gated; listing stays public on the same path and
    // unmatched methods still fall through to 405
    let upload = post(handlers::papers::upload_paper)
        .route_layer(DefaultBodyLimit::max(max_upload_bytes))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::admission::admission_guard_middleware,
        ));

    Router::new()
        .route("/", get(handlers::papers::list_papers).merge(upload))
        .route("/featured", get(handlers::papers::featured_papers))
        .route("/{id}", get(handlers::papers::get_paper))
        .route("/{id}/download", post(handlers::papers::download_paper))
}

fn mock_test_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::mock_tests::list_mock_tests))
        .route("/{id}", get(handlers::mock_tests::get_mock_test))
        .route("/{id}/start", post(handlers::mock_tests::start_mock_test))
}

fn admission_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(handlers::admission::login))
        .route("/logout", post(handlers::admission::logout))
        .route("/status", get(handlers::admission::status))
}
