//! HTTP front end for the devopsbot automations.
//!
//! Each route accepts the event an upstream integration would deliver
//! (GitHub webhook, issue tracker notification, alarm state change, object
//! notification) and hands it to the matching step.

pub mod error;
pub mod routes;
pub mod services;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use services::Services;
pub use state::AppState;

/// Build the axum Router with all routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/review", post(routes::review::review_webhook))
        .route("/kanban/events", post(routes::automation::kanban_event))
        .route("/incident/alarms", post(routes::automation::alarm_event))
        .route(
            "/incident/reports/notify",
            post(routes::automation::report_notification),
        )
        .route("/incident/query", post(routes::automation::playbook_query))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `state` on `bind` until the process is stopped.
pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("devopsbot listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
