//! Readiness handler backed by a real database ping.

use crate::state::AppState;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use axum_helpers::server::{HealthCheckFuture, run_health_checks};

/// `GET /ready`: 200 when PostgreSQL answers, 503 otherwise.
///
/// The event bus subscriber count is reported alongside for operators
/// watching the SSE feed.
pub async fn ready_handler(State(state): State<AppState>) -> Response {
    let checks: Vec<(&str, HealthCheckFuture<'_>)> = vec![(
        "database",
        Box::pin(async {
            database::postgres::check_health(&state.db)
                .await
                .map_err(|e| format!("Database ping failed: {}", e))
        }),
    )];

    let (status, axum::Json(mut body)) = run_health_checks(checks).await;
    body["event_subscribers"] = serde_json::json!(state.events.subscriber_count());
    (status, axum::Json(body)).into_response()
}
