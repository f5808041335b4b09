use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::reminder::EscalationRegistry;

/// What the health endpoint reports about the running process.
#[derive(Clone)]
pub struct HealthState {
    pub scheduler_enabled: bool,
    pub escalations: EscalationRegistry,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub scheduler: &'static str,
    pub armed_escalations: usize,
}

pub async fn health_check(State(state): State<HealthState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        scheduler: if state.scheduler_enabled {
            "running"
        } else {
            "disabled"
        },
        armed_escalations: state.escalations.len(),
    };

    (StatusCode::OK, Json(response))
}
