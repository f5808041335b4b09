pub mod health;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub use health::HealthState;

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
