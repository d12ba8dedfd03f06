use axum::Json;

use chronicle_shared::types::HealthResponse;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy(
        "chronicle-auth",
        env!("CARGO_PKG_VERSION"),
    ))
}
