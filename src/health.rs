use axum::{extract::State, Json};
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub database: &'static str,
}

/// Liveness plus a database reachability probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match sqlx::query("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(HealthResponse {
        status: "ok",
        timestamp: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        database,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_shape() {
        let response = HealthResponse {
            status: "ok",
            timestamp: "2026-01-01T00:00:00Z".into(),
            uptime_secs: 12,
            database: "connected",
        };
        let json: serde_json::Value = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["uptime_secs"], 12);
        assert_eq!(json["database"], "connected");
        assert!(json["timestamp"].is_string());
    }
}
