//! Liveness reporting.
//!
//! The handshake has no downstream dependencies at request time (the
//! provider is only reached by the browser), so liveness is the whole story.

use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Serving requests.
    Healthy,
}

/// Liveness check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResult {
    /// Status.
    pub status: HealthStatus,

    /// Timestamp (RFC 3339).
    pub timestamp: String,

    /// Uptime in seconds.
    pub uptime_secs: u64,

    /// Configured provider host.
    pub provider: String,

    /// Crate version.
    pub version: String,
}

/// `GET /health`
pub async fn liveness(State(state): State<AppState>) -> Json<LivenessResult> {
    Json(LivenessResult {
        status: HealthStatus::Healthy,
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        provider: state.client.config().provider_host.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&HealthStatus::Healthy).unwrap();
        assert_eq!(json, "\"healthy\"");
    }
}
