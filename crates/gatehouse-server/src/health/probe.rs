//! Liveness probe for the external processing service.

use std::time::Duration;

use serde::Deserialize;

use super::DependencyStatus;

/// Shape of the dependency's `/health` body; only `status` matters.
#[derive(Debug, Deserialize)]
struct RemoteHealth {
    status: Option<String>,
}

/// Issues a bounded-time `GET {base}/health` and classifies the answer.
#[derive(Debug, Clone)]
pub struct DependencyProber {
    client: reqwest::Client,
    health_url: String,
    timeout: Duration,
}

impl DependencyProber {
    pub fn new(client: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            health_url: format!("{}/health", base_url.trim_end_matches('/')),
            timeout,
        }
    }

    pub fn health_url(&self) -> &str {
        &self.health_url
    }

    /// - 2xx with `status == "healthy"` → `Connected`
    /// - 2xx with any other (or no) status → `Degraded`
    /// - error status, connect failure or timeout → `Disconnected`
    pub async fn probe(&self) -> DependencyStatus {
        let response = match self
            .client
            .get(&self.health_url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(
                    url = %self.health_url,
                    timeout = e.is_timeout(),
                    error = %e,
                    "processing service health probe failed"
                );
                crate::metrics::record_downstream("processing_health", "unreachable");
                return DependencyStatus::Disconnected;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(
                url = %self.health_url,
                status = %response.status(),
                "processing service health probe returned error status"
            );
            crate::metrics::record_downstream("processing_health", "error_status");
            return DependencyStatus::Disconnected;
        }

        let status = match response.json::<RemoteHealth>().await {
            Ok(RemoteHealth {
                status: Some(status),
            }) if status == "healthy" => DependencyStatus::Connected,
            Ok(body) => {
                tracing::debug!(status = ?body.status, "processing service reports non-healthy status");
                DependencyStatus::Degraded
            }
            Err(e) => {
                tracing::debug!(error = %e, "processing service health body unreadable");
                DependencyStatus::Degraded
            }
        };

        let outcome = match status {
            DependencyStatus::Connected => "ok",
            _ => "degraded",
        };
        crate::metrics::record_downstream("processing_health", outcome);
        status
    }
}
