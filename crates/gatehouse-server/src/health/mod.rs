//! Composite health of the gateway and its dependencies.
//!
//! Each check runs on its own task and all three always complete, so one
//! slow or failing dependency never hides the state of the others. A panic
//! inside a check is an aggregation fault, reported separately from a
//! dependency being down.

pub mod probe;

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use gatehouse_storage::UserStore;
use serde::Serialize;

use crate::cache::Cache;

pub use probe::DependencyProber;

/// State of one dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyStatus {
    Connected,
    Disconnected,
    Degraded,
}

impl DependencyStatus {
    pub fn is_connected(self) -> bool {
        self == DependencyStatus::Connected
    }
}

/// Overall state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatuses {
    pub store: DependencyStatus,
    pub cache: DependencyStatus,
    pub processing_service: DependencyStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: OverallStatus,
    pub services: ServiceStatuses,
}

impl HealthReport {
    pub fn from_services(services: ServiceStatuses) -> Self {
        let all_connected = services.store.is_connected()
            && services.cache.is_connected()
            && services.processing_service.is_connected();
        let status = if all_connected {
            OverallStatus::Healthy
        } else {
            OverallStatus::Degraded
        };
        Self { status, services }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.status {
            OverallStatus::Healthy => StatusCode::OK,
            OverallStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// The aggregation itself failed.
#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("{check} check did not complete: {reason}")]
    CheckAborted { check: &'static str, reason: String },
}

pub struct HealthAggregator {
    store: Arc<dyn UserStore>,
    cache: Arc<dyn Cache>,
    prober: DependencyProber,
}

impl HealthAggregator {
    pub fn new(store: Arc<dyn UserStore>, cache: Arc<dyn Cache>, prober: DependencyProber) -> Self {
        Self {
            store,
            cache,
            prober,
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn check(&self) -> Result<HealthReport, HealthError> {
        let start = Instant::now();

        let store = Arc::clone(&self.store);
        let store_check = tokio::spawn(async move {
            if store.is_ready().await {
                DependencyStatus::Connected
            } else {
                DependencyStatus::Disconnected
            }
        });

        let cache = Arc::clone(&self.cache);
        let cache_check = tokio::spawn(async move {
            match cache.ping().await {
                Ok(()) => DependencyStatus::Connected,
                Err(e) => {
                    tracing::debug!(error = %e, "cache ping failed");
                    DependencyStatus::Disconnected
                }
            }
        });

        let prober = self.prober.clone();
        let processing_check = tokio::spawn(async move { prober.probe().await });

        let (store, cache, processing) = tokio::join!(store_check, cache_check, processing_check);

        let services = ServiceStatuses {
            store: joined("store", store)?,
            cache: joined("cache", cache)?,
            processing_service: joined("processingService", processing)?,
        };

        crate::metrics::set_dependency_up("store", services.store.is_connected());
        crate::metrics::set_dependency_up("cache", services.cache.is_connected());
        crate::metrics::set_dependency_up(
            "processingService",
            services.processing_service.is_connected(),
        );

        let report = HealthReport::from_services(services);
        tracing::debug!(
            status = ?report.status,
            duration_ms = start.elapsed().as_millis(),
            "health check completed"
        );
        Ok(report)
    }
}

fn joined(
    check: &'static str,
    result: Result<DependencyStatus, tokio::task::JoinError>,
) -> Result<DependencyStatus, HealthError> {
    result.map_err(|e| HealthError::CheckAborted {
        check,
        reason: e.to_string(),
    })
}
