//! HTTP handlers for the KPI server

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use retail_kpi::error::{ComputeError, WarehouseError};
use retail_kpi::observability::PrometheusExporter;
use retail_kpi::{Error, FilterSet, KpiService, OverviewMetrics, RawFilter};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Shared application state
pub struct AppState {
    pub service: KpiService,
    pub exporter: PrometheusExporter,
    pub enable_metrics: bool,
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    cache_backend: &'static str,
    cache_ready: bool,
}

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<OverviewMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    success: bool,
    section: String,
    removed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

// =============================================================================
// Health & Metrics Handlers
// =============================================================================

/// Health check endpoint. A cache outage degrades but does not fail it.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let cache_ready = state.service.cache_ready();
    Json(HealthResponse {
        status: if cache_ready { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        cache_backend: state.service.cache_backend(),
        cache_ready,
    })
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if !state.enable_metrics {
        return (StatusCode::NOT_FOUND, [(header::CONTENT_TYPE, "text/plain")], String::new());
    }
    let (body, content_type) = state.exporter.export_http();
    (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body)
}

// =============================================================================
// KPI Handlers
// =============================================================================

/// Overview with filters from the query string (`?brand=a,b&startDate=...`)
pub async fn overview_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    overview(&state, FilterSet::from_query_params(&params)).await
}

/// Overview with filters from a JSON body (`{"brand": ["a", "b"]}`)
pub async fn overview_post(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<HashMap<String, RawFilter>>,
) -> impl IntoResponse {
    overview(&state, FilterSet::from_raw(&raw)).await
}

async fn overview(state: &AppState, filters: FilterSet) -> (StatusCode, Json<OverviewResponse>) {
    // Cancelled when the client goes away and axum drops this future
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match state.service.overview(&filters, &cancel).await {
        Ok(data) => (
            StatusCode::OK,
            Json(OverviewResponse {
                success: true,
                data: Some(data),
                error: None,
            }),
        ),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!(error = %e, "Overview computation failed");
            } else {
                warn!(error = %e, "Overview request not completed");
            }
            (
                status,
                Json(OverviewResponse {
                    success: false,
                    data: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// Drop every cached entry of a section
pub async fn invalidate_cache(
    State(state): State<Arc<AppState>>,
    Path(section): Path<String>,
) -> impl IntoResponse {
    match state.service.invalidate_section(&section).await {
        Ok(removed) => {
            info!(section = %section, removed, "Cache section invalidated via API");
            (
                StatusCode::OK,
                Json(InvalidateResponse {
                    success: true,
                    section,
                    removed,
                    error: None,
                }),
            )
        }
        Err(e) => {
            error!(section = %section, error = %e, "Cache invalidation failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(InvalidateResponse {
                    success: false,
                    section,
                    removed: 0,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// HTTP status for a failed request
fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Compute(ComputeError::Warehouse(WarehouseError::Timeout(_))) => {
            StatusCode::GATEWAY_TIMEOUT
        }
        Error::Compute(ComputeError::Warehouse(_)) => StatusCode::BAD_GATEWAY,
        Error::InvalidWindow(_) => StatusCode::BAD_REQUEST,
        Error::Cancelled => StatusCode::REQUEST_TIMEOUT,
        Error::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
