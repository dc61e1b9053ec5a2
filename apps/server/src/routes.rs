//! HTTP routes and middleware stack.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use enrichkit_shared::{
    AuditQuery, AuditRecord, BatchRequest, BatchResult, CompletionQuery, CompletionRecord,
    EnrichKitError, LogRequest,
};

use crate::error::ApiResult;
use crate::state::AppState;

/// Build the application router with CORS and request tracing.
pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/scrape-batch", post(scrape_batch))
        .route("/log-enrichment", post(log_enrichment))
        .route("/enrichment-logs", get(enrichment_logs))
        .route("/step-completions", get(step_completions))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        // CorsLayer answers every OPTIONS request itself
        .layer(middleware::map_response(preflight_no_content))
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            CONTENT_TYPE,
        ])
}

async fn preflight_no_content(method: Method, mut response: Response) -> Response {
    if method == Method::OPTIONS && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    database: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.logger().await {
        Ok(logger) => match logger.store().ping().await {
            Ok(()) => "connected",
            Err(e) => {
                warn!(error = %e, "audit database ping failed");
                "unavailable"
            }
        },
        Err(EnrichKitError::Config { .. }) => "unconfigured",
        Err(e) => {
            warn!(error = %e, "audit database could not be opened");
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}

async fn scrape_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> ApiResult<Json<BatchResult>> {
    let Json(request) = payload?;
    request.validate()?;

    let result = state.runner()?.run(&request).await?;
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
struct LogResponse {
    success: bool,
    log_id: String,
}

async fn log_enrichment(
    State(state): State<AppState>,
    payload: Result<Json<LogRequest>, JsonRejection>,
) -> ApiResult<Json<LogResponse>> {
    let Json(request) = payload?;
    let entry = request.validate()?;

    let receipt = state.logger().await?.log_entry(entry).await?;
    Ok(Json(LogResponse {
        success: true,
        log_id: receipt.log_id,
    }))
}

async fn enrichment_logs(
    State(state): State<AppState>,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<AuditRecord>>> {
    let Query(query) = query?;
    let records = state.logger().await?.store().list_audit_records(&query).await?;
    Ok(Json(records))
}

async fn step_completions(
    State(state): State<AppState>,
    query: Result<Query<CompletionQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<CompletionRecord>>> {
    let Query(query) = query?;
    let records = state.logger().await?.store().list_completions(&query).await?;
    Ok(Json(records))
}
