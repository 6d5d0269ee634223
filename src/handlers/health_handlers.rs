//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that reports cache reachability

use crate::services::listing_service::ListingService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that pings the cache store. A degraded cache is reported
/// but does not fail readiness: listing still works, just uncached, so the
/// instance can keep taking traffic.
pub async fn readyz(State(service): State<ListingService>) -> impl IntoResponse {
    let cache_ok = service.cache_healthy().await;

    let mut checks = HashMap::new();
    checks.insert(
        "cache",
        CheckStatus {
            ok: cache_ok,
            error: (!cache_ok).then(|| "cache disabled or unreachable, serving uncached".into()),
        },
    );

    let body = ReadyResponse {
        status: if cache_ok {
            "ok".into()
        } else {
            "degraded".into()
        },
        checks,
    };

    (StatusCode::OK, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
