use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::geocode::GeocodeError;
use crate::geometry::Point;
use crate::resolve::{ResolutionResult, ResolveError};
use crate::streets::StreetRange;
use crate::zones::{
    CoverageZone, Forwarded, RefreshSummary, StoreError, Subsidiary, SyncOutcome, ZoneDraft,
    ZoneStore,
};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Conflict { .. } => StatusCode::CONFLICT,
        StoreError::Remote(_) | StoreError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        StoreError::CacheWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_store_error(e: StoreError) -> ApiError {
    ApiError(store_status(&e), e.to_string())
}

fn api_geocode_error(e: GeocodeError) -> ApiError {
    let status = match &e {
        GeocodeError::NotFound(_) => StatusCode::NOT_FOUND,
        GeocodeError::Provider(_) | GeocodeError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
    };
    ApiError(status, e.to_string())
}

fn api_resolve_error(e: ResolveError) -> ApiError {
    match e {
        ResolveError::Geocode(g) => api_geocode_error(g),
        ResolveError::Store(s) => api_store_error(s),
    }
}

/// Pick the allow-listed passthrough headers off the inbound request.
fn forwarded_from(headers: &HeaderMap) -> Forwarded {
    Forwarded::collect(|name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    })
}

fn log_request(method: &str, path: &str, note: &str, start: Instant) {
    eprintln!(
        "[{}] {} {} -> {} ({:.1}ms)",
        Utc::now().format("%H:%M:%S"),
        method,
        path,
        note,
        start.elapsed().as_secs_f64() * 1000.0,
    );
}

// ─── GET /api/subsidiaries ───────────────────────────────────────

pub async fn subsidiaries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Subsidiary>>, ApiError> {
    let start = Instant::now();
    let fwd = forwarded_from(&headers);
    let list = state
        .remote
        .list_subsidiaries(&fwd)
        .map_err(api_store_error)?;
    log_request("GET", "/api/subsidiaries", &format!("{} subsidiaries", list.len()), start);
    Ok(Json(list))
}

// ─── GET /api/zones/{subsidiary_id} ──────────────────────────────

pub async fn zones_by_subsidiary(
    State(state): State<Arc<AppState>>,
    Path(subsidiary_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Vec<CoverageZone>>, ApiError> {
    let start = Instant::now();
    let fwd = forwarded_from(&headers);
    let zones = state
        .remote
        .list_zones(subsidiary_id, &fwd)
        .map_err(api_store_error)?;
    log_request(
        "GET",
        &format!("/api/zones/{}", subsidiary_id),
        &format!("{} zones", zones.len()),
        start,
    );
    Ok(Json(zones))
}

// ─── POST /api/geocode ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct GeocodeRequest {
    pub address: String,
}

#[derive(Serialize)]
pub struct GeocodeResponse {
    pub address: String,
    pub coordinate: Point,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub house_number: Option<u32>,
}

pub async fn geocode(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GeocodeRequest>,
) -> Result<Json<GeocodeResponse>, ApiError> {
    let start = Instant::now();
    if req.address.trim().is_empty() {
        return Err(ApiError(StatusCode::BAD_REQUEST, "Missing 'address' field".into()));
    }
    let geocoded = state
        .engine
        .geocode(req.address.trim())
        .map_err(api_geocode_error)?;
    log_request("POST", "/api/geocode", &geocoded.display_name, start);
    Ok(Json(GeocodeResponse {
        address: geocoded.display_name,
        coordinate: geocoded.point,
        street: geocoded.street,
        house_number: geocoded.house_number,
    }))
}

// ─── POST /api/resolve ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct ResolveRequest {
    pub address: String,
    #[serde(default)]
    pub subsidiary_id: Option<i64>,
}

pub async fn resolve(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<ResolutionResult>, ApiError> {
    let start = Instant::now();
    if req.address.trim().is_empty() {
        return Err(ApiError(StatusCode::BAD_REQUEST, "Missing 'address' field".into()));
    }
    let fwd = forwarded_from(&headers);
    let result = state
        .engine
        .resolve(req.address.trim(), req.subsidiary_id, &fwd)
        .map_err(api_resolve_error)?;
    log_request(
        "POST",
        "/api/resolve",
        &format!("covered={} zones={}", result.covered, result.zones.len()),
        start,
    );
    Ok(Json(result))
}

// ─── POST /api/zones ─────────────────────────────────────────────

pub async fn create_zone(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(draft): Json<ZoneDraft>,
) -> Result<Json<SyncOutcome<CoverageZone>>, ApiError> {
    let start = Instant::now();
    let fwd = forwarded_from(&headers);
    let outcome = state
        .coordinator
        .lock()
        .unwrap()
        .create_zone(&draft, &fwd)
        .map_err(api_store_error)?;
    log_request(
        "POST",
        "/api/zones",
        &format!("zone {} state {:?}", outcome.value.id, outcome.state),
        start,
    );
    Ok(Json(outcome))
}

// ─── DELETE /api/zones ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct DeleteZoneRequest {
    pub subsidiary_id: i64,
    pub name: String,
}

pub async fn delete_zone(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<DeleteZoneRequest>,
) -> Result<Json<SyncOutcome<()>>, ApiError> {
    let start = Instant::now();
    let fwd = forwarded_from(&headers);
    let outcome = state
        .coordinator
        .lock()
        .unwrap()
        .delete_zone(req.subsidiary_id, &req.name, &fwd)
        .map_err(api_store_error)?;
    log_request(
        "DELETE",
        "/api/zones",
        &format!("'{}' state {:?}", req.name, outcome.state),
        start,
    );
    Ok(Json(outcome))
}

// ─── PUT /api/zones/{zone_id}/streets ────────────────────────────

pub async fn replace_streets(
    State(state): State<Arc<AppState>>,
    Path(zone_id): Path<i64>,
    headers: HeaderMap,
    Json(ranges): Json<Vec<StreetRange>>,
) -> Result<Json<SyncOutcome<()>>, ApiError> {
    let start = Instant::now();
    let fwd = forwarded_from(&headers);
    let outcome = state
        .coordinator
        .lock()
        .unwrap()
        .replace_street_ranges(zone_id, &ranges, &fwd)
        .map_err(api_store_error)?;
    log_request(
        "PUT",
        &format!("/api/zones/{}/streets", zone_id),
        &format!("{} ranges state {:?}", ranges.len(), outcome.state),
        start,
    );
    Ok(Json(outcome))
}

// ─── POST /api/sync, POST /api/sync/{subsidiary_id} ──────────────

#[derive(Serialize)]
pub struct SyncResponse {
    pub zones: usize,
}

pub async fn sync_all(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RefreshSummary>, ApiError> {
    let start = Instant::now();
    let fwd = forwarded_from(&headers);
    let summary = state
        .coordinator
        .lock()
        .unwrap()
        .refresh_all(&fwd)
        .map_err(api_store_error)?;
    log_request(
        "POST",
        "/api/sync",
        &format!("{} subsidiaries, {} zones", summary.subsidiaries, summary.zones),
        start,
    );
    Ok(Json(summary))
}

pub async fn sync_one(
    State(state): State<Arc<AppState>>,
    Path(subsidiary_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<SyncResponse>, ApiError> {
    let start = Instant::now();
    let fwd = forwarded_from(&headers);
    let zones = state
        .coordinator
        .lock()
        .unwrap()
        .refresh(subsidiary_id, &fwd)
        .map_err(api_store_error)?;
    log_request(
        "POST",
        &format!("/api/sync/{}", subsidiary_id),
        &format!("{} zones", zones),
        start,
    );
    Ok(Json(SyncResponse { zones }))
}
