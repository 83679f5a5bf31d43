//! Vehicle/pairing endpoint handlers

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};

use super::dto::{PairBody, PairedDevicesQuery, VehiclesQuery};
use crate::application::listing::{
    ListParams, ListingPage, PairedDeviceListingService, VehicleListParams, VehiclesPage,
};
use crate::application::pairing::{PairRequest, PairingService};
use crate::domain::pairing::PairingOutcome;
use crate::interfaces::http::common::{ApiError, ApiResponse, ValidatedJson};
use crate::interfaces::http::middleware::AuthenticatedUser;

#[derive(Clone)]
pub struct VehicleHandlerState {
    pub pairing: Arc<PairingService>,
    pub listing: Arc<PairedDeviceListingService>,
}

/// `POST /api/v1/vehicles/pair` (bearer auth)
///
/// 201 for a new pairing, 200 for a refresh or an idempotent replay.
pub async fn pair(
    State(state): State<VehicleHandlerState>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<PairBody>,
) -> Result<(StatusCode, Json<ApiResponse<PairingOutcome>>), ApiError> {
    let idempotency_key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let outcome = state
        .pairing
        .pair(PairRequest {
            user_id: user.user_id,
            chassis_number: body.chassis_number,
            reg_number: body.reg_number,
            bluetooth_mac: body.bluetooth_mac,
            vehicle_static: body.vehicle_static,
            idempotency_key,
        })
        .await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let message = if outcome.idempotent_replay {
        "Pairing already completed"
    } else if outcome.created {
        "Vehicle paired"
    } else {
        "Pairing refreshed"
    };

    Ok((status, Json(ApiResponse::success(message, outcome))))
}

fn parse_includes(raw: Option<&str>) -> (bool, bool) {
    let mut vehicle = false;
    let mut latest_status = false;
    if let Some(raw) = raw {
        for part in raw.split(',') {
            match part.trim() {
                "vehicle" => vehicle = true,
                "latest_status" => latest_status = true,
                _ => {}
            }
        }
    }
    (vehicle, latest_status)
}

/// `GET /api/v1/vehicles/paired-devices` (bearer auth)
///
/// Totals are mirrored in `X-Total-Active` / `X-Total-All` headers.
pub async fn paired_devices(
    State(state): State<VehicleHandlerState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<PairedDevicesQuery>,
) -> Result<Response, ApiError> {
    let (include_vehicle, include_latest_status) = parse_includes(query.include.as_deref());

    let page: ListingPage = state
        .listing
        .list(&ListParams {
            user_id: user.user_id,
            active: query.active,
            include_vehicle,
            include_latest_status,
            limit: query.limit,
            cursor: query.cursor,
            sort: query.sort,
        })
        .await?;

    let total_active = page.total_active;
    let total_all = page.total_all;

    let mut response = Json(ApiResponse::success("Paired devices", page)).into_response();
    let headers = response.headers_mut();
    headers.insert("X-Total-Active", total_active.into());
    headers.insert("X-Total-All", total_all.into());
    Ok(response)
}

/// `GET /api/v1/vehicles/all` (bearer auth)
pub async fn all_vehicles(
    State(state): State<VehicleHandlerState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<VehiclesQuery>,
) -> Result<Json<ApiResponse<VehiclesPage>>, ApiError> {
    let page = state
        .listing
        .list_vehicles(&VehicleListParams {
            user_id: user.user_id,
            active: query.active,
            limit: query.limit,
            cursor: query.cursor,
            sort: query.sort,
            selected_vehicle_id: query.selected_vehicle_id,
        })
        .await?;

    Ok(Json(ApiResponse::success("Vehicles", page)))
}
