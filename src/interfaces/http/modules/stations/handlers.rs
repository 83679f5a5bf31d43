//! Station endpoint handlers

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use super::dto::{FindStationsBody, NearbyBody};
use crate::application::discovery::{
    DiscoveryRequest, NearbyResult, RouteOptimizedResponse, StationDiscoveryService,
};
use crate::domain::station::Coordinates;
use crate::domain::vehicle::canonical_reg_number;
use crate::interfaces::http::common::{ApiError, ApiResponse, ValidatedJson};

#[derive(Clone)]
pub struct StationHandlerState {
    pub discovery: Arc<StationDiscoveryService>,
}

/// `POST /api/v1/stations/find`
pub async fn find_stations(
    State(state): State<StationHandlerState>,
    ValidatedJson(body): ValidatedJson<FindStationsBody>,
) -> Result<Json<ApiResponse<RouteOptimizedResponse>>, ApiError> {
    let request = DiscoveryRequest {
        reg_number: canonical_reg_number(&body.reg_number),
        battery_percentage: body.battery_percentage,
        user_location: Coordinates::new(body.user_location.lat, body.user_location.lng),
        destination: body
            .destination
            .map(|loc| Coordinates::new(loc.lat, loc.lng)),
    };

    let response = state.discovery.find_stations(&request).await?;
    Ok(Json(ApiResponse::success("Stations found", response)))
}

/// `POST /api/v1/stations/nearby`
pub async fn nearby_stations(
    State(state): State<StationHandlerState>,
    ValidatedJson(body): ValidatedJson<NearbyBody>,
) -> Result<Json<ApiResponse<Vec<NearbyResult>>>, ApiError> {
    let results = state
        .discovery
        .find_nearby(
            Coordinates::new(body.user_location.lat, body.user_location.lng),
            body.radius_km,
        )
        .await?;

    Ok(Json(ApiResponse::success("Nearby stations", results)))
}
