//! API router

use std::sync::Arc;

use axum::extract::FromRef;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::application::discovery::StationDiscoveryService;
use crate::application::listing::PairedDeviceListingService;
use crate::application::otp::{OtpService, SessionService};
use crate::application::pairing::PairingService;
use crate::infrastructure::kv::KvStore;
use crate::interfaces::http::middleware::{auth_middleware, AuthState};
use crate::interfaces::http::modules::{health, metrics, otp, stations, vehicles};

/// Unified state for the whole API. Handlers extract their module state
/// via `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub otp: Arc<OtpService>,
    pub sessions: Arc<SessionService>,
    pub discovery: Arc<StationDiscoveryService>,
    pub pairing: Arc<PairingService>,
    pub listing: Arc<PairedDeviceListingService>,
    pub db: DatabaseConnection,
    pub kv: Arc<dyn KvStore>,
    pub prometheus: PrometheusHandle,
}

// -- FromRef implementations so each handler keeps its own State<T> --

impl FromRef<AppState> for otp::OtpHandlerState {
    fn from_ref(s: &AppState) -> Self {
        otp::OtpHandlerState {
            otp: Arc::clone(&s.otp),
            sessions: Arc::clone(&s.sessions),
        }
    }
}

impl FromRef<AppState> for stations::StationHandlerState {
    fn from_ref(s: &AppState) -> Self {
        stations::StationHandlerState {
            discovery: Arc::clone(&s.discovery),
        }
    }
}

impl FromRef<AppState> for vehicles::VehicleHandlerState {
    fn from_ref(s: &AppState) -> Self {
        vehicles::VehicleHandlerState {
            pairing: Arc::clone(&s.pairing),
            listing: Arc::clone(&s.listing),
        }
    }
}

impl FromRef<AppState> for health::HealthHandlerState {
    fn from_ref(s: &AppState) -> Self {
        health::HealthHandlerState {
            db: s.db.clone(),
            kv: Arc::clone(&s.kv),
        }
    }
}

impl FromRef<AppState> for metrics::MetricsHandlerState {
    fn from_ref(s: &AppState) -> Self {
        metrics::MetricsHandlerState {
            handle: s.prometheus.clone(),
        }
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(s: &AppState) -> Self {
        AuthState {
            sessions: Arc::clone(&s.sessions),
        }
    }
}

/// Build the REST API router.
pub fn create_api_router(state: AppState) -> Router {
    let auth_state = AuthState::from_ref(&state);

    let public = Router::new()
        .route("/otp/request", post(otp::handlers::request_otp))
        .route("/otp/verify", post(otp::handlers::verify_otp))
        .route("/otp/refresh", post(otp::handlers::refresh_token))
        .route("/otp/logout", post(otp::handlers::logout))
        .route("/otp/resend", post(otp::handlers::resend_otp))
        .route("/stations/find", post(stations::handlers::find_stations))
        .route("/stations/nearby", post(stations::handlers::nearby_stations));

    let protected = Router::new()
        .route("/vehicles/pair", post(vehicles::handlers::pair))
        .route(
            "/vehicles/paired-devices",
            get(vehicles::handlers::paired_devices),
        )
        .route("/vehicles/all", get(vehicles::handlers::all_vehicles))
        .route_layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", public.merge(protected))
        .route("/health", get(health::handlers::health))
        .route("/metrics", get(metrics::handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
