//! Station aggregate

pub mod model;
pub mod repository;

pub use model::{haversine_km, is_along_route, Coordinates, Plug, Station};
pub use repository::StationRepository;
