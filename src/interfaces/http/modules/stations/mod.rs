//! Station discovery endpoints

pub mod dto;
pub mod handlers;

pub use handlers::StationHandlerState;
