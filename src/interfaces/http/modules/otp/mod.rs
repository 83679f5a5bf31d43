//! OTP authentication endpoints

pub mod dto;
pub mod handlers;

pub use handlers::OtpHandlerState;
