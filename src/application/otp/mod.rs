//! OTP authentication core services

pub mod service;
pub mod session;

pub use service::{OtpConfig, OtpRequestAccepted, OtpService, RequestContext, VerifiedLogin};
pub use session::{RefreshedAccess, SessionService};
