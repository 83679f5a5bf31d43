//! OTP aggregate
//!
//! OTP records, session/token records, and the audit event vocabulary.

pub mod model;
pub mod repository;

pub use model::{
    AuditEventType, OtpAuditEntry, OtpRecord, RefreshRecord, Session, TokenPair,
};
pub use repository::OtpAuditRepository;
