//! Application layer - service orchestration over the storage adapters

pub mod audit;
pub mod bloom;
pub mod discovery;
pub mod geo;
pub mod listing;
pub mod otp;
pub mod pairing;
pub mod phone_cache;
pub mod rate_limit;
pub mod sms_queue;

#[cfg(test)]
pub(crate) mod test_support;

pub use audit::AuditLogger;
pub use bloom::{BloomConfig, PhoneExistenceFilter};
pub use discovery::{DiscoveryConfig, DiscoveryRequest, StationDiscoveryService};
pub use geo::StationGeoIndex;
pub use listing::{ListingConfig, PairedDeviceListingService};
pub use otp::{OtpConfig, OtpService, RequestContext, SessionService};
pub use pairing::{PairRequest, PairingService};
pub use phone_cache::{PhoneCacheConfig, PhoneVerificationCache};
pub use rate_limit::RateLimiter;
pub use sms_queue::{SmsQueue, SmsQueueConfig, SmsWorker};
