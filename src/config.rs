//! Configuration module
//!
//! Everything is environment-driven with sane defaults, assembled once at
//! startup into one `AppConfig` and threaded into the services as typed
//! sub-configs.

use std::time::Duration;

use crate::application::bloom::BloomConfig;
use crate::application::discovery::DiscoveryConfig;
use crate::application::listing::ListingConfig;
use crate::application::otp::OtpConfig;
use crate::application::phone_cache::PhoneCacheConfig;
use crate::application::sms_queue::SmsQueueConfig;
use crate::infrastructure::crypto::jwt::JwtConfig;
use crate::infrastructure::database::DatabaseConfig;

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: u64) -> Duration {
    Duration::from_secs(env_parse(key, default))
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            host: env_string("SERVER_HOST", "0.0.0.0"),
            port: env_parse("SERVER_PORT", 8080),
            shutdown_timeout_secs: env_parse("SHUTDOWN_TIMEOUT_SECONDS", 30),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Application configuration
#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub otp: OtpConfig,
    pub bloom: BloomConfig,
    pub phone_cache: PhoneCacheConfig,
    pub sms_queue: SmsQueueConfig,
    pub discovery: DiscoveryConfig,
    pub listing: ListingConfig,
    pub worker_concurrency: usize,
    pub populate_geo_index: bool,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let otp = OtpConfig {
            length: env_parse("OTP_LENGTH", 6),
            ttl: env_secs("OTP_TTL_SECONDS", 300),
            max_verify_attempts: env_parse("OTP_MAX_VERIFY_ATTEMPTS", 5),
            cooldown: env_secs("OTP_COOLDOWN_SECONDS", 60),
            hour_limit: env_parse("OTP_HOUR_LIMIT", 10),
            day_limit: env_parse("OTP_DAY_LIMIT", 20),
            ip_limit_10min: env_parse("OTP_IP_LIMIT_10MIN", 100),
            lock_duration: env_secs("OTP_LOCK_SECONDS", 900),
            hmac_secret: env_string("HMAC_SECRET", "otp-hmac-secret-change-in-production"),
            default_country: env_string("DEFAULT_COUNTRY_CODE", "IN"),
            ..OtpConfig::default()
        };

        let bloom = BloomConfig {
            expected_elements: env_parse("BLOOM_EXPECTED_PHONES", 10_000_000),
            error_rate: env_parse("BLOOM_ERROR_RATE", 0.001),
            refresh_hours: env_parse("BLOOM_REFRESH_HOURS", 24),
        };

        let phone_cache = PhoneCacheConfig {
            positive_ttl: env_secs("PHONE_CACHE_TTL_SECONDS", 86400),
            negative_ttl: env_secs("PHONE_NEGATIVE_CACHE_TTL", 300),
        };

        let listing = ListingConfig {
            asset_base_url: env_string("ASSET_BASE_URL", "https://assets.voltra.energy"),
            ..ListingConfig::default()
        };

        Self {
            server: ServerConfig::from_env(),
            database: DatabaseConfig::from_env(),
            jwt: JwtConfig::from_env(),
            otp,
            bloom,
            phone_cache,
            sms_queue: SmsQueueConfig::default(),
            discovery: DiscoveryConfig::default(),
            listing,
            worker_concurrency: env_parse("WORKER_CONCURRENCY", 10),
            populate_geo_index: env_bool("POPULATE_GEO_INDEX", false),
            log_level: env_string("LOG_LEVEL", "info"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_platform_contract() {
        let config = AppConfig::from_env();
        assert_eq!(config.otp.length, 6);
        assert_eq!(config.otp.ttl, Duration::from_secs(300));
        assert_eq!(config.otp.hour_limit, 10);
        assert_eq!(config.otp.day_limit, 20);
        assert_eq!(config.bloom.expected_elements, 10_000_000);
        assert_eq!(config.phone_cache.negative_ttl, Duration::from_secs(300));
        assert_eq!(config.worker_concurrency, 10);
        assert!(!config.populate_geo_index);
    }
}
