//! OTP lifecycle orchestration
//!
//! Request and verify flows per the platform auth contract. The
//! anti-enumeration rule is absolute: a request for an unregistered phone
//! produces the same accepted response shape as the happy path, pays the
//! same rate-limit costs, and dispatches nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use tracing::info;

use crate::application::audit::AuditLogger;
use crate::application::phone_cache::PhoneVerificationCache;
use crate::application::rate_limit::{LimitRule, RateDecision, RateLimiter};
use crate::application::sms_queue::SmsQueue;
use crate::domain::otp::{AuditEventType, OtpAuditEntry, OtpRecord, TokenPair};
use crate::domain::user::UserSummary;
use crate::domain::{DomainError, DomainResult, ErrorCode, RepositoryProvider};
use crate::infrastructure::crypto::otp::{generate_otp, otp_hmac, verify_otp_hmac};
use crate::infrastructure::kv::KvStore;
use crate::shared::validations::phone::normalize_phone;

use super::session::SessionService;

#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub length: usize,
    pub ttl: Duration,
    pub max_verify_attempts: u32,
    pub cooldown: Duration,
    pub hour_limit: i64,
    pub day_limit: i64,
    pub ip_limit_10min: i64,
    pub verify_phone_limit: i64,
    pub verify_phone_window: Duration,
    pub verify_ip_limit_10min: i64,
    pub lock_duration: Duration,
    pub hmac_secret: String,
    pub default_country: String,
    /// Base and cap of the post-failure progressive delay.
    pub failed_delay_base_ms: u64,
    pub failed_delay_cap_ms: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            length: 6,
            ttl: Duration::from_secs(300),
            max_verify_attempts: 5,
            cooldown: Duration::from_secs(60),
            hour_limit: 10,
            day_limit: 20,
            ip_limit_10min: 100,
            verify_phone_limit: 5,
            verify_phone_window: Duration::from_secs(300),
            verify_ip_limit_10min: 50,
            lock_duration: Duration::from_secs(900),
            hmac_secret: "otp-hmac-secret-change-in-production".to_string(),
            default_country: "IN".to_string(),
            failed_delay_base_ms: 1000,
            failed_delay_cap_ms: 16000,
        }
    }
}

/// Caller context forwarded into limits and audits.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// The 202 response of the request/resend flow. Both the happy path and
/// the anti-enumeration path produce this same shape.
#[derive(Debug, Clone)]
pub struct OtpRequestAccepted {
    pub message: &'static str,
}

/// Successful verification: the user plus a fresh token pair.
#[derive(Debug, Clone)]
pub struct VerifiedLogin {
    pub user: UserSummary,
    pub tokens: TokenPair,
}

fn otp_key(phone: &str) -> String {
    format!("otp:{phone}")
}

fn cooldown_key(phone: &str) -> String {
    format!("otp:cooldown:{phone}")
}

fn lock_key(phone: &str) -> String {
    format!("otp:lock:{phone}")
}

pub struct OtpService {
    kv: Arc<dyn KvStore>,
    limiter: Arc<RateLimiter>,
    phone_cache: Arc<PhoneVerificationCache>,
    audit: Arc<AuditLogger>,
    sessions: Arc<SessionService>,
    queue: Arc<SmsQueue>,
    repos: Arc<dyn RepositoryProvider>,
    config: OtpConfig,
}

impl OtpService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kv: Arc<dyn KvStore>,
        limiter: Arc<RateLimiter>,
        phone_cache: Arc<PhoneVerificationCache>,
        audit: Arc<AuditLogger>,
        sessions: Arc<SessionService>,
        queue: Arc<SmsQueue>,
        repos: Arc<dyn RepositoryProvider>,
        config: OtpConfig,
    ) -> Self {
        Self {
            kv,
            limiter,
            phone_cache,
            audit,
            sessions,
            queue,
            repos,
            config,
        }
    }

    fn request_rules(&self, phone: &str, ip: Option<&str>) -> Vec<LimitRule> {
        let mut rules = vec![
            LimitRule {
                key: format!("otp:rate:hour:{phone}"),
                limit: self.config.hour_limit,
                window: Duration::from_secs(3600),
                reason: "hourly_limit",
            },
            LimitRule {
                key: format!("otp:rate:day:{phone}"),
                limit: self.config.day_limit,
                window: Duration::from_secs(86400),
                reason: "daily_limit",
            },
        ];
        if let Some(ip) = ip {
            rules.push(LimitRule {
                key: format!("otp:ip:{ip}"),
                limit: self.config.ip_limit_10min,
                window: Duration::from_secs(600),
                reason: "ip_limit",
            });
        }
        rules
    }

    fn verify_rules(&self, phone: &str, ip: Option<&str>) -> Vec<LimitRule> {
        let mut rules = vec![LimitRule {
            key: format!("otp:verify:{phone}"),
            limit: self.config.verify_phone_limit,
            window: self.config.verify_phone_window,
            reason: "verify_phone_limit",
        }];
        if let Some(ip) = ip {
            rules.push(LimitRule {
                key: format!("otp:ip:verify:{ip}"),
                limit: self.config.verify_ip_limit_10min,
                window: Duration::from_secs(600),
                reason: "verify_ip_limit",
            });
        }
        rules
    }

    async fn audit_event(&self, phone: &str, event: AuditEventType, ctx: &RequestContext) {
        self.audit
            .log(
                OtpAuditEntry::new(phone, event)
                    .with_ip(ctx.ip.clone())
                    .with_user_agent(ctx.user_agent.clone()),
            )
            .await;
    }

    /// Request (or resend) an OTP. Returns 202-shaped acceptance whether
    /// or not the phone is registered.
    pub async fn request_otp(
        &self,
        raw_phone: &str,
        country_code: Option<&str>,
        ctx: &RequestContext,
    ) -> DomainResult<OtpRequestAccepted> {
        let country = country_code.unwrap_or(&self.config.default_country);
        let phone = match normalize_phone(raw_phone, country) {
            Ok(phone) => phone,
            Err(err) => {
                self.audit_event(raw_phone, AuditEventType::RequestInvalid, ctx)
                    .await;
                counter!("otp_requests_total", "outcome" => "invalid_phone").increment(1);
                return Err(err);
            }
        };

        if let Some(remaining) = self.limiter.in_cooldown(&cooldown_key(&phone)).await {
            self.audit_event(&phone, AuditEventType::RequestRateLimited, ctx)
                .await;
            counter!("otp_requests_total", "outcome" => "rate_limited").increment(1);
            return Err(DomainError::rate_limited(
                ErrorCode::PhoneRateLimitExceeded,
                "Please wait before requesting another code",
                remaining.as_secs().max(1),
            ));
        }

        let rules = self.request_rules(&phone, ctx.ip.as_deref());
        if let RateDecision::Limited {
            reason,
            retry_after,
        } = self.limiter.check_all(&rules).await
        {
            self.audit
                .log(
                    OtpAuditEntry::new(&phone, AuditEventType::RequestRateLimited)
                        .with_ip(ctx.ip.clone())
                        .with_user_agent(ctx.user_agent.clone())
                        .with_metadata(serde_json::json!({ "reason": reason })),
                )
                .await;
            counter!("otp_requests_total", "outcome" => "rate_limited").increment(1);
            let code = if reason == "ip_limit" {
                ErrorCode::RateLimitExceeded
            } else {
                ErrorCode::PhoneRateLimitExceeded
            };
            return Err(DomainError::rate_limited(
                code,
                "Too many OTP requests",
                retry_after.as_secs().max(1),
            ));
        }

        let existence = self.phone_cache.check_phone_exists(&phone).await;
        if !existence.exists {
            // Enumeration hardening: unregistered numbers pay the same
            // limits and get the same acceptance shape.
            self.audit_event(&phone, AuditEventType::RequestNonexistentPhone, ctx)
                .await;
            self.limiter
                .set_cooldown(&cooldown_key(&phone), self.config.cooldown)
                .await;
            self.limiter.apply_all(&rules).await;
            counter!("otp_requests_total", "outcome" => "nonexistent_phone").increment(1);
            return Ok(OtpRequestAccepted {
                message: "Phone number is not registered",
            });
        }

        let otp = generate_otp(self.config.length);
        let now = Utc::now();
        let record = OtpRecord {
            hmac: otp_hmac(&self.config.hmac_secret, &otp, &phone),
            created_at: now,
            attempts: 0,
            expires_at: now + chrono::Duration::from_std(self.config.ttl).unwrap_or_default(),
        };
        let record_json = serde_json::to_string(&record)
            .map_err(|e| DomainError::Internal(format!("OTP record encoding: {e}")))?;
        self.kv
            .setex(&otp_key(&phone), self.config.ttl, &record_json)
            .await?;

        self.limiter
            .set_cooldown(&cooldown_key(&phone), self.config.cooldown)
            .await;
        self.limiter.apply_all(&rules).await;

        let request_id = uuid::Uuid::new_v4().to_string();
        self.queue
            .enqueue(&phone, &otp, &request_id, ctx.ip.clone())
            .await?;

        self.audit
            .log(
                OtpAuditEntry::new(&phone, AuditEventType::Requested)
                    .with_ip(ctx.ip.clone())
                    .with_user_agent(ctx.user_agent.clone())
                    .with_metadata(serde_json::json!({
                        "request_id": request_id,
                        "existence_source": format!("{:?}", existence.source),
                    })),
            )
            .await;

        counter!("otp_requests_total", "outcome" => "requested").increment(1);
        info!(request_id, "OTP request accepted");
        Ok(OtpRequestAccepted {
            message: "OTP sent successfully",
        })
    }

    /// Verify a submitted OTP; on success mint tokens and mark the user
    /// verified.
    pub async fn verify_otp(
        &self,
        raw_phone: &str,
        provided_otp: &str,
        ctx: &RequestContext,
    ) -> DomainResult<VerifiedLogin> {
        let phone = match normalize_phone(raw_phone, &self.config.default_country) {
            Ok(phone) => phone,
            Err(err) => {
                self.audit_event(raw_phone, AuditEventType::VerifyInvalidPhone, ctx)
                    .await;
                return Err(err);
            }
        };

        // Account lock gate.
        if let Some(remaining) = self.limiter.in_cooldown(&lock_key(&phone)).await {
            self.audit_event(&phone, AuditEventType::VerifyLocked, ctx).await;
            return Err(DomainError::rate_limited(
                ErrorCode::AccountLocked,
                "Account temporarily locked due to repeated failures",
                remaining.as_secs().max(1),
            ));
        }

        let rules = self.verify_rules(&phone, ctx.ip.as_deref());
        if let RateDecision::Limited { retry_after, .. } = self.limiter.check_all(&rules).await {
            self.audit_event(&phone, AuditEventType::VerifyRateLimited, ctx)
                .await;
            return Err(DomainError::rate_limited(
                ErrorCode::RateLimitExceeded,
                "Too many verification attempts",
                retry_after.as_secs().max(1),
            ));
        }

        let key = otp_key(&phone);
        let Some(raw_record) = self.kv.get(&key).await? else {
            self.audit_event(&phone, AuditEventType::VerifyNotFound, ctx).await;
            return Err(DomainError::otp(
                ErrorCode::OtpNotFound,
                "No OTP was requested for this phone",
            ));
        };

        let mut record: OtpRecord = match serde_json::from_str(&raw_record) {
            Ok(record) => record,
            Err(_) => {
                self.kv.del(&key).await?;
                self.audit_event(&phone, AuditEventType::VerifyNotFound, ctx).await;
                return Err(DomainError::otp(
                    ErrorCode::OtpNotFound,
                    "No OTP was requested for this phone",
                ));
            }
        };

        let now = Utc::now();
        if record.is_expired(now) {
            self.kv.del(&key).await?;
            self.audit_event(&phone, AuditEventType::VerifyExpired, ctx).await;
            return Err(DomainError::otp(ErrorCode::OtpExpired, "OTP has expired"));
        }

        if record.attempts >= self.config.max_verify_attempts {
            return Err(self.lock_account(&phone, ctx).await);
        }

        // Persist the attempt before comparing, preserving remaining TTL.
        record.attempts += 1;
        let remaining_ttl = self
            .kv
            .ttl(&key)
            .await?
            .unwrap_or_else(|| (record.expires_at - now).to_std().unwrap_or(Duration::ZERO));
        let record_json = serde_json::to_string(&record)
            .map_err(|e| DomainError::Internal(format!("OTP record encoding: {e}")))?;
        self.kv.setex(&key, remaining_ttl, &record_json).await?;

        let matches = verify_otp_hmac(
            &self.config.hmac_secret,
            provided_otp,
            &phone,
            &record.hmac,
        );

        if !matches {
            if record.attempts >= self.config.max_verify_attempts {
                return Err(self.lock_account(&phone, ctx).await);
            }

            let remaining_attempts = self.config.max_verify_attempts - record.attempts;
            self.audit
                .log(
                    OtpAuditEntry::new(&phone, AuditEventType::VerifyFailed)
                        .with_ip(ctx.ip.clone())
                        .with_user_agent(ctx.user_agent.clone())
                        .with_metadata(serde_json::json!({
                            "attempts": record.attempts,
                            "remaining_attempts": remaining_attempts,
                        })),
                )
                .await;
            counter!("otp_verifications_total", "outcome" => "invalid").increment(1);

            // Slow brute force down; runs after the audit write so a
            // client disconnect cannot lose the record.
            self.progressive_delay(record.attempts).await;

            return Err(DomainError::InvalidOtp { remaining_attempts });
        }

        // Defense in depth: the phone must still belong to a real user.
        let user = match self.repos.users().find_by_phone(&phone).await? {
            Some(user) if user.is_active => user,
            _ => {
                self.audit_event(&phone, AuditEventType::VerifyPhoneNotRegistered, ctx)
                    .await;
                return Err(DomainError::otp(
                    ErrorCode::PhoneNotRegistered,
                    "Phone number is not registered",
                ));
            }
        };

        self.repos.users().mark_verified(&user.id, now).await?;
        let tokens = self.sessions.issue_tokens(&user).await?;

        self.kv.del(&key).await?;
        self.limiter.apply_all(&rules).await;

        self.audit_event(&phone, AuditEventType::Verified, ctx).await;
        counter!("otp_verifications_total", "outcome" => "verified").increment(1);

        let mut summary = UserSummary::from(&user);
        summary.is_verified = true;

        Ok(VerifiedLogin {
            user: summary,
            tokens,
        })
    }

    /// Resend is the request flow; the audit trail tells them apart and
    /// the cooldown enforces the minimum interval naturally.
    pub async fn resend_otp(
        &self,
        raw_phone: &str,
        country_code: Option<&str>,
        ctx: &RequestContext,
    ) -> DomainResult<OtpRequestAccepted> {
        self.request_otp(raw_phone, country_code, ctx).await
    }

    async fn lock_account(&self, phone: &str, ctx: &RequestContext) -> DomainError {
        self.limiter
            .set_cooldown(&lock_key(phone), self.config.lock_duration)
            .await;
        if let Err(err) = self.kv.del(&otp_key(phone)).await {
            tracing::warn!(phone, error = %err, "Failed to drop OTP record on lockout");
        }
        self.audit_event(phone, AuditEventType::VerifyLocked, ctx).await;
        counter!("otp_verifications_total", "outcome" => "locked").increment(1);

        DomainError::rate_limited(
            ErrorCode::AccountLocked,
            "Account temporarily locked due to repeated failures",
            self.config.lock_duration.as_secs(),
        )
    }

    /// Monotonic, cancellation-aware sleep: base·2^(attempts−1), capped.
    async fn progressive_delay(&self, attempts: u32) {
        let ms = self
            .config
            .failed_delay_base_ms
            .saturating_mul(2u64.saturating_pow(attempts.saturating_sub(1)))
            .min(self.config.failed_delay_cap_ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::bloom::{BloomConfig, PhoneExistenceFilter};
    use crate::application::phone_cache::PhoneCacheConfig;
    use crate::application::sms_queue::SmsQueueConfig;
    use crate::application::test_support::StubRepos;
    use crate::domain::user::User;
    use crate::infrastructure::crypto::jwt::JwtConfig;
    use crate::infrastructure::kv::MemoryKv;

    fn fixture_user(phone: &str) -> User {
        User {
            id: "u1".to_string(),
            phone: phone.to_string(),
            country_code: "IN".to_string(),
            is_verified: false,
            is_active: true,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        }
    }

    struct Harness {
        service: OtpService,
        queue: Arc<SmsQueue>,
        repos: Arc<StubRepos>,
        kv: Arc<dyn KvStore>,
    }

    fn harness(repos: StubRepos, config: OtpConfig) -> Harness {
        let repos = Arc::new(repos);
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let limiter = Arc::new(RateLimiter::new(Arc::clone(&kv)));
        let bloom = Arc::new(PhoneExistenceFilter::new(
            Arc::clone(&kv),
            BloomConfig {
                expected_elements: 100,
                error_rate: 0.01,
                refresh_hours: 24,
            },
        ));
        let phone_cache = Arc::new(PhoneVerificationCache::new(
            Arc::clone(&kv),
            bloom,
            Arc::clone(&repos) as Arc<dyn RepositoryProvider>,
            PhoneCacheConfig::default(),
        ));
        let audit = Arc::new(AuditLogger::new(
            Arc::clone(&repos) as Arc<dyn RepositoryProvider>
        ));
        let sessions = Arc::new(SessionService::new(
            Arc::clone(&kv),
            Arc::clone(&repos) as Arc<dyn RepositoryProvider>,
            Arc::clone(&audit),
            JwtConfig {
                secret: "test-secret".to_string(),
                access_ttl_seconds: 900,
                refresh_ttl_seconds: 604800,
                issuer: "voltra-backend".to_string(),
            },
        ));
        let queue = Arc::new(SmsQueue::new(Arc::clone(&kv), SmsQueueConfig::default()));

        Harness {
            service: OtpService::new(
                Arc::clone(&kv),
                limiter,
                phone_cache,
                audit,
                sessions,
                Arc::clone(&queue),
                Arc::clone(&repos) as Arc<dyn RepositoryProvider>,
                config,
            ),
            queue,
            repos,
            kv,
        }
    }

    fn fast_config() -> OtpConfig {
        OtpConfig {
            failed_delay_base_ms: 1,
            failed_delay_cap_ms: 4,
            ..Default::default()
        }
    }

    const PHONE: &str = "+919876543210";

    #[tokio::test]
    async fn happy_path_request_then_verify_once() {
        let h = harness(StubRepos::default().with_user(fixture_user(PHONE)), fast_config());
        let ctx = RequestContext::default();

        let accepted = h
            .service
            .request_otp("9876543210", Some("IN"), &ctx)
            .await
            .unwrap();
        assert_eq!(accepted.message, "OTP sent successfully");

        // Capture the dispatched code off the queue, like a worker would.
        let job = h.queue.claim_ready().await.unwrap().unwrap();
        assert_eq!(job.phone, PHONE);
        assert_eq!(job.otp.len(), 6);

        let login = h.service.verify_otp(PHONE, &job.otp, &ctx).await.unwrap();
        assert_eq!(login.user.id, "u1");
        assert!(login.user.is_verified);
        assert!(!login.tokens.access_token.is_empty());
        assert_eq!(h.repos.verified_user_ids(), vec!["u1".to_string()]);

        // The record is consumed: the same OTP cannot verify twice.
        let err = h.service.verify_otp(PHONE, &job.otp, &ctx).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::OtpNotFound);
    }

    #[tokio::test]
    async fn unregistered_phone_gets_same_acceptance_and_no_sms() {
        let h = harness(StubRepos::default(), fast_config());
        let ctx = RequestContext::default();

        let accepted = h
            .service
            .request_otp("+910000000001", None, &ctx)
            .await
            .unwrap();
        assert_eq!(accepted.message, "Phone number is not registered");

        // No job enqueued, no OTP stored.
        assert_eq!(h.queue.depth().await.unwrap(), 0);
        assert_eq!(h.kv.get("otp:+910000000001").await.unwrap(), None);
        assert!(h
            .repos
            .audit_events()
            .contains(&AuditEventType::RequestNonexistentPhone));

        // Cooldown was still armed, exactly like the happy path.
        let err = h
            .service
            .request_otp("+910000000001", None, &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PhoneRateLimitExceeded);
    }

    #[tokio::test]
    async fn invalid_phone_is_audited_and_rejected() {
        let h = harness(StubRepos::default(), fast_config());
        let err = h
            .service
            .request_otp("12345", None, &RequestContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPhone);
        assert!(h
            .repos
            .audit_events()
            .contains(&AuditEventType::RequestInvalid));
    }

    #[tokio::test]
    async fn cooldown_blocks_immediate_resend() {
        let h = harness(StubRepos::default().with_user(fixture_user(PHONE)), fast_config());
        let ctx = RequestContext::default();

        h.service.request_otp(PHONE, None, &ctx).await.unwrap();
        let err = h.service.resend_otp(PHONE, None, &ctx).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PhoneRateLimitExceeded);
        assert!(err.retry_after().is_some());
    }

    #[tokio::test]
    async fn wrong_otp_decrements_remaining_then_locks() {
        let config = OtpConfig {
            max_verify_attempts: 3,
            ..fast_config()
        };
        let h = harness(StubRepos::default().with_user(fixture_user(PHONE)), config);
        let ctx = RequestContext::default();

        h.service.request_otp(PHONE, None, &ctx).await.unwrap();

        let err = h.service.verify_otp(PHONE, "000000", &ctx).await.unwrap_err();
        match err {
            DomainError::InvalidOtp { remaining_attempts } => assert_eq!(remaining_attempts, 2),
            other => panic!("expected InvalidOtp, got {other:?}"),
        }

        let err = h.service.verify_otp(PHONE, "000000", &ctx).await.unwrap_err();
        match err {
            DomainError::InvalidOtp { remaining_attempts } => assert_eq!(remaining_attempts, 1),
            other => panic!("expected InvalidOtp, got {other:?}"),
        }

        // Third failure exhausts the attempts and locks the account.
        let err = h.service.verify_otp(PHONE, "000000", &ctx).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccountLocked);
        assert_eq!(err.retry_after(), Some(900));

        // Even the correct flow is gated now.
        let err = h.service.verify_otp(PHONE, "000000", &ctx).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccountLocked);
        assert!(h.repos.audit_events().contains(&AuditEventType::VerifyLocked));
    }

    #[tokio::test]
    async fn verify_without_request_reports_not_found() {
        let h = harness(StubRepos::default().with_user(fixture_user(PHONE)), fast_config());
        let err = h
            .service
            .verify_otp(PHONE, "123456", &RequestContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::OtpNotFound);
        assert!(h
            .repos
            .audit_events()
            .contains(&AuditEventType::VerifyNotFound));
    }

    #[tokio::test]
    async fn expired_record_is_dropped_and_reported() {
        let config = OtpConfig {
            ttl: Duration::from_millis(30),
            ..fast_config()
        };
        let h = harness(StubRepos::default().with_user(fixture_user(PHONE)), config);
        let ctx = RequestContext::default();

        h.service.request_otp(PHONE, None, &ctx).await.unwrap();
        let job = h.queue.claim_ready().await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        // The hot store already expired the record lazily.
        let err = h.service.verify_otp(PHONE, &job.otp, &ctx).await.unwrap_err();
        assert!(matches!(
            err.code(),
            ErrorCode::OtpExpired | ErrorCode::OtpNotFound
        ));
    }

    #[tokio::test]
    async fn hourly_limit_applies_after_cooldowns() {
        let config = OtpConfig {
            cooldown: Duration::from_millis(1),
            hour_limit: 2,
            ..fast_config()
        };
        let h = harness(StubRepos::default().with_user(fixture_user(PHONE)), config);
        let ctx = RequestContext::default();

        for _ in 0..2 {
            h.service.request_otp(PHONE, None, &ctx).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let err = h.service.request_otp(PHONE, None, &ctx).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PhoneRateLimitExceeded);
        assert!(h
            .repos
            .audit_events()
            .contains(&AuditEventType::RequestRateLimited));
    }
}
