//! Session and token lifecycle
//!
//! Access tokens are short-lived and never stored; refresh tokens are
//! recorded per JTI so they can be revoked one by one. A per-user
//! revocation marker (seconds precision) invalidates every access token
//! issued strictly before it, which is how refresh and logout cut off
//! outstanding access tokens without tracking them individually.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use crate::application::audit::AuditLogger;
use crate::domain::otp::{AuditEventType, OtpAuditEntry, RefreshRecord, Session, TokenPair};
use crate::domain::user::User;
use crate::domain::{DomainError, DomainResult, ErrorCode, RepositoryProvider};
use crate::infrastructure::crypto::jwt::{
    create_access_token, create_refresh_token, verify_token, JwtConfig, TokenClaims, TokenType,
};
use crate::infrastructure::kv::KvStore;

const SESSION_TTL: Duration = Duration::from_secs(7 * 86400);

fn session_key(user_id: &str) -> String {
    format!("session:{user_id}")
}

fn refresh_key(jti: &str) -> String {
    format!("refresh:{jti}")
}

/// Secondary index of a user's refresh JTIs, so logout never has to
/// pattern-scan the refresh keyspace.
fn user_refresh_key(user_id: &str) -> String {
    format!("user:refresh:{user_id}")
}

fn revocation_key(user_id: &str) -> String {
    format!("revoked:user:{user_id}")
}

/// A refreshed access token.
#[derive(Debug, Clone)]
pub struct RefreshedAccess {
    pub access_token: String,
    pub expires_in: u64,
}

pub struct SessionService {
    kv: Arc<dyn KvStore>,
    repos: Arc<dyn RepositoryProvider>,
    audit: Arc<AuditLogger>,
    jwt: JwtConfig,
}

impl SessionService {
    pub fn new(
        kv: Arc<dyn KvStore>,
        repos: Arc<dyn RepositoryProvider>,
        audit: Arc<AuditLogger>,
        jwt: JwtConfig,
    ) -> Self {
        Self {
            kv,
            repos,
            audit,
            jwt,
        }
    }

    /// Mint an access+refresh pair, persist the session and refresh
    /// records, and clear any revocation marker.
    pub async fn issue_tokens(&self, user: &User) -> DomainResult<TokenPair> {
        let access = create_access_token(&user.id, &user.phone, &self.jwt)
            .map_err(|e| DomainError::Internal(format!("Access token signing: {e}")))?;
        let refresh = create_refresh_token(&user.id, &user.phone, &self.jwt)
            .map_err(|e| DomainError::Internal(format!("Refresh token signing: {e}")))?;

        let now = Utc::now();
        let refresh_ttl = Duration::from_secs(self.jwt.refresh_ttl_seconds);

        let record = RefreshRecord {
            user_id: user.id.clone(),
            token: refresh.token.clone(),
            created_at: now,
        };
        let record_json = serde_json::to_string(&record)
            .map_err(|e| DomainError::Internal(format!("Refresh record encoding: {e}")))?;
        self.kv
            .setex(&refresh_key(&refresh.claims.jti), refresh_ttl, &record_json)
            .await?;

        self.kv
            .zadd(
                &user_refresh_key(&user.id),
                now.timestamp() as f64,
                &refresh.claims.jti,
            )
            .await?;
        self.kv
            .expire(&user_refresh_key(&user.id), refresh_ttl)
            .await?;

        let session = Session {
            phone: user.phone.clone(),
            verified: true,
            verified_at: now,
            last_login_at: now,
            refresh_jti: refresh.claims.jti.clone(),
            created_at: now,
        };
        let session_json = serde_json::to_string(&session)
            .map_err(|e| DomainError::Internal(format!("Session encoding: {e}")))?;
        self.kv
            .setex(&session_key(&user.id), SESSION_TTL, &session_json)
            .await?;

        // A fresh login supersedes any earlier revocation.
        self.kv.del(&revocation_key(&user.id)).await?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            expires_in: self.jwt.access_ttl_seconds,
        })
    }

    /// Exchange a refresh token for a new access token, revoking every
    /// access token issued before this instant.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> DomainResult<RefreshedAccess> {
        let claims = verify_token(refresh_token, &self.jwt).map_err(|e| {
            if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::ExpiredSignature) {
                DomainError::unauthorized(ErrorCode::RefreshTokenExpired, "Refresh token expired")
            } else {
                DomainError::unauthorized(ErrorCode::InvalidRefreshToken, "Invalid refresh token")
            }
        })?;

        if claims.token_type != TokenType::Refresh {
            return Err(DomainError::unauthorized(
                ErrorCode::InvalidTokenType,
                "Expected a refresh token",
            ));
        }

        if self.kv.get(&refresh_key(&claims.jti)).await?.is_none() {
            return Err(DomainError::unauthorized(
                ErrorCode::RefreshTokenRevoked,
                "Refresh token revoked",
            ));
        }

        let user = self
            .repos
            .users()
            .find_by_id(&claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| {
                DomainError::unauthorized(ErrorCode::UserNotFound, "User no longer exists")
            })?;

        // Cut off all outstanding access tokens, then mint the new one.
        self.set_revocation_marker(&user.id).await?;

        let access = create_access_token(&user.id, &user.phone, &self.jwt)
            .map_err(|e| DomainError::Internal(format!("Access token signing: {e}")))?;

        // Session keeps the same refresh JTI; only activity moves.
        if let Ok(Some(raw)) = self.kv.get(&session_key(&user.id)).await {
            if let Ok(mut session) = serde_json::from_str::<Session>(&raw) {
                session.last_login_at = Utc::now();
                if let Ok(json) = serde_json::to_string(&session) {
                    if let Err(err) = self
                        .kv
                        .setex(&session_key(&user.id), SESSION_TTL, &json)
                        .await
                    {
                        warn!(user_id = %user.id, error = %err, "Session refresh write failed");
                    }
                }
            }
        }

        self.audit
            .log(OtpAuditEntry::new(
                user.phone.clone(),
                AuditEventType::TokenRefreshed,
            ))
            .await;

        Ok(RefreshedAccess {
            access_token: access.token,
            expires_in: self.jwt.access_ttl_seconds,
        })
    }

    /// Invalidate every refresh record of the user and revoke outstanding
    /// access tokens. Deliberately quiet about unknown tokens.
    pub async fn logout(&self, refresh_token: &str) -> DomainResult<()> {
        let Ok(claims) = verify_token(refresh_token, &self.jwt) else {
            return Ok(());
        };
        if claims.token_type != TokenType::Refresh {
            return Ok(());
        }

        self.revoke_all_refresh_tokens(&claims.sub).await?;
        self.set_revocation_marker(&claims.sub).await?;
        self.kv.del(&session_key(&claims.sub)).await?;

        self.audit
            .log(OtpAuditEntry::new(claims.phone, AuditEventType::Logout))
            .await;

        Ok(())
    }

    /// Validate an access token for a protected endpoint.
    pub fn verify_access_claims(&self, token: &str) -> DomainResult<TokenClaims> {
        let claims = verify_token(token, &self.jwt).map_err(|_| {
            DomainError::unauthorized(ErrorCode::Unauthorized, "Invalid or expired token")
        })?;

        if claims.token_type != TokenType::Access {
            return Err(DomainError::unauthorized(
                ErrorCode::InvalidTokenType,
                "Expected an access token",
            ));
        }

        Ok(claims)
    }

    /// Full access-token check including the user revocation marker.
    pub async fn authenticate_access(&self, token: &str) -> DomainResult<TokenClaims> {
        let claims = self.verify_access_claims(token)?;

        if let Some(marker) = self.kv.get(&revocation_key(&claims.sub)).await? {
            if let Ok(revoked_at) = marker.parse::<i64>() {
                if claims.iat < revoked_at {
                    return Err(DomainError::unauthorized(
                        ErrorCode::TokenRevoked,
                        "Token has been revoked",
                    ));
                }
            }
        }

        Ok(claims)
    }

    async fn set_revocation_marker(&self, user_id: &str) -> DomainResult<()> {
        let now_seconds = Utc::now().timestamp();
        self.kv
            .setex(
                &revocation_key(user_id),
                Duration::from_secs(self.jwt.access_ttl_seconds),
                &now_seconds.to_string(),
            )
            .await
            .map_err(DomainError::from)
    }

    async fn revoke_all_refresh_tokens(&self, user_id: &str) -> DomainResult<()> {
        let jtis = self
            .kv
            .zrange_by_score(&user_refresh_key(user_id), f64::MIN, f64::MAX, usize::MAX)
            .await?;

        for (jti, _) in jtis {
            self.kv.del(&refresh_key(&jti)).await?;
        }
        self.kv.del(&user_refresh_key(user_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::StubRepos;
    use crate::infrastructure::kv::MemoryKv;

    fn fixture_user() -> User {
        User {
            id: "u1".to_string(),
            phone: "+919876543210".to_string(),
            country_code: "IN".to_string(),
            is_verified: true,
            is_active: true,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        }
    }

    fn service(repos: Arc<StubRepos>) -> SessionService {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let audit = Arc::new(AuditLogger::new(
            Arc::clone(&repos) as Arc<dyn RepositoryProvider>
        ));
        SessionService::new(
            kv,
            repos,
            audit,
            JwtConfig {
                secret: "test-secret".to_string(),
                access_ttl_seconds: 900,
                refresh_ttl_seconds: 604800,
                issuer: "voltra-backend".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn issue_then_authenticate() {
        let repos = Arc::new(StubRepos::default().with_user(fixture_user()));
        let sessions = service(repos);

        let pair = sessions.issue_tokens(&fixture_user()).await.unwrap();
        assert_eq!(pair.expires_in, 900);

        let claims = sessions.authenticate_access(&pair.access_token).await.unwrap();
        assert_eq!(claims.sub, "u1");
    }

    #[tokio::test]
    async fn refresh_rotates_access_and_revokes_older_tokens() {
        let repos = Arc::new(StubRepos::default().with_user(fixture_user()));
        let sessions = service(repos);

        let pair = sessions.issue_tokens(&fixture_user()).await.unwrap();

        // The marker has whole-second precision; step past it so the old
        // access token is strictly older.
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        let refreshed = sessions
            .refresh_access_token(&pair.refresh_token)
            .await
            .unwrap();

        let old = sessions.authenticate_access(&pair.access_token).await;
        assert_eq!(old.unwrap_err().code(), ErrorCode::TokenRevoked);

        let new = sessions.authenticate_access(&refreshed.access_token).await;
        assert!(new.is_ok());
    }

    #[tokio::test]
    async fn refresh_with_access_token_is_rejected() {
        let repos = Arc::new(StubRepos::default().with_user(fixture_user()));
        let sessions = service(repos);

        let pair = sessions.issue_tokens(&fixture_user()).await.unwrap();
        let err = sessions
            .refresh_access_token(&pair.access_token)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidTokenType);
    }

    #[tokio::test]
    async fn logout_revokes_refresh_token() {
        let repos = Arc::new(StubRepos::default().with_user(fixture_user()));
        let sessions = service(Arc::clone(&repos));

        let pair = sessions.issue_tokens(&fixture_user()).await.unwrap();
        sessions.logout(&pair.refresh_token).await.unwrap();

        let err = sessions
            .refresh_access_token(&pair.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::RefreshTokenRevoked);
        assert!(repos.audit_events().contains(&AuditEventType::Logout));
    }

    #[tokio::test]
    async fn logout_with_garbage_token_is_quietly_accepted() {
        let repos = Arc::new(StubRepos::default());
        let sessions = service(repos);
        assert!(sessions.logout("not-a-jwt").await.is_ok());
    }

    #[tokio::test]
    async fn unknown_refresh_jti_is_revoked() {
        let repos = Arc::new(StubRepos::default().with_user(fixture_user()));
        let sessions = service(Arc::clone(&repos));

        // A signed refresh token that was never stored (e.g. minted before
        // a store flush).
        let foreign = create_refresh_token(
            "u1",
            "+919876543210",
            &JwtConfig {
                secret: "test-secret".to_string(),
                access_ttl_seconds: 900,
                refresh_ttl_seconds: 604800,
                issuer: "voltra-backend".to_string(),
            },
        )
        .unwrap();

        let err = sessions
            .refresh_access_token(&foreign.token)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::RefreshTokenRevoked);
    }

    #[tokio::test]
    async fn issuing_new_tokens_clears_revocation() {
        let repos = Arc::new(StubRepos::default().with_user(fixture_user()));
        let sessions = service(repos);

        let first = sessions.issue_tokens(&fixture_user()).await.unwrap();
        sessions.logout(&first.refresh_token).await.unwrap();

        let second = sessions.issue_tokens(&fixture_user()).await.unwrap();
        assert!(sessions
            .authenticate_access(&second.access_token)
            .await
            .is_ok());
    }
}
