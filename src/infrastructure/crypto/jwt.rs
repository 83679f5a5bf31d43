//! JWT token handling
//!
//! Access and refresh tokens share one signing secret but carry distinct
//! `type` claims and lifetimes. Every token gets a fresh JTI so individual
//! refresh tokens can be revoked.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens
    pub secret: String,
    /// Access-token lifetime in seconds
    pub access_ttl_seconds: u64,
    /// Refresh-token lifetime in seconds
    pub refresh_ttl_seconds: u64,
    /// Issuer claim
    pub issuer: String,
}

/// Parse durations like "15m", "7d", "300s", "12h". Bare numbers are
/// seconds.
pub fn parse_duration_secs(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (digits, multiplier) = match raw.chars().last()? {
        's' => (&raw[..raw.len() - 1], 1),
        'm' => (&raw[..raw.len() - 1], 60),
        'h' => (&raw[..raw.len() - 1], 3600),
        'd' => (&raw[..raw.len() - 1], 86400),
        '0'..='9' => (raw, 1),
        _ => return None,
    };
    digits.parse::<u64>().ok().map(|n| n * multiplier)
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| "super-secret-key-change-in-production".to_string()),
            access_ttl_seconds: std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
                .ok()
                .and_then(|v| parse_duration_secs(&v))
                .unwrap_or(15 * 60),
            refresh_ttl_seconds: std::env::var("JWT_REFRESH_TOKEN_EXPIRY")
                .ok()
                .and_then(|v| parse_duration_secs(&v))
                .unwrap_or(7 * 86400),
            issuer: "voltra-backend".to_string(),
        }
    }
}

impl JwtConfig {
    /// Create JwtConfig from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// Token kind carried in the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT TokenClaims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Canonical phone of the subject
    pub phone: String,
    /// Token kind
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Unique token id, the revocation handle
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

impl TokenClaims {
    fn new(user_id: &str, phone: &str, token_type: TokenType, config: &JwtConfig) -> Self {
        let now = Utc::now();
        let ttl = match token_type {
            TokenType::Access => config.access_ttl_seconds,
            TokenType::Refresh => config.refresh_ttl_seconds,
        };

        Self {
            sub: user_id.to_string(),
            phone: phone.to_string(),
            token_type,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl as i64)).timestamp(),
            iss: config.issuer.clone(),
        }
    }
}

/// A freshly signed token together with its claims.
pub struct SignedToken {
    pub token: String,
    pub claims: TokenClaims,
}

fn sign(claims: &TokenClaims, config: &JwtConfig) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Create a short-lived access token.
pub fn create_access_token(
    user_id: &str,
    phone: &str,
    config: &JwtConfig,
) -> Result<SignedToken, jsonwebtoken::errors::Error> {
    let claims = TokenClaims::new(user_id, phone, TokenType::Access, config);
    Ok(SignedToken {
        token: sign(&claims, config)?,
        claims,
    })
}

/// Create a long-lived refresh token.
pub fn create_refresh_token(
    user_id: &str,
    phone: &str,
    config: &JwtConfig,
) -> Result<SignedToken, jsonwebtoken::errors::Error> {
    let claims = TokenClaims::new(user_id, phone, TokenType::Refresh, config);
    Ok(SignedToken {
        token: sign(&claims, config)?,
        claims,
    })
}

/// Verify signature, expiry, and issuer, returning the claims.
pub fn verify_token(
    token: &str,
    config: &JwtConfig,
) -> Result<TokenClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.set_issuer(&[&config.issuer]);

    let token_data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )?;

    Ok(token_data.claims)
}
