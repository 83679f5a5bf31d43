//! OTP endpoint DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::otp::TokenPair;
use crate::domain::user::UserSummary;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OtpRequestBody {
    #[validate(length(min = 1, max = 32, message = "phone is required"))]
    pub phone: String,
    #[validate(length(min = 2, max = 2, message = "countryCode must be two letters"))]
    pub country_code: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OtpVerifyBody {
    #[validate(length(min = 1, max = 32, message = "phone is required"))]
    pub phone: String,
    #[validate(length(min = 4, max = 10, message = "otp is required"))]
    pub otp: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshBody {
    #[validate(length(min = 1, message = "refreshToken is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutBody {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub user: UserSummary,
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_in: u64,
}
