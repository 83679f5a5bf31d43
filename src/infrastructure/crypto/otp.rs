//! OTP generation and HMAC storage form
//!
//! Codes are never persisted in the clear; the hot store only holds
//! `HMAC-SHA256(secret, otp ∥ phone)` hex-encoded. Verification goes
//! through the MAC's constant-time comparison, never string equality.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generate a numeric OTP of `length` digits (leading zeros allowed).
pub fn generate_otp(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn mac_for(secret: &str, otp: &str, phone: &str) -> HmacSha256 {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(otp.as_bytes());
    mac.update(phone.as_bytes());
    mac
}

/// Hex HMAC of `otp ∥ phone`, the stored form of a code.
pub fn otp_hmac(secret: &str, otp: &str, phone: &str) -> String {
    hex::encode(mac_for(secret, otp, phone).finalize().into_bytes())
}

/// Constant-time check of a provided code against the stored hex HMAC.
pub fn verify_otp_hmac(secret: &str, otp: &str, phone: &str, stored_hex: &str) -> bool {
    let Ok(stored) = hex::decode(stored_hex) else {
        return false;
    };
    mac_for(secret, otp, phone).verify_slice(&stored).is_ok()
}
