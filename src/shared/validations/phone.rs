//! Phone number canonicalization
//!
//! Canonical form is international: a leading `+` followed by digits only.
//! The canonical phone is the primary key for OTP records, caches, rate
//! limits, and audit rows, so every entry point must normalize first.

use crate::shared::types::errors::{DomainError, DomainResult};

/// Country calling codes for the markets the platform operates in.
/// Unknown ISO codes fall back to treating the input as already
/// international.
fn calling_code(country_code: &str) -> Option<&'static str> {
    match country_code.to_ascii_uppercase().as_str() {
        "IN" => Some("91"),
        "US" | "CA" => Some("1"),
        "GB" => Some("44"),
        "AE" => Some("971"),
        "SG" => Some("65"),
        _ => None,
    }
}

/// Normalize a raw phone number into canonical international form.
///
/// Accepts digits, spaces, `+`, `-`, `(`, `)` and `.`; anything else is
/// rejected. The number must carry 10-15 digits. A bare national number is
/// prefixed with the calling code of `country_code` (default caller passes
/// "IN").
pub fn normalize_phone(raw: &str, country_code: &str) -> DomainResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::invalid_phone("Phone number is required"));
    }

    let mut has_plus = false;
    let mut digits = String::with_capacity(trimmed.len());
    for (i, ch) in trimmed.chars().enumerate() {
        match ch {
            '+' if i == 0 => has_plus = true,
            '0'..='9' => digits.push(ch),
            ' ' | '-' | '(' | ')' | '.' => {}
            _ => {
                return Err(DomainError::invalid_phone(format!(
                    "Phone number contains invalid character '{}'",
                    ch
                )))
            }
        }
    }

    if digits.len() < 10 || digits.len() > 15 {
        return Err(DomainError::invalid_phone(
            "Phone number must contain 10 to 15 digits",
        ));
    }

    let normalized = if has_plus {
        format!("+{}", digits)
    } else {
        match calling_code(country_code) {
            // Already carries the calling code (e.g. "919876543210")
            Some(cc) if digits.len() > 10 && digits.starts_with(cc) => format!("+{}", digits),
            Some(cc) => {
                let full = format!("+{}{}", cc, digits);
                if full.len() - 1 > 15 {
                    return Err(DomainError::invalid_phone(
                        "Phone number must contain 10 to 15 digits",
                    ));
                }
                full
            }
            None => format!("+{}", digits),
        }
    };

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn national_number_gets_country_prefix() {
        assert_eq!(normalize_phone("9876543210", "IN").unwrap(), "+919876543210");
    }

    #[test]
    fn formatting_characters_are_stripped() {
        assert_eq!(
            normalize_phone("+91 (98765) 432-10", "IN").unwrap(),
            "+919876543210"
        );
        assert_eq!(
            normalize_phone("98765 43210", "IN").unwrap(),
            "+919876543210"
        );
    }

    #[test]
    fn already_prefixed_calling_code_is_not_doubled() {
        assert_eq!(normalize_phone("919876543210", "IN").unwrap(), "+919876543210");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_phone("9876543210", "IN").unwrap();
        let twice = normalize_phone(&once, "IN").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn digit_count_bounds() {
        // exactly 10 and 15 pass
        assert!(normalize_phone("9876543210", "IN").is_ok());
        assert!(normalize_phone("+123456789012345", "IN").is_ok());
        // 9 and 16 fail
        assert!(normalize_phone("987654321", "IN").is_err());
        assert!(normalize_phone("+1234567890123456", "IN").is_err());
    }

    #[test]
    fn rejects_alphabetic_input() {
        let err = normalize_phone("98765abc10", "IN").unwrap_err();
        assert_eq!(
            err.code(),
            crate::shared::types::errors::ErrorCode::InvalidPhone
        );
    }

    #[test]
    fn unknown_country_treats_input_as_international() {
        assert_eq!(normalize_phone("9876543210", "ZZ").unwrap(), "+9876543210");
    }

    #[test]
    fn plus_only_allowed_at_start() {
        assert!(normalize_phone("98+76543210", "IN").is_err());
    }
}
