//! # Access Key Construction
//!
//! Builds the 49-digit checksum-protected access key that uniquely names a
//! fiscal document to the tax authority.
//!
//! ## Layout (fixed field widths, 48 digits + 1 check digit)
//! ```text
//! DDMMYYYY | DT(2) | RUC(13) | ENV(1) | EST(3) | PTO(3) | SEQ(9) | RND(8) | EMI(1) | CHK(1)
//! emission   doc     issuer    env      estab-   emission  sequen-  security  emission  modulo-11
//! date       type    tax id    code     lishment point     tial     code      type      check digit
//! ```
//!
//! ## Check Digit (modulo 11)
//! Scan the 48 payload digits right-to-left, multiplying each by a weight
//! that cycles 2,3,4,5,6,7,2,3,… Sum the products, take `sum mod 11`:
//! remainder 0 → digit 0, remainder 1 → digit 1, otherwise `11 - remainder`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Total access key width, payload plus check digit.
pub const ACCESS_KEY_LEN: usize = 49;

// =============================================================================
// Environment / Emission Type
// =============================================================================

/// Authority environment the document is emitted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Certification/test environment (code 1).
    Test,
    /// Production environment (code 2).
    Production,
}

impl Environment {
    pub fn code(&self) -> char {
        match self {
            Environment::Test => '1',
            Environment::Production => '2',
        }
    }
}

/// Emission type field. Only normal emission is in scope; the field exists
/// so the key layout stays complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionType {
    Normal,
}

impl EmissionType {
    pub fn code(&self) -> char {
        match self {
            EmissionType::Normal => '1',
        }
    }
}

// =============================================================================
// Access Key Builder
// =============================================================================

/// Inputs for one access key.
#[derive(Debug, Clone)]
pub struct AccessKeyInput<'a> {
    pub emitted_on: NaiveDate,
    pub doc_type: &'a str,
    pub issuer_tax_id: &'a str,
    pub environment: Environment,
    pub establishment: &'a str,
    pub emission_point: &'a str,
    pub sequential: &'a str,
    /// 8-digit numeric security code (random per document).
    pub security_code: u32,
    pub emission_type: EmissionType,
}

/// Builds the 49-character access key.
///
/// Every field is reduced to its ASCII digits, left-padded with zeros to its
/// fixed width (overlong values keep their rightmost digits), so the result
/// is guaranteed to respect the downstream field width.
pub fn build_access_key(input: &AccessKeyInput<'_>) -> CoreResult<String> {
    let mut payload = String::with_capacity(ACCESS_KEY_LEN);

    payload.push_str(&input.emitted_on.format("%d%m%Y").to_string());
    payload.push_str(&fixed_digits(input.doc_type, 2));
    payload.push_str(&fixed_digits(input.issuer_tax_id, 13));
    payload.push(input.environment.code());
    payload.push_str(&fixed_digits(input.establishment, 3));
    payload.push_str(&fixed_digits(input.emission_point, 3));
    payload.push_str(&fixed_digits(input.sequential, 9));
    payload.push_str(&format!("{:08}", input.security_code % 100_000_000));
    payload.push(input.emission_type.code());

    let check = check_digit(&payload);
    payload.push(char::from_digit(check, 10).unwrap_or('0'));

    if payload.len() != ACCESS_KEY_LEN || !payload.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::MalformedAccessKey {
            length: payload.len(),
            key: payload,
        });
    }

    Ok(payload)
}

/// Computes the modulo-11 check digit over a digit string.
///
/// Weights cycle 2..=7 scanning right-to-left. Non-digit bytes contribute
/// zero; callers are expected to pass sanitized payloads.
pub fn check_digit(digits: &str) -> u32 {
    const WEIGHTS: [u32; 6] = [2, 3, 4, 5, 6, 7];

    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| b.checked_sub(b'0').filter(|d| *d <= 9).unwrap_or(0) as u32 * WEIGHTS[i % 6])
        .sum();

    match sum % 11 {
        0 => 0,
        1 => 1,
        r => 11 - r,
    }
}

/// Verifies a complete 49-digit access key against its own check digit.
pub fn verify_access_key(key: &str) -> bool {
    if key.len() != ACCESS_KEY_LEN || !key.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let (payload, check) = key.split_at(ACCESS_KEY_LEN - 1);
    check_digit(payload) == check.chars().next().and_then(|c| c.to_digit(10)).unwrap_or(99)
}

/// Reduces a field to ASCII digits at a fixed width: left-pads with zeros,
/// keeps the rightmost digits when overlong.
fn fixed_digits(value: &str, width: usize) -> String {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() >= width {
        digits[digits.len() - width..].to_string()
    } else {
        format!("{}{}", "0".repeat(width - digits.len()), digits)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_digit_single_digits() {
        // "1": 1×2 = 2, 2 mod 11 = 2, digit = 11 − 2 = 9
        assert_eq!(check_digit("1"), 9);
        // "11": 1×2 + 1×3 = 5, digit = 11 − 5 = 6
        assert_eq!(check_digit("11"), 6);
    }

    #[test]
    fn test_check_digit_known_payload() {
        // Hand-computed over the full 48-digit payload.
        let payload = "250720260117900000000010010020000001233876543210";
        assert_eq!(payload.len(), 48);
        assert_eq!(check_digit(payload), 3);
    }

    #[test]
    fn test_build_access_key_known_vector() {
        let input = AccessKeyInput {
            emitted_on: NaiveDate::from_ymd_opt(2026, 8, 27).unwrap(),
            doc_type: "01",
            issuer_tax_id: "1790012345001",
            environment: Environment::Test,
            establishment: "001",
            emission_point: "002",
            sequential: "000000123",
            security_code: 12345678,
            emission_type: EmissionType::Normal,
        };

        let key = build_access_key(&input).unwrap();
        assert_eq!(key.len(), 49);
        assert_eq!(
            key,
            "2708202601179001234500110010020000001231234567819"
        );
    }

    #[test]
    fn test_check_digit_round_trips() {
        let input = AccessKeyInput {
            emitted_on: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            doc_type: "01",
            issuer_tax_id: "0992345678001",
            environment: Environment::Production,
            establishment: "002",
            emission_point: "010",
            sequential: "000045001",
            security_code: 7,
            emission_type: EmissionType::Normal,
        };

        let key = build_access_key(&input).unwrap();
        assert!(verify_access_key(&key));

        // Recomputing over the 48-digit payload reproduces the 49th digit.
        let (payload, check) = key.split_at(48);
        assert_eq!(
            check_digit(payload),
            check.chars().next().unwrap().to_digit(10).unwrap()
        );
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let input = AccessKeyInput {
            emitted_on: NaiveDate::from_ymd_opt(2026, 8, 27).unwrap(),
            doc_type: "01",
            issuer_tax_id: "1790012345001",
            environment: Environment::Test,
            establishment: "001",
            emission_point: "002",
            sequential: "000000123",
            security_code: 12345678,
            emission_type: EmissionType::Normal,
        };
        let key = build_access_key(&input).unwrap();

        // Flip one payload digit; the stored check digit no longer matches.
        let mut tampered: Vec<u8> = key.into_bytes();
        tampered[20] = if tampered[20] == b'9' { b'0' } else { tampered[20] + 1 };
        let tampered = String::from_utf8(tampered).unwrap();
        assert!(!verify_access_key(&tampered));
    }

    #[test]
    fn test_fixed_digits_padding_and_truncation() {
        assert_eq!(fixed_digits("42", 9), "000000042");
        assert_eq!(fixed_digits("1234567890123456", 13), "4567890123456");
        assert_eq!(fixed_digits("ab1c2", 3), "012");
    }

    #[test]
    fn test_security_code_wraps_to_eight_digits() {
        let input = AccessKeyInput {
            emitted_on: NaiveDate::from_ymd_opt(2026, 8, 27).unwrap(),
            doc_type: "01",
            issuer_tax_id: "1790012345001",
            environment: Environment::Test,
            establishment: "001",
            emission_point: "002",
            sequential: "000000001",
            security_code: 4_000_000_000, // more than 8 digits
            emission_type: EmissionType::Normal,
        };
        let key = build_access_key(&input).unwrap();
        assert_eq!(key.len(), 49);
        assert!(verify_access_key(&key));
    }
}
