//! # Validation Module
//!
//! Buyer identity validation and fiscal field truncation.
//!
//! ## Two Different Disciplines
//! ```text
//! Buyer identity  → VALIDATED: a supplied tax id that is too short is a
//!                   hard ValidationError, rejected before any state
//!                   mutation.
//!
//! Fiscal fields   → TRUNCATED: addresses, descriptions and product codes
//!                   are silently cut to the authority's field widths,
//!                   never rejected. An over-long dish name must not block
//!                   closing a sale.
//! ```

use crate::error::ValidationError;
use crate::types::BuyerIdentity;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Fiscal Field Widths
// =============================================================================

/// Maximum width of a tax id field.
pub const MAX_TAX_ID_LEN: usize = 13;
/// Minimum digits for a supplied (non-final-consumer) buyer tax id.
pub const MIN_TAX_ID_LEN: usize = 10;
/// Maximum width of an address field.
pub const MAX_ADDRESS_LEN: usize = 200;
/// Maximum width of a line description.
pub const MAX_DESCRIPTION_LEN: usize = 200;
/// Maximum width of a product code.
pub const MAX_PRODUCT_CODE_LEN: usize = 25;

// =============================================================================
// Truncation
// =============================================================================

/// Truncates a value to a fiscal field width, counting characters (not
/// bytes, so multi-byte names cannot split a code point).
pub fn truncate_field(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

// =============================================================================
// Buyer Validation
// =============================================================================

/// Validates buyer identity supplied with a settlement request.
///
/// The final-consumer identity is always valid. A supplied identity needs a
/// numeric tax id of 10–13 digits and a non-empty legal name; anything else
/// is rejected before the pipeline mutates any state.
pub fn validate_buyer(buyer: &BuyerIdentity) -> ValidationResult<()> {
    if buyer.is_final_consumer() {
        return Ok(());
    }

    let tax_id = buyer.tax_id.trim();
    if tax_id.is_empty() {
        return Err(ValidationError::Required {
            field: "tax_id".to_string(),
        });
    }
    if !tax_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "tax_id".to_string(),
            reason: "must contain only digits".to_string(),
        });
    }
    if tax_id.len() < MIN_TAX_ID_LEN {
        return Err(ValidationError::TooShort {
            field: "tax_id".to_string(),
            min: MIN_TAX_ID_LEN,
        });
    }
    if tax_id.len() > MAX_TAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field: "tax_id".to_string(),
            max: MAX_TAX_ID_LEN,
        });
    }

    if buyer.legal_name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "legal_name".to_string(),
        });
    }

    Ok(())
}

/// Validates a quantity of units sold on a line.
pub fn validate_line_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn buyer(tax_id: &str, name: &str) -> BuyerIdentity {
        BuyerIdentity {
            tax_id: tax_id.to_string(),
            legal_name: name.to_string(),
            address: None,
            phone: None,
            email: None,
        }
    }

    #[test]
    fn test_final_consumer_always_valid() {
        assert!(validate_buyer(&BuyerIdentity::final_consumer()).is_ok());
    }

    #[test]
    fn test_valid_supplied_buyer() {
        assert!(validate_buyer(&buyer("1790012345001", "ACME S.A.")).is_ok());
        assert!(validate_buyer(&buyer("0912345678", "Juana Pérez")).is_ok());
    }

    #[test]
    fn test_short_tax_id_rejected() {
        let err = validate_buyer(&buyer("12345", "ACME S.A.")).unwrap_err();
        assert!(matches!(err, ValidationError::TooShort { .. }));
    }

    #[test]
    fn test_non_numeric_tax_id_rejected() {
        let err = validate_buyer(&buyer("17900ABC45001", "ACME S.A.")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { .. }));
    }

    #[test]
    fn test_missing_legal_name_rejected() {
        let err = validate_buyer(&buyer("1790012345001", "  ")).unwrap_err();
        assert!(matches!(err, ValidationError::Required { .. }));
    }

    #[test]
    fn test_truncate_field_counts_chars() {
        assert_eq!(truncate_field("abcdef", 4), "abcd");
        assert_eq!(truncate_field("abc", 10), "abc");
        // Multi-byte characters are kept whole.
        assert_eq!(truncate_field("ñañañá", 3), "ñañ");
    }

    #[test]
    fn test_validate_line_quantity() {
        assert!(validate_line_quantity(1).is_ok());
        assert!(validate_line_quantity(0).is_err());
        assert!(validate_line_quantity(-2).is_err());
    }
}
