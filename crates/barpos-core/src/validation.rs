//! # Validation Module
//!
//! Input validation for BarPOS operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: API collaborator                                             │
//! │  └── Request schema (types, required fields)                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Identification rules (TABLE needs id, CUSTOMER needs a name)      │
//! │  ├── Quantity / amount positivity                                      │
//! │  └── Catalog inputs (names, prices, floats)                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 0) on stock                                    │
//! │  ├── Partial UNIQUE index on the open register                         │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{Identification, IdentificationMode};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of names and labels.
const MAX_NAME_LEN: usize = 120;

// =============================================================================
// Identification
// =============================================================================

/// Turns the raw identification fields into a validated [`Identification`].
///
/// ## Rules
/// - TABLE requires a non-empty table id; the customer name is ignored
/// - CUSTOMER requires a name that is non-blank after trimming; the table id
///   is ignored
///
/// ## Example
/// ```rust
/// use barpos_core::validation::resolve_identification;
/// use barpos_core::{Identification, IdentificationMode};
///
/// let id = resolve_identification(IdentificationMode::Customer, None, Some("  Ana ")).unwrap();
/// assert_eq!(id, Identification::Customer("Ana".to_string()));
///
/// assert!(resolve_identification(IdentificationMode::Table, None, Some("Ana")).is_err());
/// ```
pub fn resolve_identification(
    mode: IdentificationMode,
    table_id: Option<&str>,
    customer_name: Option<&str>,
) -> CoreResult<Identification> {
    match mode {
        IdentificationMode::Table => match table_id {
            Some(id) if !id.trim().is_empty() => Ok(Identification::Table(id.to_string())),
            _ => Err(CoreError::OrderIdentificationRequired(mode)),
        },
        IdentificationMode::Customer => match customer_name.map(str::trim) {
            Some(name) if !name.is_empty() => Ok(Identification::Customer(name.to_string())),
            _ => Err(CoreError::OrderIdentificationRequired(mode)),
        },
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an item quantity: must be ≥ 1.
pub fn validate_quantity(qty: i64) -> CoreResult<()> {
    if qty <= 0 {
        return Err(CoreError::InvalidQuantity(qty));
    }
    Ok(())
}

/// Validates a payment or movement amount: must be ≥ 1 cent.
pub fn validate_amount(cents: i64) -> CoreResult<()> {
    if cents <= 0 {
        return Err(CoreError::InvalidAmount(cents));
    }
    Ok(())
}

/// Validates a value that may be zero but not negative
/// (prices, register floats, stock levels).
///
/// ## Example
/// ```rust
/// use barpos_core::validation::validate_non_negative;
///
/// assert!(validate_non_negative("price", 0).is_ok());
/// assert!(validate_non_negative("price", -100).is_err());
/// ```
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required display string (product name, category, table label).
///
/// ## Returns
/// The trimmed value.
pub fn validate_name(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(value.to_string())
}

/// Normalizes an optional free-text field: blank becomes `None`.
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_table_identification() {
        let id = resolve_identification(IdentificationMode::Table, Some("t1"), Some("ignored"))
            .unwrap();
        assert_eq!(id, Identification::Table("t1".into()));

        let err = resolve_identification(IdentificationMode::Table, None, None).unwrap_err();
        assert_eq!(err.code(), "ORDER_IDENTIFICATION_REQUIRED");

        assert!(resolve_identification(IdentificationMode::Table, Some(""), None).is_err());
    }

    #[test]
    fn test_resolve_customer_identification() {
        let id = resolve_identification(IdentificationMode::Customer, Some("t1"), Some(" Bia "))
            .unwrap();
        assert_eq!(id, Identification::Customer("Bia".into()));

        assert!(resolve_identification(IdentificationMode::Customer, None, Some("   ")).is_err());
        assert!(resolve_identification(IdentificationMode::Customer, Some("t1"), None).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(250).is_ok());
        assert!(matches!(validate_quantity(0), Err(CoreError::InvalidQuantity(0))));
        assert!(matches!(validate_quantity(-3), Err(CoreError::InvalidQuantity(-3))));
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(1).is_ok());
        assert!(matches!(validate_amount(0), Err(CoreError::InvalidAmount(0))));
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("name", "  Chopp ").unwrap(), "Chopp");
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", &"A".repeat(200)).is_err());
    }

    #[test]
    fn test_normalize_optional() {
        assert_eq!(normalize_optional(Some("  no ice ")), Some("no ice".to_string()));
        assert_eq!(normalize_optional(Some("   ")), None);
        assert_eq!(normalize_optional(None), None);
    }
}
