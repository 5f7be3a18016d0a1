//! # Validation Module
//!
//! Input validation for the register.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Terminal command parser                                      │
//! │  ├── Token shapes (number, "10%", "3x")                                │
//! │  └── Immediate operator feedback                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE + pricing/till/tender rules                      │
//! │  ├── Amount parsing with field names                                   │
//! │  └── Customer/catalog field rules                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE (tenant, number), UNIQUE idempotency key                   │
//! │  └── One open cash session per register (partial index)                │
//! │                                                                         │
//! │  Local errors never reach layer 3.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::NewCustomer;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_CODE_LEN: usize = 50;
const MAX_QUERY_LEN: usize = 100;
const MAX_MEMO_LEN: usize = 500;

// =============================================================================
// Amounts
// =============================================================================

/// Parses a monetary input, naming `field` in the error.
///
/// ## Example
/// ```rust
/// use caixa_core::validation::parse_amount;
/// use caixa_core::{CoreError, Money};
///
/// assert_eq!(parse_amount("opening float", "200,00").unwrap(), Money::from_cents(20000));
/// match parse_amount("opening float", "abc") {
///     Err(CoreError::InvalidAmount { field, .. }) => assert_eq!(field, "opening float"),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub fn parse_amount(field: &str, input: &str) -> CoreResult<Money> {
    input.parse::<Money>().map_err(|err| match err {
        CoreError::InvalidAmount { reason, .. } => CoreError::InvalidAmount {
            field: field.to_string(),
            reason,
        },
        other => other,
    })
}

/// Parses an amount that must be greater than zero.
pub fn parse_positive_amount(field: &str, input: &str) -> CoreResult<Money> {
    let amount = parse_amount(field, input)?;
    if !amount.is_positive() {
        return Err(CoreError::invalid_amount(field, "must be greater than zero"));
    }
    Ok(amount)
}

// =============================================================================
// Cart Limits
// =============================================================================

/// Validates a line quantity: 1 to [`MAX_ITEM_QUANTITY`].
///
/// ```text
/// set_quantity("A", 5)    ──► ok
/// set_quantity("A", 1000) ──► OutOfRange { quantity, 1..=999 }
/// ```
///
/// Callers that treat zero as "remove the line" check that first.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Validates that one more line fits in a cart of `current_items` lines.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }
    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

fn required_trimmed<'a>(field: &str, value: &'a str, max: usize) -> ValidationResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(value)
}

/// Validates a person or item name: non-empty, at most 200 characters.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    required_trimmed(field, name, MAX_NAME_LEN).map(str::to_string)
}

/// Validates an item code / barcode.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use caixa_core::validation::validate_item_code;
///
/// assert!(validate_item_code("CAP-IP13").is_ok());
/// assert!(validate_item_code("7891234567895").is_ok());
/// assert!(validate_item_code("").is_err());
/// assert!(validate_item_code("a b").is_err());
/// ```
pub fn validate_item_code(code: &str) -> ValidationResult<String> {
    let code = required_trimmed("code", code, MAX_CODE_LEN)?;
    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }
    Ok(code.to_string())
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (returns everything)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();
    if query.chars().count() > MAX_QUERY_LEN {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: MAX_QUERY_LEN,
        });
    }
    Ok(query.to_string())
}

/// Trims a free-text memo (movement memo, closing notes).
pub fn validate_memo(memo: &str) -> ValidationResult<String> {
    let memo = memo.trim();
    if memo.chars().count() > MAX_MEMO_LEN {
        return Err(ValidationError::TooLong {
            field: "memo".to_string(),
            max: MAX_MEMO_LEN,
        });
    }
    Ok(memo.to_string())
}

fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Validates a CPF (11 digits) or CNPJ (14 digits).
///
/// Punctuation is stripped. Returns the digits.
pub fn validate_document(document: &str) -> ValidationResult<String> {
    let digits = digits_only(document);
    if digits.len() != 11 && digits.len() != 14 {
        return Err(ValidationError::InvalidFormat {
            field: "document".to_string(),
            reason: "CPF must have 11 digits, CNPJ 14".to_string(),
        });
    }
    Ok(digits)
}

/// Validates a phone number with area code (10 or 11 digits).
pub fn validate_phone(phone: &str) -> ValidationResult<String> {
    let digits = digits_only(phone);
    if !(10..=11).contains(&digits.len()) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "expected area code + number (10 or 11 digits)".to_string(),
        });
    }
    Ok(digits)
}

pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((user, domain)) => !user.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    };
    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "not an e-mail address".to_string(),
        });
    }
    Ok(email.to_lowercase())
}

/// Validates and normalizes a new customer.
///
/// Blank optional fields become `None`; phones and documents are reduced
/// to digits.
pub fn validate_new_customer(input: &NewCustomer) -> ValidationResult<NewCustomer> {
    let name = validate_name("name", &input.name)?;

    let document = match input.document.as_deref().map(str::trim) {
        Some(doc) if !doc.is_empty() => Some(validate_document(doc)?),
        _ => None,
    };

    let phones = input
        .phones
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(validate_phone)
        .collect::<ValidationResult<Vec<_>>>()?;

    let email = match input.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => Some(validate_email(email)?),
        _ => None,
    };

    Ok(NewCustomer {
        name,
        document,
        phones,
        email,
    })
}

/// Validates a UUID string.
pub fn validate_uuid(id: &str) -> ValidationResult<uuid::Uuid> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }
    uuid::Uuid::parse_str(id.trim()).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_names_field() {
        let err = parse_amount("counted amount", "dez reais").unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidAmount { ref field, .. } if field == "counted amount"
        ));
    }

    #[test]
    fn test_parse_positive_amount() {
        assert!(parse_positive_amount("sangria", "0").is_err());
        assert!(parse_positive_amount("sangria", "-5").is_err());
        assert_eq!(
            parse_positive_amount("sangria", "50").unwrap(),
            Money::from_cents(5000)
        );
    }

    #[test]
    fn test_validate_quantity_bounds() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert_eq!(
            validate_quantity(MAX_ITEM_QUANTITY + 1),
            Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: MAX_ITEM_QUANTITY,
            })
        );
        assert!(validate_quantity(i64::MAX).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(MAX_CART_ITEMS - 1).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("name", "  Maria ").unwrap(), "Maria");
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", &"x".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_document() {
        assert_eq!(validate_document("123.456.789-09").unwrap(), "12345678909");
        assert_eq!(
            validate_document("12.345.678/0001-90").unwrap(),
            "12345678000190"
        );
        assert!(validate_document("1234").is_err());
    }

    #[test]
    fn test_validate_new_customer_normalizes() {
        let input = NewCustomer {
            name: " João ".to_string(),
            document: Some("  ".to_string()),
            phones: vec!["(11) 98765-4321".to_string(), "".to_string()],
            email: Some("Joao@Example.com".to_string()),
        };
        let customer = validate_new_customer(&input).unwrap();
        assert_eq!(customer.name, "João");
        assert_eq!(customer.document, None);
        assert_eq!(customer.phones, vec!["11987654321".to_string()]);
        assert_eq!(customer.email.as_deref(), Some("joao@example.com"));
    }

    #[test]
    fn test_validate_new_customer_rejects_bad_email() {
        let input = NewCustomer {
            name: "Ana".to_string(),
            email: Some("ana-at-example".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            validate_new_customer(&input),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("not-a-uuid").is_err());
    }
}
