//! Input validation for API requests.
//!
//! Field validators return `Err(message)` so handlers can collect several
//! failures with `ValidationErrorBuilder` before rejecting a request.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::db::{RoomStatus, RoomType};

lazy_static! {
    /// Loose email shape check: local@domain. Dotless domains such as
    /// `admin@localhost` are accepted.
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^@\s]+@[^@\s]+$"
    ).unwrap();
}

/// Longest accepted room number
pub const MAX_ROOM_NUMBER_LEN: usize = 20;

/// Validate a login email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.trim().is_empty() {
        return Err("The email field is required.".to_string());
    }

    if email.len() > 254 {
        return Err("The email field must not be greater than 254 characters.".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("The email field must be a valid email address.".to_string());
    }

    Ok(())
}

/// Validate a login password (presence only)
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("The password field is required.".to_string());
    }
    Ok(())
}

/// Validate and normalise a room number. Returns the trimmed value.
pub fn validate_room_number(number: &str) -> Result<String, String> {
    let trimmed = number.trim();

    if trimmed.is_empty() {
        return Err("Room number is required".to_string());
    }

    if trimmed.chars().count() > MAX_ROOM_NUMBER_LEN {
        return Err(format!(
            "Room number is too long (max {} characters)",
            MAX_ROOM_NUMBER_LEN
        ));
    }

    Ok(trimmed.to_string())
}

pub fn validate_room_type(value: &str) -> Result<RoomType, String> {
    if value.trim().is_empty() {
        return Err("Room type is required".to_string());
    }
    value.trim().parse()
}

pub fn validate_room_status(value: &str) -> Result<RoomStatus, String> {
    if value.trim().is_empty() {
        return Err("Status is required".to_string());
    }
    value.trim().parse()
}

/// Parse a nightly price. HTML number inputs submit strings, so both JSON
/// numbers and numeric strings are accepted.
pub fn validate_price(value: &Value) -> Result<f64, String> {
    let price = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => {
            return Err("Price per night is required".to_string())
        }
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null => return Err("Price per night is required".to_string()),
        _ => None,
    };

    let price = price.ok_or_else(|| "Price per night must be a number".to_string())?;

    if !price.is_finite() {
        return Err("Price per night must be a number".to_string());
    }

    if price <= 0.0 {
        return Err("Price per night must be greater than zero".to_string());
    }

    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_emails() {
        assert!(validate_email("a@x.com").is_ok());
        assert!(validate_email("front.desk+night@hotel.example.org").is_ok());
        assert!(validate_email("admin@localhost").is_ok());
        assert!(validate_email("a@b").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        assert!(validate_email("").is_err());
        assert!(validate_email("   ").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@x.com").is_err());
        assert!(validate_email("a@").is_err());
        assert!(validate_email("a@@b").is_err());
        assert!(validate_email("a b@x.com").is_err());
    }

    #[test]
    fn test_room_number() {
        assert_eq!(validate_room_number(" 101 "), Ok("101".to_string()));
        assert_eq!(validate_room_number("B-12"), Ok("B-12".to_string()));
        assert!(validate_room_number("").is_err());
        assert!(validate_room_number("   ").is_err());
        assert!(validate_room_number(&"9".repeat(MAX_ROOM_NUMBER_LEN + 1)).is_err());
    }

    #[test]
    fn test_room_enums() {
        assert_eq!(validate_room_type("double"), Ok(RoomType::Double));
        assert!(validate_room_type("").unwrap_err().contains("required"));
        assert!(validate_room_type("loft").unwrap_err().contains("one of"));
        assert_eq!(validate_room_status("occupied"), Ok(RoomStatus::Occupied));
        assert!(validate_room_status("dirty").is_err());
    }

    #[test]
    fn test_price_accepts_numbers_and_numeric_strings() {
        assert_eq!(validate_price(&json!(50)), Ok(50.0));
        assert_eq!(validate_price(&json!(79.99)), Ok(79.99));
        assert_eq!(validate_price(&json!("120")), Ok(120.0));
        assert_eq!(validate_price(&json!(" 45.5 ")), Ok(45.5));
    }

    #[test]
    fn test_price_rejections() {
        assert!(validate_price(&json!(0)).unwrap_err().contains("greater than zero"));
        assert!(validate_price(&json!(-10)).is_err());
        assert!(validate_price(&json!("")).unwrap_err().contains("required"));
        assert!(validate_price(&json!(null)).unwrap_err().contains("required"));
        assert!(validate_price(&json!("abc")).unwrap_err().contains("number"));
        assert!(validate_price(&json!("NaN")).is_err());
        assert!(validate_price(&json!("inf")).is_err());
        assert!(validate_price(&json!(true)).is_err());
    }
}
