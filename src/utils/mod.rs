//! # Utilities Module
//!
//! This module contains helper functions and utilities used
//! across the backend service.

/// Format a pence amount as human-readable GBP.
///
/// ## Examples
///
/// ```rust
/// assert_eq!(format_pence(2500), "£25.00");
/// assert_eq!(format_pence(-2500), "-£25.00");
/// ```
pub fn format_pence(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}£{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a GBP amount string to pence.
///
/// Accepts "25", "25.5", "£25.00" and "1,250.00".
#[allow(dead_code)]
pub fn parse_pence(amount_str: &str) -> Result<i64, String> {
    let cleaned = amount_str.replace(['£', ','], "");

    let amount: f64 = cleaned
        .trim()
        .parse()
        .map_err(|_| format!("Invalid amount: {}", amount_str))?;

    if amount < 0.0 {
        return Err("Amount cannot be negative".to_string());
    }

    Ok((amount * 100.0).round() as i64)
}

/// Derive a user's shareable referral code from their id.
///
/// First 8 characters of the id, uppercased, split as `XXXX-YYYY`.
/// Unique by construction because the id itself is globally unique.
pub fn referral_code_for(user_id: &str) -> String {
    let code: String = user_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_uppercase();

    if code.len() > 4 {
        format!("{}-{}", &code[..4], &code[4..])
    } else {
        code
    }
}

/// Truncate a string to a maximum length.
///
/// Useful for logging long identifiers.
#[allow(dead_code)]
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let half = (max_len - 3) / 2;
        format!("{}...{}", &s[..half], &s[s.len() - half..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pence() {
        assert_eq!(format_pence(2500), "£25.00");
        assert_eq!(format_pence(0), "£0.00");
        assert_eq!(format_pence(50), "£0.50");
        assert_eq!(format_pence(-2500), "-£25.00");
        assert_eq!(format_pence(123456), "£1234.56");
    }

    #[test]
    fn test_parse_pence() {
        assert_eq!(parse_pence("25").unwrap(), 2500);
        assert_eq!(parse_pence("25.50").unwrap(), 2550);
        assert_eq!(parse_pence("£25.00").unwrap(), 2500);
        assert_eq!(parse_pence("1,250.00").unwrap(), 125000);
        assert!(parse_pence("-5").is_err());
        assert!(parse_pence("abc").is_err());
    }

    #[test]
    fn test_referral_code_for() {
        assert_eq!(referral_code_for("a1b2c3d4e5f6"), "A1B2-C3D4");
        // Dashes in the id are skipped, not copied into the code
        assert_eq!(referral_code_for("ab-cd-ef-gh"), "ABCD-EFGH");
        assert_eq!(referral_code_for("abc"), "ABC");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("abcdefghij", 10), "abcdefghij");
        assert_eq!(truncate_string("abcdefghijklmnop", 10), "abc...nop");
    }
}
