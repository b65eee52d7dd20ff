//! Money and quantity parsing for invoice cells.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{AMOUNT, QUANTITY};

/// Parse a money cell (e.g. "$1,234.56", "0.300", "(4.50)").
///
/// The whole cell must be an amount: an optional dollar sign, digits with
/// optional thousands separators and an optional fraction. Parentheses or a
/// leading minus denote a negative amount. Anything else is `None`.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let caps = AMOUNT.captures(s.trim())?;

    let integer = caps.name("int").map(|m| m.as_str());
    let fraction = caps.name("frac").map(|m| m.as_str());
    if integer.is_none() && fraction.is_none() {
        return None;
    }
    if caps.name("open").is_some() != caps.name("close").is_some() {
        return None;
    }

    let number = format!(
        "{}{}",
        integer.unwrap_or("0").replace(',', ""),
        fraction.unwrap_or_default()
    );
    let value = Decimal::from_str(&number).ok()?;

    let negative = caps.name("open").is_some() || caps.name("neg").is_some();
    Some(if negative { -value } else { value })
}

/// Parse a quantity cell into a positive integer.
///
/// The error string is the reason reported for the skipped row.
pub fn parse_quantity(s: &str) -> Result<u32, String> {
    let trimmed = s.trim().replace(',', "");
    if trimmed.is_empty() {
        return Err("missing quantity".to_string());
    }
    if !QUANTITY.is_match(&trimmed) {
        return Err(format!("non-integral quantity '{}'", s.trim()));
    }

    let whole = trimmed.split('.').next().unwrap_or_default();
    let value: i64 = whole
        .parse()
        .map_err(|_| format!("invalid quantity '{}'", s.trim()))?;

    if value <= 0 {
        return Err(format!("non-positive quantity {}", value));
    }

    u32::try_from(value).map_err(|_| format!("quantity {} out of range", value))
}

/// Format an amount with thousands separators ("1,234.56").
pub fn format_amount(amount: Decimal) -> String {
    let s = format!("{:.2}", amount.round_dp(2));
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.as_str()),
    };

    let (integer_part, decimal_part) = digits.split_once('.').unwrap_or((digits, "00"));

    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(*c);
    }

    format!("{}{}.{}", sign, formatted, decimal_part)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("0.300"), Some(Decimal::from_str("0.300").unwrap()));
        assert_eq!(parse_amount("$1,234.56"), Some(Decimal::from_str("1234.56").unwrap()));
        assert_eq!(parse_amount(" 4.50 "), Some(Decimal::from_str("4.50").unwrap()));
        assert_eq!(parse_amount("(4.50)"), Some(Decimal::from_str("-4.50").unwrap()));
        assert_eq!(parse_amount("-2"), Some(Decimal::from(-2)));
        assert_eq!(parse_amount("-$3.10"), Some(Decimal::from_str("-3.10").unwrap()));
        assert_eq!(parse_amount(".5"), Some(Decimal::from_str("0.5").unwrap()));
        assert_eq!(parse_amount("1234.56"), Some(Decimal::from_str("1234.56").unwrap()));
    }

    #[test]
    fn test_parse_amount_invalid() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("N/A"), None);
        assert_eq!(parse_amount("1.2.3"), None);
        assert_eq!(parse_amount("$"), None);
        assert_eq!(parse_amount("(4.50"), None);
        assert_eq!(parse_amount("1,23"), None);
    }

    #[test]
    fn test_parse_amount_rejects_text_with_digits() {
        assert_eq!(parse_amount("GP0171"), None);
        assert_eq!(parse_amount("4/50"), None);
        assert_eq!(parse_amount("12 EA x3"), None);
        assert_eq!(parse_amount("40X34"), None);
        assert_eq!(parse_amount("SHIRT 2.00"), None);
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("15"), Ok(15));
        assert_eq!(parse_quantity("15.0"), Ok(15));
        assert_eq!(parse_quantity("1,200"), Ok(1200));
    }

    #[test]
    fn test_parse_quantity_rejects() {
        assert!(parse_quantity("").is_err());
        assert!(parse_quantity("0").is_err());
        assert!(parse_quantity("-3").is_err());
        assert!(parse_quantity("2.5").is_err());
        assert!(parse_quantity("abc").is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::from_str("1234.56").unwrap()), "1,234.56");
        assert_eq!(format_amount(Decimal::from_str("0.3").unwrap()), "0.30");
        assert_eq!(format_amount(Decimal::from_str("-12345678.9").unwrap()), "-12,345,678.90");
    }
}
