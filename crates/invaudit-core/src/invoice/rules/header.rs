//! Invoice header extraction: invoice number and date.

use chrono::NaiveDate;

use super::patterns::{DATE_ISO, DATE_LONG, DATE_US, INVOICE_DATE, INVOICE_NUMBER, LABELED_DATE};
use super::{ExtractionMatch, FieldExtractor};
use crate::models::InvoiceMeta;

/// Date field extractor for US-style invoices.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        let mut all = self.extract_all(text);
        all.sort_by_key(|m| m.position.map(|(start, _)| start).unwrap_or(usize::MAX));
        all.into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<Self::Output> = Vec::new();

        // MM/DD/YYYY or MM/DD/YY
        for caps in DATE_US.captures_iter(text) {
            let month: u32 = caps[1].parse().unwrap_or(0);
            let day: u32 = caps[2].parse().unwrap_or(0);
            let year = parse_year(&caps[3]);

            if let (Some(date), Some(m)) = (NaiveDate::from_ymd_opt(year, month, day), caps.get(0)) {
                results.push(
                    ExtractionMatch::new(date, m.as_str()).with_position(m.start(), m.end()),
                );
            }
        }

        // YYYY-MM-DD
        for caps in DATE_ISO.captures_iter(text) {
            let year: i32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            let day: u32 = caps[3].parse().unwrap_or(0);

            if let (Some(date), Some(m)) = (NaiveDate::from_ymd_opt(year, month, day), caps.get(0)) {
                if results.iter().any(|r| r.value == date) {
                    continue;
                }
                results.push(
                    ExtractionMatch::new(date, m.as_str()).with_position(m.start(), m.end()),
                );
            }
        }

        // "March 14, 2024" / "Mar 14 2024"
        for caps in DATE_LONG.captures_iter(text) {
            let month = month_to_number(&caps[1]);
            let day: u32 = caps[2].parse().unwrap_or(0);
            let year: i32 = caps[3].parse().unwrap_or(0);

            if let (Some(date), Some(m)) = (NaiveDate::from_ymd_opt(year, month, day), caps.get(0)) {
                if results.iter().any(|r| r.value == date) {
                    continue;
                }
                results.push(
                    ExtractionMatch::new(date, m.as_str()).with_position(m.start(), m.end()),
                );
            }
        }

        results
    }
}

/// Parse a single date string in any supported format.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    DateExtractor::new().extract(s.trim()).map(|m| m.value)
}

/// Extract the invoice number and date from the document text.
///
/// Labeled fields win; if no date label is present the first date in the
/// text is used.
pub fn extract_invoice_meta(text: &str) -> InvoiceMeta {
    let number = INVOICE_NUMBER
        .captures(text)
        .map(|caps| caps[1].trim_end_matches(['-', '/']).to_string());

    let date = INVOICE_DATE
        .captures(text)
        .or_else(|| LABELED_DATE.captures(text))
        .and_then(|caps| parse_date(&caps[1]))
        .or_else(|| parse_date(text));

    InvoiceMeta { number, date }
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if s.len() <= 2 {
        2000 + year
    } else {
        year
    }
}

fn month_to_number(month: &str) -> u32 {
    let lower = month.to_lowercase();
    let prefix = lower.get(..3).unwrap_or(&lower);
    match prefix {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_date_us() {
        let result = DateExtractor::new().extract("Due 03/14/2024").unwrap();
        assert_eq!(result.value, NaiveDate::from_ymd_opt(2024, 3, 14).unwrap());
        assert_eq!(result.source, "03/14/2024");
        assert_eq!(result.position, Some((4, 14)));
    }

    #[test]
    fn test_two_digit_year() {
        assert_eq!(parse_date("3/14/24"), NaiveDate::from_ymd_opt(2024, 3, 14));
    }

    #[test]
    fn test_iso_and_long() {
        assert_eq!(parse_date("2024-03-14"), NaiveDate::from_ymd_opt(2024, 3, 14));
        assert_eq!(parse_date("March 14, 2024"), NaiveDate::from_ymd_opt(2024, 3, 14));
        assert_eq!(parse_date("Sept. 2, 2024"), NaiveDate::from_ymd_opt(2024, 9, 2));
    }

    #[test]
    fn test_invalid_date() {
        assert_eq!(parse_date("13/45/2024"), None);
        assert_eq!(parse_date("no date here"), None);
    }

    #[test]
    fn test_extract_invoice_meta() {
        let text = r#"
            ACME UNIFORM SERVICES
            Due Date: 04/13/2024
            Invoice Number: 4062217350
            Invoice Date: 03/14/2024
        "#;

        let meta = extract_invoice_meta(text);
        assert_eq!(meta.number.as_deref(), Some("4062217350"));
        assert_eq!(meta.date, NaiveDate::from_ymd_opt(2024, 3, 14));
    }

    #[test]
    fn test_unlabeled_date_fallback() {
        let meta = extract_invoice_meta("Statement generated 2024-05-01 for account 77");
        assert_eq!(meta.number, None);
        assert_eq!(meta.date, NaiveDate::from_ymd_opt(2024, 5, 1));
    }
}
