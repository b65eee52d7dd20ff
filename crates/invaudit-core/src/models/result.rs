//! Validation results and per-invoice reports.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::line_item::LineItem;
use super::part::Part;

/// Outcome of validating one line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    /// Billed rate matches the authorized price within tolerance.
    Passed,
    /// Rate mismatch or missing part number.
    Failed,
    /// Part unknown and the user declined to add it.
    Unknown,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Passed => "PASSED",
            ValidationStatus::Failed => "FAILED",
            ValidationStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Invoice-level metadata, attached by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceMeta {
    /// Invoice number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,

    /// Invoice date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl InvoiceMeta {
    /// Short label for prompts and logs.
    pub fn label(&self) -> String {
        match (&self.number, self.date) {
            (Some(n), Some(d)) => format!("{} ({})", n, d),
            (Some(n), None) => n.clone(),
            (None, Some(d)) => format!("dated {}", d),
            (None, None) => "unknown invoice".to_string(),
        }
    }
}

/// Result of validating one line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// The validated line item.
    pub line_item: LineItem,

    /// Resolved reference part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part: Option<Part>,

    /// Rate billed on the invoice.
    pub extracted_price: Decimal,

    /// Authorized price of the resolved part.
    pub authorized_price: Option<Decimal>,

    /// Absolute difference between billed and authorized price.
    pub price_difference: Option<Decimal>,

    pub status: ValidationStatus,

    /// Errors and explanations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    /// Invoice metadata, attached by the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<InvoiceMeta>,
}

impl ValidationResult {
    /// Result for an item that never reached a price comparison.
    pub(crate) fn unresolved(item: &LineItem, status: ValidationStatus, error: String) -> Self {
        Self {
            line_item: item.clone(),
            part: None,
            extracted_price: item.rate,
            authorized_price: None,
            price_difference: None,
            status,
            errors: vec![error],
            invoice: None,
        }
    }

    /// Attach invoice metadata.
    pub fn with_invoice(mut self, meta: InvoiceMeta) -> Self {
        self.invoice = Some(meta);
        self
    }
}

/// Kind of row diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Row excluded from the line item sequence.
    Skipped,
    /// Row accepted with a quality warning.
    Warning,
}

/// Per-row diagnostic produced during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDiagnostic {
    /// Source line number (1-based, per invoice).
    pub line_number: u32,
    pub page: u32,
    pub kind: DiagnosticKind,
    pub reason: String,
    pub raw_text: String,
}

/// Everything produced for one invoice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceReport {
    /// Source file name.
    pub source: String,

    pub invoice: InvoiceMeta,

    /// Validation results in line order.
    pub results: Vec<ValidationResult>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<RowDiagnostic>,
}

impl InvoiceReport {
    /// Number of results with the given status.
    pub fn count(&self, status: ValidationStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Number of rows excluded during parsing.
    pub fn skipped_rows(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Skipped)
            .count()
    }

    /// Sum of price differences over failed results, weighted by quantity.
    pub fn overcharge(&self) -> Decimal {
        self.results
            .iter()
            .filter(|r| r.status == ValidationStatus::Failed)
            .filter_map(|r| {
                r.authorized_price.and_then(|auth| {
                    (r.extracted_price - auth).checked_mul(Decimal::from(r.line_item.quantity))
                })
            })
            .fold(Decimal::ZERO, |total, amount| total.saturating_add(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_label() {
        let meta = InvoiceMeta {
            number: Some("4062217350".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 3, 14),
        };
        assert_eq!(meta.label(), "4062217350 (2024-03-14)");
        assert_eq!(InvoiceMeta::default().label(), "unknown invoice");
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ValidationStatus::Unknown).unwrap();
        assert_eq!(json, "\"UNKNOWN\"");
    }
}
