//! Rendering of invoice reports.

use std::path::Path;

use invaudit_core::invoice::rules::format_amount;
use invaudit_core::models::DiagnosticKind;
use invaudit_core::{InvoiceReport, ValidationStatus};

use super::process::OutputFormat;

/// Render a report in the requested format.
pub fn render(report: &InvoiceReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Csv => render_csv(report),
        OutputFormat::Text => Ok(render_text(report)),
    }
}

fn render_csv(report: &InvoiceReport) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "source",
        "invoice_number",
        "invoice_date",
        "line",
        "page",
        "subject",
        "item_code",
        "description",
        "charge_type",
        "quantity",
        "rate",
        "authorized_price",
        "price_difference",
        "status",
        "errors",
    ])?;

    let invoice_number = report.invoice.number.clone().unwrap_or_default();
    let invoice_date = report
        .invoice
        .date
        .map(|d| d.to_string())
        .unwrap_or_default();

    for result in &report.results {
        let item = &result.line_item;
        wtr.write_record([
            report.source.as_str(),
            &invoice_number,
            &invoice_date,
            &item.line_number.to_string(),
            &item.page.to_string(),
            item.subject.as_deref().unwrap_or(""),
            item.item_code.as_deref().unwrap_or(""),
            &item.description,
            item.charge_type.as_str(),
            &item.quantity.to_string(),
            &item.rate.to_string(),
            &result
                .authorized_price
                .map(|p| p.to_string())
                .unwrap_or_default(),
            &result
                .price_difference
                .map(|p| p.to_string())
                .unwrap_or_default(),
            result.status.as_str(),
            &result.errors.join("; "),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn render_text(report: &InvoiceReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("Source: {}\n", report.source));
    output.push_str(&format!("Invoice: {}\n", report.invoice.label()));
    output.push('\n');

    for result in &report.results {
        let item = &result.line_item;
        output.push_str(&format!(
            "  {:<8} line {:>3}  {:<12} {:<30} {:<12} {} x {}",
            result.status.as_str(),
            item.line_number,
            item.item_code.as_deref().unwrap_or("-"),
            item.description,
            item.charge_type.as_str(),
            item.quantity,
            item.rate
        ));
        if let Some(authorized) = result.authorized_price {
            output.push_str(&format!(" (authorized {})", authorized));
        }
        output.push('\n');
        for error in &result.errors {
            output.push_str(&format!("           {}\n", error));
        }
    }

    let skipped: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::Skipped)
        .collect();
    if !skipped.is_empty() {
        output.push_str("\nExcluded rows:\n");
        for diag in skipped {
            output.push_str(&format!(
                "  line {} (page {}): {}\n",
                diag.line_number, diag.page, diag.reason
            ));
        }
    }

    output.push_str("\nSummary:\n");
    output.push_str(&format!(
        "  Passed:  {}\n",
        report.count(ValidationStatus::Passed)
    ));
    output.push_str(&format!(
        "  Failed:  {}\n",
        report.count(ValidationStatus::Failed)
    ));
    output.push_str(&format!(
        "  Unknown: {}\n",
        report.count(ValidationStatus::Unknown)
    ));
    output.push_str(&format!(
        "  Overcharge: {}\n",
        format_amount(report.overcharge())
    ));

    output
}

/// One line of a batch summary.
pub struct SummaryRow<'a> {
    pub path: &'a Path,
    pub report: Option<&'a InvoiceReport>,
    pub error: Option<&'a str>,
    pub processing_time_ms: u64,
}

/// Write a batch summary CSV.
pub fn write_summary(path: &Path, rows: &[SummaryRow<'_>]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "invoice_number",
        "invoice_date",
        "lines",
        "passed",
        "failed",
        "unknown",
        "excluded_rows",
        "overcharge",
        "processing_time_ms",
        "error",
    ])?;

    for row in rows {
        let filename = row
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        if let Some(report) = row.report {
            wtr.write_record([
                filename,
                "success",
                report.invoice.number.as_deref().unwrap_or(""),
                &report
                    .invoice
                    .date
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
                &report.results.len().to_string(),
                &report.count(ValidationStatus::Passed).to_string(),
                &report.count(ValidationStatus::Failed).to_string(),
                &report.count(ValidationStatus::Unknown).to_string(),
                &report.skipped_rows().to_string(),
                &report.overcharge().to_string(),
                &row.processing_time_ms.to_string(),
                "",
            ])?;
        } else {
            wtr.write_record([
                filename,
                "error",
                "",
                "",
                "",
                "",
                "",
                "",
                "",
                "",
                &row.processing_time_ms.to_string(),
                row.error.unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use invaudit_core::models::{Alignment, InvoiceMeta, RowDiagnostic};
    use invaudit_core::{ChargeType, LineItem, ValidationResult};
    use rust_decimal::Decimal;

    fn report() -> InvoiceReport {
        let item = LineItem {
            line_number: 1,
            page: 1,
            subject: Some("MARIA LOPEZ".to_string()),
            item_code: Some("GS0448".to_string()),
            variant: None,
            description: "SHIRT WORK LS BTN COTTON".to_string(),
            size: Some("M".to_string()),
            charge_type: ChargeType::Rent,
            quantity: 2,
            rate: Decimal::new(400, 3),
            total: Decimal::new(80, 2),
            alignment: Alignment::Confident,
            raw_text: String::new(),
        };
        InvoiceReport {
            source: "march.pdf".to_string(),
            invoice: InvoiceMeta {
                number: Some("4062217350".to_string()),
                date: None,
            },
            results: vec![ValidationResult {
                line_item: item,
                part: None,
                extracted_price: Decimal::new(400, 3),
                authorized_price: Some(Decimal::new(350, 3)),
                price_difference: Some(Decimal::new(50, 3)),
                status: ValidationStatus::Failed,
                errors: vec!["price mismatch".to_string()],
                invoice: None,
            }],
            diagnostics: vec![RowDiagnostic {
                line_number: 2,
                page: 1,
                kind: DiagnosticKind::Skipped,
                reason: "missing quantity".to_string(),
                raw_text: String::new(),
            }],
        }
    }

    #[test]
    fn test_csv_has_one_row_per_result() {
        let csv = render(&report(), OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("march.pdf,4062217350,,1,1,MARIA LOPEZ,GS0448,"));
        assert!(lines[1].contains(",FAILED,price mismatch"));
    }

    #[test]
    fn test_text_summary() {
        let text = render(&report(), OutputFormat::Text).unwrap();
        assert!(text.contains("Invoice: 4062217350"));
        assert!(text.contains("line 2 (page 1): missing quantity"));
        assert!(text.contains("Failed:  1"));
        assert!(text.contains("Overcharge: 0.10"));
    }

    #[test]
    fn test_json_round_trips() {
        let json = render(&report(), OutputFormat::Json).unwrap();
        let parsed: InvoiceReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.diagnostics.len(), 1);
    }
}
