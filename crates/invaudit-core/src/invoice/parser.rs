//! Row parser: aligned table rows and plain text lines to typed line items.

use rust_decimal::Decimal;
use tracing::debug;

use crate::models::{
    Alignment, AlignedRow, AlignedTable, ChargeType, ColumnMap, ColumnRole, DiagnosticKind,
    LineItem, RowDiagnostic,
};

use super::rules::patterns::{ITEM_CODE, LOOSE_LINE_ITEM, SIZE_TOKEN, TEXT_LINE_ITEM};
use super::rules::{parse_amount, parse_quantity};

/// Largest accepted gap between the billed total and quantity times rate.
const TOTAL_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Outcome of parsing one row or line.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// A valid line item, possibly with quality warnings.
    Item {
        item: LineItem,
        warnings: Vec<String>,
    },
    /// Row excluded, with the reason.
    Skipped(String),
}

/// Line items and diagnostics collected for one invoice.
#[derive(Debug, Clone, Default)]
pub struct ParsedRows {
    pub items: Vec<LineItem>,
    pub diagnostics: Vec<RowDiagnostic>,
}

impl ParsedRows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome, turning skips and warnings into diagnostics.
    pub fn record(&mut self, line_number: u32, page: u32, raw_text: &str, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Item { item, warnings } => {
                for reason in warnings {
                    self.diagnostics.push(RowDiagnostic {
                        line_number,
                        page,
                        kind: DiagnosticKind::Warning,
                        reason,
                        raw_text: raw_text.to_string(),
                    });
                }
                self.items.push(item);
            }
            RowOutcome::Skipped(reason) => {
                debug!("Skipping line {} on page {}: {}", line_number, page, reason);
                self.diagnostics.push(RowDiagnostic {
                    line_number,
                    page,
                    kind: DiagnosticKind::Skipped,
                    reason,
                    raw_text: raw_text.to_string(),
                });
            }
        }
    }

    /// Append another set of parsed rows.
    pub fn extend(&mut self, other: ParsedRows) {
        self.items.extend(other.items);
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn skipped(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Skipped)
            .count()
    }
}

/// Converts aligned rows and text lines into line items.
pub struct RowParser {
    /// Upper-cased variant codes, longest first.
    variant_codes: Vec<String>,
}

impl RowParser {
    /// Create a parser with the given variant vocabulary.
    pub fn new(variant_codes: &[String]) -> Self {
        Self::default().with_variant_codes(variant_codes)
    }

    /// Replace the variant vocabulary.
    pub fn with_variant_codes(mut self, variant_codes: &[String]) -> Self {
        let mut codes: Vec<String> = variant_codes
            .iter()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
        codes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        codes.dedup();
        self.variant_codes = codes;
        self
    }

    fn is_variant(&self, token: &str) -> bool {
        self.variant_codes.iter().any(|v| v == token)
    }

    /// Parse a raw item code cell into (code, variant).
    ///
    /// The stored code keeps the variant attached: "GP0171 NAVY" becomes
    /// `("GP0171NAVY", Some("NAVY"))`. Returns `None` for invalid codes.
    pub fn parse_item_code(&self, raw: &str) -> Option<(String, Option<String>)> {
        let upper = raw.trim().to_uppercase();
        let tokens: Vec<&str> = upper.split_whitespace().collect();

        match tokens.as_slice() {
            [code] => {
                if !ITEM_CODE.is_match(code) {
                    return None;
                }
                let variant = self
                    .variant_codes
                    .iter()
                    .find(|v| code.len() >= v.len() + 2 && code.ends_with(v.as_str()))
                    .cloned();
                Some((code.to_string(), variant))
            }
            [code, variant] if ITEM_CODE.is_match(code) && self.is_variant(variant) => {
                Some((format!("{}{}", code, variant), Some(variant.to_string())))
            }
            _ => None,
        }
    }

    /// Parse one aligned row of a table.
    pub fn parse_row(&self, table: &AlignedTable, row: &AlignedRow, line_number: u32) -> RowOutcome {
        if row.is_blank() {
            return RowOutcome::Skipped("blank row".to_string());
        }
        if ColumnMap::from_header(&row.values).is_some() {
            return RowOutcome::Skipped("header row".to_string());
        }

        let get = |role| table.get(row, role);
        let mut warnings = Vec::new();

        let code_cell = get(ColumnRole::ItemCode);
        let description = get(ColumnRole::Description).unwrap_or_default().to_string();
        let rate_cell = get(ColumnRole::Rate);

        if row.alignment.is_degraded() {
            let missing: Vec<&str> = [
                ("description", description.is_empty()),
                ("item code", code_cell.is_none()),
                ("rate", rate_cell.is_none()),
            ]
            .iter()
            .filter(|(_, absent)| *absent)
            .map(|(name, _)| *name)
            .collect();

            if !missing.is_empty() {
                return RowOutcome::Skipped(format!(
                    "degraded row missing {}",
                    missing.join(", ")
                ));
            }
        }

        let quantity = match parse_quantity(get(ColumnRole::Quantity).unwrap_or_default()) {
            Ok(q) => q,
            Err(reason) => return RowOutcome::Skipped(reason),
        };
        let rate = match parse_money("rate", rate_cell) {
            Ok(r) => r,
            Err(reason) => return RowOutcome::Skipped(reason),
        };
        let total = match parse_money("total", get(ColumnRole::Total)) {
            Ok(t) => t,
            Err(reason) => return RowOutcome::Skipped(reason),
        };

        let (item_code, variant) = match code_cell {
            Some(raw) => match self.parse_item_code(raw) {
                Some((code, variant)) => (Some(code), variant),
                None => {
                    if row.alignment.is_degraded() {
                        return RowOutcome::Skipped(format!(
                            "degraded row has invalid item code '{}'",
                            raw
                        ));
                    }
                    warnings.push(format!("invalid item code '{}' treated as absent", raw));
                    (None, None)
                }
            },
            None => (None, None),
        };

        let charge_type = charge_type(get(ColumnRole::ChargeType), &mut warnings);

        let subject = get(ColumnRole::Subject)
            .or_else(|| get(ColumnRole::SubjectId))
            .map(str::to_string);

        let item = LineItem {
            line_number,
            page: row.page,
            subject,
            item_code,
            variant,
            description,
            size: get(ColumnRole::Size).map(str::to_string),
            charge_type,
            quantity,
            rate,
            total,
            alignment: row.alignment.clone(),
            raw_text: row.raw_text(),
        };

        if let Err(reason) = check_total(&item, &mut warnings) {
            return RowOutcome::Skipped(reason);
        }
        RowOutcome::Item { item, warnings }
    }

    /// Parse every row of an aligned table, numbering from `next_line`.
    pub fn parse_table(&self, table: &AlignedTable, next_line: &mut u32) -> ParsedRows {
        let mut parsed = ParsedRows::new();

        for row in &table.rows {
            let line_number = *next_line;
            *next_line += 1;
            let outcome = self.parse_row(table, row, line_number);
            parsed.record(line_number, row.page, &row.raw_text(), outcome);
        }

        parsed
    }

    /// Parse a plain text line.
    ///
    /// Returns `None` for lines that do not resemble a line item at all.
    pub fn parse_text_line(&self, page: u32, line: &str, line_number: u32) -> Option<RowOutcome> {
        let Some(caps) = TEXT_LINE_ITEM.captures(line) else {
            return LOOSE_LINE_ITEM
                .is_match(line)
                .then(|| RowOutcome::Skipped("unrecognized line format".to_string()));
        };

        let quantity = match parse_quantity(&caps["qty"]) {
            Ok(q) => q,
            Err(reason) => return Some(RowOutcome::Skipped(reason)),
        };
        let rate = match parse_money("rate", Some(&caps["rate"])) {
            Ok(r) => r,
            Err(reason) => return Some(RowOutcome::Skipped(reason)),
        };
        let total = match parse_money("total", Some(&caps["total"])) {
            Ok(t) => t,
            Err(reason) => return Some(RowOutcome::Skipped(reason)),
        };

        let mut warnings = Vec::new();
        let mut rest: Vec<String> = caps["rest"]
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let mut raw_code = caps["code"].to_string();
        if rest.len() > 1 && self.is_variant(&rest[0].to_uppercase()) {
            raw_code = format!("{} {}", raw_code, rest.remove(0));
        }

        let size = if rest.len() > 1 && SIZE_TOKEN.is_match(&rest[rest.len() - 1].to_uppercase()) {
            rest.pop()
        } else {
            None
        };

        let (item_code, variant) = match self.parse_item_code(&raw_code) {
            Some((code, variant)) => (Some(code), variant),
            None => {
                warnings.push(format!("invalid item code '{}' treated as absent", raw_code));
                (None, None)
            }
        };

        let charge_type = charge_type(Some(&caps["charge"]), &mut warnings);

        let item = LineItem {
            line_number,
            page,
            subject: caps.name("subject_id").map(|m| m.as_str().to_string()),
            item_code,
            variant,
            description: rest.join(" "),
            size,
            charge_type,
            quantity,
            rate,
            total,
            alignment: Alignment::Confident,
            raw_text: line.trim().to_string(),
        };

        if let Err(reason) = check_total(&item, &mut warnings) {
            return Some(RowOutcome::Skipped(reason));
        }
        Some(RowOutcome::Item { item, warnings })
    }

    /// Parse plain text lines, numbering from `next_line`.
    ///
    /// Lines that do not resemble line items are ignored without consuming
    /// a line number.
    pub fn parse_lines<'a>(
        &self,
        page: u32,
        lines: impl IntoIterator<Item = &'a str>,
        next_line: &mut u32,
    ) -> ParsedRows {
        let mut parsed = ParsedRows::new();

        for line in lines {
            if let Some(outcome) = self.parse_text_line(page, line, *next_line) {
                parsed.record(*next_line, page, line.trim(), outcome);
                *next_line += 1;
            }
        }

        parsed
    }
}

impl Default for RowParser {
    fn default() -> Self {
        Self {
            variant_codes: Vec::new(),
        }
    }
}

fn parse_money(field: &str, cell: Option<&str>) -> Result<Decimal, String> {
    let raw = cell.ok_or_else(|| format!("missing {}", field))?;
    let value = parse_amount(raw).ok_or_else(|| format!("invalid {} '{}'", field, raw))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(format!("negative {} {}", field, value));
    }
    Ok(value)
}

fn charge_type(cell: Option<&str>, warnings: &mut Vec<String>) -> ChargeType {
    match cell {
        None => {
            warnings.push("missing charge type, using OTHER".to_string());
            ChargeType::Other
        }
        Some(label) => ChargeType::parse(label).unwrap_or_else(|| {
            warnings.push(format!("unrecognized charge type '{}', using OTHER", label));
            ChargeType::Other
        }),
    }
}

fn check_total(item: &LineItem, warnings: &mut Vec<String>) -> Result<(), String> {
    let computed = item
        .computed_total()
        .ok_or_else(|| "amount out of range".to_string())?;
    if (item.total - computed).abs() > TOTAL_TOLERANCE {
        warnings.push(format!(
            "total {} differs from quantity x rate {}",
            item.total, computed
        ));
    }
    Ok(())
}
