//! Raw and aligned table structures.

use serde::{Deserialize, Serialize};

/// Role a column plays in a line item table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    /// Wearer/employee number.
    SubjectId,
    /// Wearer/employee name. Repeats on every sub-line of the same wearer.
    Subject,
    /// Item (part) code.
    ItemCode,
    /// Item description.
    Description,
    /// Garment size.
    Size,
    /// Charge type (rent, ruin charge, ...).
    ChargeType,
    /// Billed quantity.
    Quantity,
    /// Unit rate.
    Rate,
    /// Extended total.
    Total,
    /// Column not used for extraction.
    Ignore,
}

impl ColumnRole {
    /// Recognize a column header label.
    pub fn from_header(label: &str) -> Option<Self> {
        let norm = label
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        let norm = norm.trim_end_matches(['.', ':']);

        let role = match norm {
            "WEARER #" | "WEARER NO" | "EMP #" | "EMP NO" | "EMPLOYEE #" | "EMPLOYEE NO"
            | "#" | "NO" | "ID" => Self::SubjectId,
            "WEARER" | "WEARER NAME" | "EMPLOYEE" | "EMPLOYEE NAME" | "NAME" => Self::Subject,
            "ITEM" | "ITEM #" | "ITEM NO" | "ITEM CODE" | "PART" | "PART #" | "PART NO" | "SKU"
            | "STYLE" => Self::ItemCode,
            "DESCRIPTION" | "DESC" | "ITEM DESCRIPTION" => Self::Description,
            "SIZE" => Self::Size,
            "TYPE" | "CHARGE TYPE" | "CHG TYPE" => Self::ChargeType,
            "QTY" | "QUANTITY" => Self::Quantity,
            "RATE" | "PRICE" | "UNIT PRICE" | "UNIT RATE" => Self::Rate,
            "TOTAL" | "AMOUNT" | "EXT" | "EXTENDED" | "EXT PRICE" | "EXTENSION" => Self::Total,
            _ => return None,
        };
        Some(role)
    }
}

/// Ordered column roles for one table.
///
/// The length of the map is the table's declared column count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMap(Vec<ColumnRole>);

impl ColumnMap {
    /// Create a column map from an ordered role list.
    pub fn new(roles: Vec<ColumnRole>) -> Self {
        Self(roles)
    }

    /// Infer a column map from a header row.
    ///
    /// At least three cells must be recognized; unrecognized cells become
    /// [`ColumnRole::Ignore`].
    pub fn from_header(cells: &[String]) -> Option<Self> {
        let roles: Vec<ColumnRole> = cells
            .iter()
            .map(|c| ColumnRole::from_header(&c.replace('\n', " ")).unwrap_or(ColumnRole::Ignore))
            .collect();

        let recognized = roles.iter().filter(|r| **r != ColumnRole::Ignore).count();
        (recognized >= 3).then(|| Self(roles))
    }

    /// Declared column count.
    pub fn width(&self) -> usize {
        self.0.len()
    }

    pub fn roles(&self) -> &[ColumnRole] {
        &self.0
    }

    /// Index of the first column with the given role.
    pub fn position(&self, role: ColumnRole) -> Option<usize> {
        self.0.iter().position(|r| *r == role)
    }

    pub fn has(&self, role: ColumnRole) -> bool {
        self.position(role).is_some()
    }

    /// Whether rows of this table can be parsed as a grid.
    pub fn is_usable(&self) -> bool {
        self.has(ColumnRole::Quantity) && self.has(ColumnRole::Rate)
    }
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self(vec![
            ColumnRole::SubjectId,
            ColumnRole::Subject,
            ColumnRole::ItemCode,
            ColumnRole::Description,
            ColumnRole::Size,
            ColumnRole::ChargeType,
            ColumnRole::Quantity,
            ColumnRole::Rate,
            ColumnRole::Total,
        ])
    }
}

/// A table as returned by table detection.
///
/// Cells may contain embedded newlines separating stacked sub-values.
/// A table always comes from one region of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    /// Page number (1-indexed).
    pub page: u32,
    /// Rows of cell strings.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(page: u32, rows: Vec<Vec<String>>) -> Self {
        Self { page, rows }
    }

    /// Widest row in the table.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(|c| c.trim().is_empty()))
    }

    /// Flatten the table to plain text lines for the text fallback.
    ///
    /// Each stacked sub-line becomes its own line, cells joined by two spaces.
    pub fn text_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for row in &self.rows {
            let split: Vec<Vec<&str>> = row.iter().map(|c| c.lines().collect()).collect();
            let depth = split.iter().map(Vec::len).max().unwrap_or(0);
            for i in 0..depth {
                let line = split
                    .iter()
                    .filter_map(|col| col.get(i).map(|s| s.trim()))
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join("  ");
                if !line.is_empty() {
                    lines.push(line);
                }
            }
        }
        lines
    }
}

/// Tables and text detected on one page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageTables {
    /// Page number (1-indexed).
    pub number: u32,
    /// Plain text of the page, used by the text fallback.
    #[serde(default)]
    pub text: String,
    /// Detected tables.
    #[serde(default)]
    pub tables: Vec<RawTable>,
}

/// Confidence in the column-to-value correspondence of an aligned row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alignment {
    /// Every value is believed to sit in its own column.
    #[default]
    Confident,
    /// Reconstructed without full confidence.
    Degraded { reason: String },
}

impl Alignment {
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// One rectangular sub-line of a raw table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedRow {
    /// Page number (1-indexed).
    pub page: u32,
    /// Index of the raw row this sub-line came from.
    pub source_row: usize,
    /// Index of the sub-line within the raw row.
    pub sub_line: usize,
    /// One value per declared column; empty string is a placeholder.
    pub values: Vec<String>,
    pub alignment: Alignment,
}

impl AlignedRow {
    /// Non-placeholder value at a column index.
    pub fn value(&self, index: usize) -> Option<&str> {
        self.values
            .get(index)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|v| v.trim().is_empty())
    }

    /// Source text of the row for diagnostics.
    pub fn raw_text(&self) -> String {
        self.values
            .iter()
            .map(|v| v.trim())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// An aligned table: rows of identical width sharing one column map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedTable {
    pub page: u32,
    pub columns: ColumnMap,
    pub rows: Vec<AlignedRow>,
}

impl AlignedTable {
    /// Value of a row in the column with the given role.
    pub fn get<'a>(&self, row: &'a AlignedRow, role: ColumnRole) -> Option<&'a str> {
        self.columns.position(role).and_then(|i| row.value(i))
    }
}
