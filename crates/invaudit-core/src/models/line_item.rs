//! Typed invoice line items.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::table::Alignment;

/// Kind of charge billed on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeType {
    /// Recurring rental charge.
    Rent,
    /// Charge for a lost garment.
    LossCharge,
    /// Charge for a ruined garment.
    RuinCharge,
    /// Preparation (emblem, hemming) charge.
    PrepCharge,
    /// Any label not recognized above.
    Other,
}

impl ChargeType {
    /// Parse a charge type label.
    ///
    /// Case-insensitive; spaces, hyphens and underscores are equivalent.
    /// Returns `None` for unrecognized labels.
    pub fn parse(s: &str) -> Option<Self> {
        let norm = s
            .replace(['-', '_'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();

        match norm.as_str() {
            "RENT" | "RENTAL" => Some(ChargeType::Rent),
            "LOSS CHARGE" | "LOSS" | "LOST" => Some(ChargeType::LossCharge),
            "RUIN CHARGE" | "RUIN" | "RUINED" => Some(ChargeType::RuinCharge),
            "PREP CHARGE" | "PREP" | "PREPARATION" => Some(ChargeType::PrepCharge),
            "OTHER" => Some(ChargeType::Other),
            _ => None,
        }
    }

    /// Parse a label, falling back to [`ChargeType::Other`].
    pub fn from_label(s: &str) -> Self {
        Self::parse(s).unwrap_or(ChargeType::Other)
    }

    /// Canonical spelling, as used in composite keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeType::Rent => "RENT",
            ChargeType::LossCharge => "LOSS_CHARGE",
            ChargeType::RuinCharge => "RUIN_CHARGE",
            ChargeType::PrepCharge => "PREP_CHARGE",
            ChargeType::Other => "OTHER",
        }
    }
}

impl fmt::Display for ChargeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single billable line extracted from an invoice.
///
/// Line items are never mutated after parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Source line number (1-based, per invoice).
    pub line_number: u32,

    /// Page the line came from.
    pub page: u32,

    /// Wearer/subject label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Item code including any color/variant suffix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_code: Option<String>,

    /// Color/variant suffix recognized on the item code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,

    /// Item description.
    pub description: String,

    /// Garment size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    pub charge_type: ChargeType,

    pub quantity: u32,

    /// Unit rate as billed.
    pub rate: Decimal,

    /// Extended total as billed.
    pub total: Decimal,

    /// Alignment confidence of the row this item came from.
    pub alignment: Alignment,

    /// Raw source text.
    pub raw_text: String,
}

impl LineItem {
    /// Quantity times rate, or `None` when the product does not fit a `Decimal`.
    pub fn computed_total(&self) -> Option<Decimal> {
        Decimal::from(self.quantity).checked_mul(self.rate)
    }
}
