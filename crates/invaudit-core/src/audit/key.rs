//! Composite key derivation.
//!
//! A part is identified by `charge_type|description|item_code`. Each component
//! is trimmed, upper-cased and has its internal whitespace collapsed before
//! concatenation, so formatting noise on the invoice never changes identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::line_item::{ChargeType, LineItem};

const SEPARATOR: char = '|';

/// Normalized identity of a billable part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeKey(String);

/// Normalize one key component.
///
/// Total and idempotent: `normalize_component(normalize_component(x)) ==
/// normalize_component(x)`.
pub fn normalize_component(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
        .replace(SEPARATOR, "/")
}

impl CompositeKey {
    /// Build a key from a typed charge type and raw description/item code.
    pub fn new(charge_type: ChargeType, description: &str, item_code: &str) -> Self {
        Self(format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            charge_type.as_str(),
            normalize_component(description),
            normalize_component(item_code)
        ))
    }

    /// Build a key from raw string components.
    ///
    /// The charge type label is mapped to its canonical spelling, so
    /// `"Ruin charge"` and `"RUIN_CHARGE"` give the same key.
    pub fn from_parts(charge_type: &str, description: &str, item_code: &str) -> Self {
        Self::new(ChargeType::from_label(charge_type), description, item_code)
    }

    /// Derive the key for a line item. Returns `None` without an item code.
    pub fn for_item(item: &LineItem) -> Option<Self> {
        item.item_code
            .as_deref()
            .map(|code| Self::new(item.charge_type, &item.description, code))
    }

    /// Parse and re-normalize a stored key.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, SEPARATOR);
        let charge = parts.next()?;
        let description = parts.next()?;
        let item_code = parts.next()?;
        Some(Self::from_parts(charge, description, item_code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The (charge type, description, item code) components.
    pub fn components(&self) -> (&str, &str, &str) {
        let mut parts = self.0.splitn(3, SEPARATOR);
        (
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default(),
        )
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
