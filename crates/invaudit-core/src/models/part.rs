//! Reference parts with authorized prices.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::line_item::{ChargeType, LineItem};
use crate::audit::CompositeKey;

/// A billable part as held in the reference store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Identity of the part.
    pub key: CompositeKey,

    /// Item code as recorded.
    pub item_code: String,

    /// Description as recorded.
    pub description: String,

    pub charge_type: ChargeType,

    /// Authorized unit price.
    pub authorized_price: Decimal,

    /// Optional category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Free-form metadata (discovery provenance, notes).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,

    /// When the part was added.
    pub created_at: DateTime<Utc>,
}

/// Request to create a part.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPart {
    pub key: CompositeKey,
    pub item_code: String,
    pub description: String,
    pub charge_type: ChargeType,
    pub authorized_price: Decimal,
    pub category: Option<String>,
    pub metadata: serde_json::Value,
}

impl NewPart {
    /// Build a part request from raw components.
    pub fn new(
        charge_type: ChargeType,
        description: &str,
        item_code: &str,
        authorized_price: Decimal,
    ) -> Self {
        Self {
            key: CompositeKey::new(charge_type, description, item_code),
            item_code: item_code.trim().to_uppercase(),
            description: description.trim().to_string(),
            charge_type,
            authorized_price,
            category: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Build a part request for a line item that was not found.
    pub fn from_line_item(item: &LineItem, key: CompositeKey, authorized_price: Decimal) -> Self {
        Self {
            key,
            item_code: item.item_code.clone().unwrap_or_default(),
            description: item.description.clone(),
            charge_type: item.charge_type,
            authorized_price,
            category: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Materialize the part with a creation time.
    pub fn into_part(self, created_at: DateTime<Utc>) -> Part {
        Part {
            key: self.key,
            item_code: self.item_code,
            description: self.description,
            charge_type: self.charge_type,
            authorized_price: self.authorized_price,
            category: self.category,
            metadata: self.metadata,
            created_at,
        }
    }
}
