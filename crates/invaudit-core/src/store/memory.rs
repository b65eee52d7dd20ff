//! In-memory reference store.

use std::collections::BTreeMap;

use chrono::Utc;

use super::{ReferenceStore, Result};
use crate::audit::CompositeKey;
use crate::error::StoreError;
use crate::models::{NewPart, Part};

/// Reference store held in memory, used for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    parts: BTreeMap<CompositeKey, Part>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with parts.
    pub fn with_parts(parts: impl IntoIterator<Item = NewPart>) -> Result<Self> {
        let mut store = Self::new();
        for part in parts {
            store.create(part)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl ReferenceStore for MemoryStore {
    fn find(&self, key: &CompositeKey) -> Result<Option<Part>> {
        Ok(self.parts.get(key).cloned())
    }

    fn create(&mut self, part: NewPart) -> Result<Part> {
        if self.parts.contains_key(&part.key) {
            return Err(StoreError::Duplicate(part.key.to_string()));
        }
        let part = part.into_part(Utc::now());
        self.parts.insert(part.key.clone(), part.clone());
        Ok(part)
    }

    fn list(&self) -> Result<Vec<Part>> {
        Ok(self.parts.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChargeType;
    use rust_decimal::Decimal;

    #[test]
    fn test_create_then_find() {
        let mut store = MemoryStore::new();
        let part = NewPart::new(ChargeType::Rent, "Shirt Work", "gs0448", Decimal::new(35, 2));
        let key = part.key.clone();

        store.create(part.clone()).unwrap();
        assert_eq!(store.find(&key).unwrap().unwrap().authorized_price, Decimal::new(35, 2));
        assert!(matches!(store.create(part), Err(StoreError::Duplicate(_))));
        assert_eq!(store.len(), 1);
    }
}
