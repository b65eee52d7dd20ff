//! SQLite-backed reference store.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::{ReferenceStore, Result};
use crate::audit::CompositeKey;
use crate::error::StoreError;
use crate::models::{ChargeType, NewPart, Part};

const SELECT_PART: &str = "SELECT composite_key, item_code, description, charge_type,
        authorized_price, category, metadata, created_at
    FROM parts";

/// Reference store persisted in a SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

/// Columns of a `parts` row before decoding.
struct PartRow {
    key: String,
    item_code: String,
    description: String,
    charge_type: String,
    authorized_price: String,
    category: Option<String>,
    metadata: Option<String>,
    created_at: String,
}

impl SqliteStore {
    /// Open (and create if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self { conn };
        store.setup()?;
        info!("Opened parts database at {}", path.display());
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.setup()?;
        Ok(store)
    }

    fn setup(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS parts (
                composite_key TEXT PRIMARY KEY,
                item_code TEXT NOT NULL,
                description TEXT NOT NULL,
                charge_type TEXT NOT NULL,
                authorized_price TEXT NOT NULL,
                category TEXT,
                metadata TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_parts_item_code ON parts(item_code)",
            [],
        )?;

        Ok(())
    }

    /// Number of stored parts.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM parts", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl ReferenceStore for SqliteStore {
    fn find(&self, key: &CompositeKey) -> Result<Option<Part>> {
        let sql = format!("{} WHERE composite_key = ?1", SELECT_PART);
        let row = self
            .conn
            .query_row(&sql, params![key.as_str()], read_row)
            .optional()?;

        row.map(PartRow::decode).transpose()
    }

    fn create(&mut self, part: NewPart) -> Result<Part> {
        let part = part.into_part(Utc::now());
        let metadata = if part.metadata.is_null() {
            None
        } else {
            Some(part.metadata.to_string())
        };

        let tx = self.conn.transaction()?;
        let result = tx.execute(
            "INSERT INTO parts (
                composite_key, item_code, description, charge_type,
                authorized_price, category, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                part.key.as_str(),
                part.item_code,
                part.description,
                part.charge_type.as_str(),
                part.authorized_price.to_string(),
                part.category,
                metadata,
                part.created_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::Duplicate(part.key.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        tx.commit()?;

        debug!("Stored part {} at {}", part.key, part.authorized_price);
        Ok(part)
    }

    fn list(&self) -> Result<Vec<Part>> {
        let sql = format!("{} ORDER BY composite_key", SELECT_PART);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], read_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(PartRow::decode).collect()
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<PartRow> {
    Ok(PartRow {
        key: row.get(0)?,
        item_code: row.get(1)?,
        description: row.get(2)?,
        charge_type: row.get(3)?,
        authorized_price: row.get(4)?,
        category: row.get(5)?,
        metadata: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl PartRow {
    fn decode(self) -> Result<Part> {
        let invalid = |what: &str| StoreError::InvalidRecord(format!("{} for {}", what, self.key));

        let key = CompositeKey::parse(&self.key).ok_or_else(|| invalid("malformed key"))?;
        let charge_type =
            ChargeType::parse(&self.charge_type).ok_or_else(|| invalid("unknown charge type"))?;
        let authorized_price =
            Decimal::from_str(&self.authorized_price).map_err(|_| invalid("invalid price"))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| invalid("invalid timestamp"))?;
        let metadata = match &self.metadata {
            Some(json) => serde_json::from_str(json).map_err(|_| invalid("invalid metadata"))?,
            None => serde_json::Value::Null,
        };

        Ok(Part {
            key,
            item_code: self.item_code,
            description: self.description,
            charge_type,
            authorized_price,
            category: self.category,
            metadata,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shirt() -> NewPart {
        NewPart::new(
            ChargeType::Rent,
            "SHIRT WORK LS BTN COTTON",
            "GS0448",
            Decimal::from_str("0.350").unwrap(),
        )
    }

    #[test]
    fn test_create_and_find() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let created = store.create(shirt()).unwrap();

        let key = CompositeKey::from_parts("Rent", " shirt   work ls btn cotton ", "gs0448");
        let found = store.find(&key).unwrap().unwrap();

        assert_eq!(found.key, created.key);
        assert_eq!(found.authorized_price, Decimal::from_str("0.350").unwrap());
        assert_eq!(found.charge_type, ChargeType::Rent);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_find_missing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let key = CompositeKey::from_parts("RENT", "NOTHING", "XX01");
        assert_eq!(store.find(&key).unwrap(), None);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create(shirt()).unwrap();
        assert!(matches!(store.create(shirt()), Err(StoreError::Duplicate(_))));
    }

    #[test]
    fn test_metadata_and_category_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parts.db");

        {
            let mut store = SqliteStore::open(&path).unwrap();
            let part = shirt()
                .with_category("shirts")
                .with_metadata(serde_json::json!({"source": "discovery"}));
            store.create(part).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let parts = store.list().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].category.as_deref(), Some("shirts"));
        assert_eq!(parts[0].metadata["source"], "discovery");
    }

    #[test]
    fn test_list_ordered_by_key() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .create(NewPart::new(ChargeType::RuinCharge, "PANT", "GP0171NAVY", Decimal::ONE))
            .unwrap();
        store.create(shirt()).unwrap();

        let keys: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|p| p.key.to_string())
            .collect();
        assert_eq!(
            keys,
            vec!["RENT|SHIRT WORK LS BTN COTTON|GS0448", "RUIN_CHARGE|PANT|GP0171NAVY"]
        );
    }
}
