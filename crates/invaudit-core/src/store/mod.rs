//! Reference store gateway: lookup and creation of authorized parts.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::audit::CompositeKey;
use crate::error::StoreError;
use crate::models::{NewPart, Part};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Keyed persistent store of parts.
///
/// A part returned by `create` must be visible to the next `find` with the
/// same key.
pub trait ReferenceStore {
    /// Look up a part by key.
    fn find(&self, key: &CompositeKey) -> Result<Option<Part>>;

    /// Persist a new part. Fails with [`StoreError::Duplicate`] if the key exists.
    fn create(&mut self, part: NewPart) -> Result<Part>;

    /// All parts, ordered by key.
    fn list(&self) -> Result<Vec<Part>>;
}
