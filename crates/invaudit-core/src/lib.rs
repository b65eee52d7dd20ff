//! Core library for invoice price auditing.
//!
//! This crate provides:
//! - PDF text extraction and table detection
//! - Cell alignment for tables with stacked multi-line cells
//! - Line item parsing (item codes, charge types, quantities, rates)
//! - Composite part keys and a SQLite reference store
//! - Price validation with interactive discovery of unknown parts

pub mod audit;
pub mod error;
pub mod invoice;
pub mod models;
pub mod pdf;
pub mod pipeline;
pub mod store;

pub use audit::{
    AutoSkip, CompositeKey, Decision, DiscoveryChannel, DiscoveryContext, DiscoveryCoordinator,
    DiscoverySession, ValidationEngine,
};
pub use error::{AuditError, Result};
pub use invoice::{CellAligner, RowParser};
pub use models::{
    AuditConfig, ChargeType, InvoiceMeta, InvoiceReport, LineItem, NewPart, Part,
    ValidationResult, ValidationStatus,
};
pub use pdf::{PdfContent, PdfExtractor, PdfProcessor};
pub use pipeline::{load_page_tables, InvoiceProcessor};
pub use store::{MemoryStore, ReferenceStore, SqliteStore};
