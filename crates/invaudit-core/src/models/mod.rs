//! Data models for tables, line items, parts, results and configuration.

pub mod config;
pub mod line_item;
pub mod part;
pub mod result;
pub mod table;

pub use config::{
    AuditConfig, DiscoveryConfig, ExtractionConfig, PdfConfig, StoreConfig, ValidationConfig,
};
pub use line_item::{ChargeType, LineItem};
pub use part::{NewPart, Part};
pub use result::{
    DiagnosticKind, InvoiceMeta, InvoiceReport, RowDiagnostic, ValidationResult, ValidationStatus,
};
pub use table::{
    AlignedRow, AlignedTable, Alignment, ColumnMap, ColumnRole, PageTables, RawTable,
};
