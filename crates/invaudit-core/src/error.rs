//! Error types for the invaudit-core library.

use thiserror::Error;

/// Main error type for the invaudit library.
#[derive(Error, Debug)]
pub enum AuditError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Invoice-level extraction failure.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Reference store failure.
    #[error("reference store error: {0}")]
    Store(#[from] StoreError),

    /// Discovery protocol failure.
    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// A part created during discovery could not be found again.
    #[error("consistency violation: part {0} not found immediately after creation")]
    Consistency(String),

    /// The user chose to abort processing.
    #[error("processing aborted by user")]
    Aborted,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AuditError {
    /// Whether this condition stops the whole run rather than a single invoice.
    ///
    /// Store, discovery and configuration failures, consistency violations
    /// and user aborts halt the run. PDF and extraction failures only halt
    /// the invoice they occurred in.
    pub fn halts_run(&self) -> bool {
        matches!(
            self,
            AuditError::Store(_)
                | AuditError::Consistency(_)
                | AuditError::Aborted
                | AuditError::Discovery(_)
                | AuditError::Config(_)
        )
    }
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Invoice-level extraction failures.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Text was readable but no row survived parsing.
    #[error("no valid line items ({text_len} chars of text, {skipped} rows excluded)")]
    NoValidLineItems { text_len: usize, skipped: usize },

    /// Too little text to treat the document as readable.
    #[error("insufficient text: {len} chars (minimum {min})")]
    InsufficientText { len: usize, min: usize },

    /// Externally supplied tables could not be read.
    #[error("invalid table data: {0}")]
    InvalidTables(String),
}

/// Errors raised by a reference store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A part with this key already exists.
    #[error("part already exists: {0}")]
    Duplicate(String),

    /// A stored record could not be decoded.
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
}

/// Errors raised while resolving an unknown part.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The decision channel failed to produce a decision.
    #[error("decision channel failed: {0}")]
    Channel(String),

    /// A price supplied for a new part was rejected.
    #[error("invalid price for new part: {0}")]
    InvalidPrice(String),
}

/// Result type for the invaudit library.
pub type Result<T> = std::result::Result<T, AuditError>;
