//! Invoice processing: PDF to tables to line items to validation results.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::audit::{DiscoveryCoordinator, DiscoverySession, ValidationEngine};
use crate::error::{ExtractionError, Result};
use crate::invoice::rules::extract_invoice_meta;
use crate::invoice::{CellAligner, ParsedRows, RowParser};
use crate::models::{AuditConfig, ColumnMap, InvoiceReport, PageTables, RawTable};
use crate::pdf::{PdfExtractor, TableDetector, TextLayoutDetector};
use crate::store::ReferenceStore;

/// Runs one invoice through extraction and validation.
pub struct InvoiceProcessor {
    config: AuditConfig,
    aligner: CellAligner,
    parser: RowParser,
    engine: ValidationEngine,
    detector: Box<dyn TableDetector>,
}

impl InvoiceProcessor {
    /// Create a processor from configuration.
    pub fn new(config: AuditConfig) -> Self {
        Self {
            aligner: CellAligner::new(config.extraction.anchor),
            parser: RowParser::new(&config.extraction.variant_codes),
            engine: ValidationEngine::from_config(&config.validation),
            detector: Box::new(TextLayoutDetector::new()),
            config,
        }
    }

    /// Use a different table detector.
    pub fn with_detector(mut self, detector: impl TableDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Load the pages of an invoice.
    ///
    /// `.json` files hold pre-detected [`PageTables`], `.txt` files hold
    /// page text separated by form feeds, anything else is read as a PDF.
    pub fn load_pages(&self, path: &Path) -> Result<Vec<PageTables>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => load_page_tables(path),
            Some("txt") => {
                let text = std::fs::read_to_string(path)?;
                Ok(self.detect_pages(text.split('\u{0c}').map(str::to_string)))
            }
            _ => {
                let content = PdfExtractor::open(path)?
                    .with_max_pages(self.config.pdf.max_pages)
                    .extract_all()?;
                Ok(self.detect_pages(content.pages.into_iter().map(|p| p.text)))
            }
        }
    }

    /// Run table detection over page texts.
    pub fn detect_pages(&self, texts: impl IntoIterator<Item = String>) -> Vec<PageTables> {
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let number = i as u32 + 1;
                let tables = self.detector.detect(number, &text);
                PageTables {
                    number,
                    text,
                    tables,
                }
            })
            .collect()
    }

    /// Column map and first body row for a table.
    fn columns_for(&self, table: &RawTable) -> (ColumnMap, usize) {
        if self.config.extraction.detect_headers {
            if let Some(columns) = table.rows.first().and_then(|r| ColumnMap::from_header(r)) {
                return (columns, 1);
            }
        }
        (self.config.extraction.columns.clone(), 0)
    }

    /// Extract line items from all pages, numbering lines across the invoice.
    pub fn extract_items(&self, pages: &[PageTables]) -> Result<ParsedRows> {
        let mut parsed = ParsedRows::new();
        let mut next_line = 1;

        for page in pages {
            if page.tables.iter().all(RawTable::is_empty) {
                debug!("No tables on page {}, parsing page text", page.number);
                parsed.extend(self.parser.parse_lines(page.number, page.text.lines(), &mut next_line));
                continue;
            }

            for table in page.tables.iter().filter(|t| !t.is_empty()) {
                let (columns, body_start) = self.columns_for(table);

                if columns.is_usable() {
                    let aligned = self.aligner.align(table, &columns, body_start);
                    let degraded = aligned.rows.iter().filter(|r| r.alignment.is_degraded()).count();
                    if degraded > 0 {
                        warn!(
                            "{} of {} rows on page {} aligned with low confidence",
                            degraded,
                            aligned.rows.len(),
                            table.page
                        );
                    }
                    parsed.extend(self.parser.parse_table(&aligned, &mut next_line));
                } else {
                    debug!("Table on page {} has no usable grid, parsing as text", table.page);
                    let lines = table.text_lines();
                    parsed.extend(self.parser.parse_lines(
                        table.page,
                        lines.iter().map(String::as_str),
                        &mut next_line,
                    ));
                }
            }
        }

        if parsed.items.is_empty() {
            let text_len: usize = pages.iter().map(page_text_len).sum();
            let min = self.config.pdf.min_text_length;
            if text_len >= min {
                return Err(ExtractionError::NoValidLineItems {
                    text_len,
                    skipped: parsed.skipped(),
                }
                .into());
            }
            return Err(ExtractionError::InsufficientText { len: text_len, min }.into());
        }

        let skipped = parsed.skipped();
        if skipped > 0 {
            warn!("{} rows excluded during parsing", skipped);
        }

        Ok(parsed)
    }

    /// Extract and validate one invoice from its pages.
    pub fn process_pages(
        &self,
        source: &str,
        pages: &[PageTables],
        store: &mut dyn ReferenceStore,
        discovery: &mut DiscoveryCoordinator<'_>,
        session: &mut DiscoverySession,
    ) -> Result<InvoiceReport> {
        let text: String = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let invoice = extract_invoice_meta(&text);

        let parsed = self.extract_items(pages)?;
        info!(
            "{} ({}): {} line items, {} rows excluded",
            source,
            invoice.label(),
            parsed.items.len(),
            parsed.skipped()
        );

        let results = self
            .engine
            .validate_all(&parsed.items, store, discovery, session, Some(&invoice))?;

        Ok(InvoiceReport {
            source: source.to_string(),
            invoice,
            results,
            diagnostics: parsed.diagnostics,
        })
    }

    /// Load, extract and validate one invoice file.
    pub fn process_file(
        &self,
        path: &Path,
        store: &mut dyn ReferenceStore,
        discovery: &mut DiscoveryCoordinator<'_>,
        session: &mut DiscoverySession,
    ) -> Result<InvoiceReport> {
        let pages = self.load_pages(path)?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        self.process_pages(&source, &pages, store, discovery, session)
    }
}

/// Read pre-detected page tables from a JSON file.
pub fn load_page_tables(path: &Path) -> Result<Vec<PageTables>> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| ExtractionError::InvalidTables(format!("{}: {}", path.display(), e)).into())
}

/// Amount of readable text on a page.
fn page_text_len(page: &PageTables) -> usize {
    let text = page.text.trim().len();
    if text > 0 {
        return text;
    }
    page.tables
        .iter()
        .flat_map(RawTable::text_lines)
        .map(|l| l.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AutoSkip, Decision, ScriptedChannel};
    use crate::error::AuditError;
    use crate::models::{ChargeType, NewPart, ValidationStatus};
    use crate::store::{MemoryStore, SqliteStore};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn header() -> Vec<String> {
        cells(&["Wearer #", "Wearer", "Item", "Description", "Size", "Type", "Qty", "Rate", "Total"])
    }

    /// One page with two wearers merged into a single stacked row.
    fn stacked_page() -> PageTables {
        PageTables {
            number: 1,
            text: "Invoice Number: 4062217350\nInvoice Date: 03/14/2024".to_string(),
            tables: vec![RawTable::new(
                1,
                vec![
                    header(),
                    cells(&[
                        "9\n9\n10",
                        "MARIA LOPEZ\nMARIA LOPEZ\nJOSEPH HENRY",
                        "GP0171NAVY",
                        "EMBLEM SERVICE\nSTOCKROOM FEE\nPANT WORK DURAPRES COTTON",
                        "40X34",
                        "Ruin charge",
                        "1\n1\n15",
                        "17.500\n2.000\n0.300",
                        "17.50\n2.00\n4.50",
                    ]),
                ],
            )],
        }
    }

    fn run(
        pages: &[PageTables],
        store: &mut dyn ReferenceStore,
        channel: &mut dyn crate::audit::DiscoveryChannel,
    ) -> Result<InvoiceReport> {
        let processor = InvoiceProcessor::new(AuditConfig::default());
        let mut session = DiscoverySession::new();
        let mut discovery = DiscoveryCoordinator::new(channel);
        processor.process_pages("invoice.pdf", pages, store, &mut discovery, &mut session)
    }

    #[test]
    fn test_stacked_row_yields_correct_item() {
        let processor = InvoiceProcessor::new(AuditConfig::default());
        let parsed = processor.extract_items(&[stacked_page()]).unwrap();

        let item = parsed
            .items
            .iter()
            .find(|i| i.item_code.is_some())
            .unwrap();
        assert_eq!(item.item_code.as_deref(), Some("GP0171NAVY"));
        assert_eq!(item.charge_type, ChargeType::RuinCharge);
        assert_eq!(item.rate, dec("0.300"));
        assert_eq!(item.quantity, 15);
        assert_eq!(item.subject.as_deref(), Some("JOSEPH HENRY"));
        assert_eq!(item.line_number, 3);
    }

    #[test]
    fn test_process_pages_reports_statuses() {
        let mut store = MemoryStore::with_parts([NewPart::new(
            ChargeType::RuinCharge,
            "PANT WORK DURAPRES COTTON",
            "GP0171NAVY",
            dec("0.300"),
        )])
        .unwrap();
        let mut channel = AutoSkip;

        let report = run(&[stacked_page()], &mut store, &mut channel).unwrap();

        assert_eq!(report.source, "invoice.pdf");
        assert_eq!(report.invoice.number.as_deref(), Some("4062217350"));
        assert_eq!(report.results.len(), 3);
        // The two fee lines carry no item code
        assert_eq!(report.count(ValidationStatus::Failed), 2);
        assert_eq!(report.count(ValidationStatus::Passed), 1);
        assert!(report.results.iter().all(|r| r.invoice.is_some()));
    }

    #[test]
    fn test_unknown_part_skipped_creates_nothing() {
        let page = PageTables {
            number: 1,
            text: String::new(),
            tables: vec![RawTable::new(
                1,
                vec![
                    header(),
                    cells(&["9", "MARIA LOPEZ", "GS0448", "SHIRT WORK", "M", "Rent", "2", "0.350", "0.70"]),
                ],
            )],
        };
        let mut store = MemoryStore::new();
        let mut channel = ScriptedChannel::new([Decision::Skip]);

        let report = run(&[page], &mut store, &mut channel).unwrap();

        assert_eq!(report.results[0].status, ValidationStatus::Unknown);
        assert!(store.is_empty());
        assert_eq!(channel.presented.len(), 1);
    }

    #[test]
    fn test_readable_text_without_items() {
        let text = "ACME UNIFORM SERVICES\n".repeat(10);
        let page = PageTables {
            number: 1,
            text,
            tables: Vec::new(),
        };

        let processor = InvoiceProcessor::new(AuditConfig::default());
        let err = processor.extract_items(&[page]).unwrap_err();
        assert!(matches!(
            err,
            AuditError::Extraction(ExtractionError::NoValidLineItems { .. })
        ));
        assert!(!err.halts_run());
    }

    #[test]
    fn test_short_text_is_insufficient() {
        let page = PageTables {
            number: 1,
            text: "scan".to_string(),
            tables: Vec::new(),
        };

        let processor = InvoiceProcessor::new(AuditConfig::default());
        let err = processor.extract_items(&[page]).unwrap_err();
        assert!(matches!(
            err,
            AuditError::Extraction(ExtractionError::InsufficientText { len: 4, min: 100 })
        ));
    }

    #[test]
    fn test_line_numbers_continue_across_pages() {
        let first = PageTables {
            number: 1,
            text: "GS0448 SHIRT WORK M Rent 2 0.350 0.70".to_string(),
            tables: Vec::new(),
        };
        let second = PageTables {
            number: 2,
            text: "GS0449 SHIRT WORK L Rent 1 0.350 0.35".to_string(),
            tables: Vec::new(),
        };

        let processor = InvoiceProcessor::new(AuditConfig::default());
        let parsed = processor.extract_items(&[first, second]).unwrap();

        let lines: Vec<(u32, u32)> = parsed.items.iter().map(|i| (i.page, i.line_number)).collect();
        assert_eq!(lines, vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn test_table_without_grid_uses_text_fallback() {
        let table = RawTable::new(
            1,
            vec![
                cells(&["Item", "Description", "Size"]),
                cells(&["GS0448", "SHIRT WORK M Rent 2 0.350 0.70", ""]),
            ],
        );
        let page = PageTables {
            number: 1,
            text: String::new(),
            tables: vec![table],
        };

        let processor = InvoiceProcessor::new(AuditConfig::default());
        let parsed = processor.extract_items(&[page]).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].item_code.as_deref(), Some("GS0448"));
    }

    #[test]
    fn test_process_text_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let invoice = dir.path().join("invoice.txt");
        let layout = |cols: [&str; 9]| {
            cols.iter()
                .zip([10usize, 16, 12, 28, 8, 13, 6, 9, 8])
                .map(|(c, w)| format!("{:<w$}", c, w = w))
                .collect::<String>()
        };
        let text = [
            "Invoice Number: 4062217350".to_string(),
            "Invoice Date: 03/14/2024".to_string(),
            String::new(),
            layout(["Wearer #", "Wearer", "Item", "Description", "Size", "Type", "Qty", "Rate", "Total"]),
            layout(["9", "MARIA LOPEZ", "GS0448", "SHIRT WORK LS BTN COTTON", "M", "Rent", "2", "0.400", "0.80"]),
            "SUBTOTAL  0.80".to_string(),
        ]
        .join("\n");
        std::fs::write(&invoice, text).unwrap();

        let mut store = SqliteStore::open(&dir.path().join("parts.db")).unwrap();
        store
            .create(NewPart::new(ChargeType::Rent, "SHIRT WORK LS BTN COTTON", "GS0448", dec("0.350")))
            .unwrap();

        let processor = InvoiceProcessor::new(AuditConfig::default());
        let mut channel = AutoSkip;
        let mut session = DiscoverySession::new();
        let mut discovery = DiscoveryCoordinator::new(&mut channel);

        let report = processor
            .process_file(&invoice, &mut store, &mut discovery, &mut session)
            .unwrap();

        assert_eq!(report.source, "invoice.txt");
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].status, ValidationStatus::Failed);
        assert_eq!(report.results[0].price_difference, Some(dec("0.050")));
        assert_eq!(report.overcharge(), dec("0.100"));
    }

    #[test]
    fn test_load_page_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.json");
        std::fs::write(
            &path,
            r#"[{"number": 1, "tables": [{"page": 1, "rows": [["GS0448", "SHIRT"]]}]}]"#,
        )
        .unwrap();

        let pages = load_page_tables(&path).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].tables[0].rows[0][0], "GS0448");
        assert_eq!(pages[0].text, "");

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            load_page_tables(&path),
            Err(AuditError::Extraction(ExtractionError::InvalidTables(_)))
        ));
    }
}
