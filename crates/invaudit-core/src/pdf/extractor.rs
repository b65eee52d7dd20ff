//! PDF text extraction using lopdf and pdf-extract.

use lopdf::Document;
use std::path::Path;
use tracing::{debug, trace, warn};

use super::{PdfProcessor, Result};
use crate::error::PdfError;

/// PDF content extractor using lopdf.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
    max_pages: usize,
}

/// Extracted content from a PDF.
#[derive(Debug, Clone, Default)]
pub struct PdfContent {
    /// Text of the whole document.
    pub text: String,
    /// Pages with their content.
    pub pages: Vec<PdfPage>,
}

/// Content from a single PDF page.
#[derive(Debug, Clone)]
pub struct PdfPage {
    /// Page number (1-indexed).
    pub number: u32,
    /// Extracted text from this page.
    pub text: String,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
            max_pages: 0,
        }
    }

    /// Limit the number of pages extracted (0 = unlimited).
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Read and load a PDF file.
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| PdfError::Parse(format!("{}: {}", path.display(), e)))?;
        let mut extractor = Self::new();
        extractor.load(&data)?;
        Ok(extractor)
    }

    /// Extract the document text and the text of every page.
    pub fn extract_all(&self) -> Result<PdfContent> {
        let page_count = self.page_count();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        let last_page = match self.max_pages {
            0 => page_count,
            n => page_count.min(u32::try_from(n).unwrap_or(u32::MAX)),
        };

        let mut pages = Vec::with_capacity(last_page as usize);
        let mut full_text = String::new();
        // pdf-extract output, computed at most once for pages lopdf cannot read
        let mut document_text: Option<String> = None;

        for page_num in 1..=last_page {
            let page_text = if page_count == 1 {
                self.extract_text()?
            } else {
                match self.lopdf_page_text(page_num)? {
                    Some(text) => text,
                    None => {
                        if document_text.is_none() {
                            document_text = Some(self.extract_text()?);
                        }
                        split_page_text(
                            document_text.as_deref().unwrap_or_default(),
                            page_num,
                            page_count,
                        )
                    }
                }
            };

            if !page_text.is_empty() {
                if !full_text.is_empty() {
                    full_text.push_str("\n\n");
                }
                full_text.push_str(&page_text);
            }

            pages.push(PdfPage {
                number: page_num,
                text: page_text,
            });
        }

        debug!(
            "PDF extraction: {} of {} pages, {} chars text",
            last_page,
            page_count,
            full_text.len()
        );

        Ok(PdfContent {
            text: full_text,
            pages,
        })
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("No document loaded".to_string()))
    }

    /// Page text from lopdf, or `None` when it has none to offer.
    fn lopdf_page_text(&self, page: u32) -> Result<Option<String>> {
        match self.document()?.extract_text(&[page]) {
            Ok(text) if !text.trim().is_empty() => Ok(Some(text)),
            Ok(_) => {
                trace!("lopdf returned no text for page {}, splitting full text", page);
                Ok(None)
            }
            Err(e) => {
                warn!("lopdf failed on page {}: {}; splitting full text", page, e);
                Ok(None)
            }
        }
    }
}

/// Approximate one page of `text` by splitting its lines evenly across
/// `page_count` pages.
fn split_page_text(text: &str, page: u32, page_count: u32) -> String {
    if page == 0 || page_count == 0 {
        return String::new();
    }

    let lines: Vec<&str> = text.lines().collect();
    let lines_per_page = lines.len().div_ceil(page_count as usize);
    let start = ((page - 1) as usize) * lines_per_page;
    let end = (page as usize) * lines_per_page;

    lines[start.min(lines.len())..end.min(lines.len())].join("\n")
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf_extract needs the decrypted bytes
            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_text(&self) -> Result<String> {
        let text = pdf_extract::extract_text_from_mem(&self.raw_data)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))?;
        Ok(text)
    }

    fn extract_page_text(&self, page: u32) -> Result<String> {
        let page_count = self.page_count();
        if page == 0 || page > page_count {
            return Err(PdfError::InvalidPage(page));
        }

        // pdf-extract keeps the column layout best; use it when there is
        // only one page to attribute the text to.
        if page_count == 1 {
            return self.extract_text();
        }

        match self.lopdf_page_text(page)? {
            Some(text) => Ok(text),
            None => Ok(split_page_text(&self.extract_text()?, page, page_count)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_extractor_new() {
        let extractor = PdfExtractor::new();
        assert!(extractor.document.is_none());
        assert_eq!(extractor.page_count(), 0);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let mut extractor = PdfExtractor::new();
        let err = extractor.load(b"not a pdf").unwrap_err();
        assert!(matches!(err, PdfError::Parse(_)));
    }

    #[test]
    fn test_page_bounds() {
        let extractor = PdfExtractor::new();
        assert!(matches!(extractor.extract_page_text(1), Err(PdfError::InvalidPage(1))));
        assert!(matches!(extractor.extract_all(), Err(PdfError::NoPages)));
    }

    #[test]
    fn test_split_page_text() {
        let text = "a\nb\nc\nd\ne";
        assert_eq!(split_page_text(text, 1, 2), "a\nb\nc");
        assert_eq!(split_page_text(text, 2, 2), "d\ne");
        assert_eq!(split_page_text(text, 3, 2), "");
        assert_eq!(split_page_text("", 1, 3), "");
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PdfExtractor::open(&dir.path().join("missing.pdf")).is_err());
    }
}
