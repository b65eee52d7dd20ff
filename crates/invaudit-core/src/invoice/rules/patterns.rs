//! Common regex patterns for line item and invoice header extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Item code: alphanumeric, at least 2 characters (upper-cased input)
    pub static ref ITEM_CODE: Regex = Regex::new(
        r"^[A-Z0-9]{2,}$"
    ).unwrap();

    // Garment size tokens (upper-cased input)
    pub static ref SIZE_TOKEN: Regex = Regex::new(
        r"^(?:\d{1,3}X\d{1,3}|\d{1,3}[RLST]?|X{0,4}[SML]|[2-6]XL|XXL|XXXL|OS|OSFA|REG|LONG|TALL)$"
    ).unwrap();

    // Integer quantity, optionally with a zero fraction ("15", "15.0")
    pub static ref QUANTITY: Regex = Regex::new(
        r"^-?\d+(?:\.0+)?$"
    ).unwrap();

    // Whole money cell: "(4.50)", "-2", "$1,234.56", "0.300", ".5"
    pub static ref AMOUNT: Regex = Regex::new(
        r"^(?P<open>\()?\s*(?P<neg>-)?\s*\$?\s*(?P<int>\d{1,3}(?:,\d{3})+|\d+)?(?P<frac>\.\d+)?\s*(?P<close>\))?$"
    ).unwrap();

    // Plain-text line item, used when no usable table grid was detected:
    // [subject id] CODE [VARIANT] DESCRIPTION [SIZE] TYPE QTY RATE TOTAL
    pub static ref TEXT_LINE_ITEM: Regex = Regex::new(
        r"(?ix)^\s*
        (?:(?P<subject_id>\d{1,8})\s+)?
        (?P<code>[A-Z0-9]*[A-Z][A-Z0-9]*)\s+
        (?P<rest>.+?)\s+
        (?P<charge>rent(?:al)?|(?:loss|ruin|prep)(?:[\s_-]+charge)?)\s+
        (?P<qty>-?\d+)\s+
        (?P<rate>\$?\d[\d,]*(?:\.\d+)?)\s+
        (?P<total>\$?\d[\d,]*\.\d{2})\s*$"
    ).unwrap();

    // Anything ending in quantity, rate and total looks like an item line
    pub static ref LOOSE_LINE_ITEM: Regex = Regex::new(
        r"\s-?\d+\s+\$?\d[\d,]*(?:\.\d+)?\s+\$?\d[\d,]*\.\d{2}\s*$"
    ).unwrap();

    // Invoice number
    pub static ref INVOICE_NUMBER: Regex = Regex::new(
        r"(?i)invoice\s*(?:no\.?|number|num\.?|#)\s*[:#]?\s*([A-Z0-9][A-Z0-9\-/]*\d[A-Z0-9\-/]*)"
    ).unwrap();

    // Labeled dates
    pub static ref INVOICE_DATE: Regex = Regex::new(
        r"(?i)invoice\s+date\s*:?\s*(\d{1,2}/\d{1,2}/\d{2,4}|\d{4}-\d{1,2}-\d{1,2}|[A-Z][a-z]{2,8}\.?\s+\d{1,2},?\s+\d{4})"
    ).unwrap();

    pub static ref LABELED_DATE: Regex = Regex::new(
        r"(?i)\bdate\s*:?\s*(\d{1,2}/\d{1,2}/\d{2,4}|\d{4}-\d{1,2}-\d{1,2}|[A-Z][a-z]{2,8}\.?\s+\d{1,2},?\s+\d{4})"
    ).unwrap();

    // Unlabeled dates
    pub static ref DATE_US: Regex = Regex::new(
        r"\b(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\b"
    ).unwrap();

    pub static ref DATE_ISO: Regex = Regex::new(
        r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b"
    ).unwrap();

    pub static ref DATE_LONG: Regex = Regex::new(
        r"\b([A-Z][a-z]{2,8})\.?\s+(\d{1,2}),?\s+(\d{4})\b"
    ).unwrap();

    // Lines that end a line item table
    pub static ref TABLE_END: Regex = Regex::new(
        r"(?i)^\s*(?:sub\s*-?\s*total|total\s+(?:due|amount|charges|invoice)|invoice\s+total|amount\s+due|balance\s+due)\b"
    ).unwrap();
}
