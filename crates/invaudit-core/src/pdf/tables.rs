//! Table detection over laid-out page text.

use tracing::{debug, trace};

use crate::invoice::rules::patterns::TABLE_END;
use crate::models::{ColumnMap, ColumnRole, RawTable};

/// Finds line item tables on a page.
pub trait TableDetector {
    /// Detect tables in the text of one page.
    fn detect(&self, page: u32, text: &str) -> Vec<RawTable>;
}

/// Rebuilds tables from column-aligned page text.
///
/// A header line is one with at least three recognized column labels. Body
/// fields are separated by two or more spaces and go to the header column
/// they overlap (or the nearest one). Each body line becomes one raw row;
/// a line without quantity or rate continues the previous description, and a
/// missing subject repeats the previous one. The first row of every
/// returned table is its header.
#[derive(Debug, Clone, Default)]
pub struct TextLayoutDetector;

/// A whitespace-delimited field and its character span.
#[derive(Debug, Clone, PartialEq)]
struct Field {
    start: usize,
    end: usize,
    text: String,
}

impl Field {
    fn centre(&self) -> f32 {
        (self.start + self.end) as f32 / 2.0
    }
}

/// Header of a table being collected.
struct Header {
    columns: ColumnMap,
    fields: Vec<Field>,
}

impl Header {
    fn parse(line: &str) -> Option<Self> {
        let fields = split_fields(line);
        let labels: Vec<String> = fields.iter().map(|f| f.text.clone()).collect();
        let columns = ColumnMap::from_header(&labels)?;
        Some(Self { columns, fields })
    }

    /// Column index for a body field.
    fn column_for(&self, field: &Field) -> usize {
        let overlap = |h: &Field| {
            let start = h.start.max(field.start);
            let end = h.end.min(field.end);
            end.saturating_sub(start)
        };

        let best_overlap = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, h)| (i, overlap(h)))
            .filter(|(_, o)| *o > 0)
            .max_by_key(|(_, o)| *o);

        if let Some((i, _)) = best_overlap {
            return i;
        }

        self.fields
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = (a.centre() - field.centre()).abs();
                let db = (b.centre() - field.centre()).abs();
                da.total_cmp(&db)
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn labels(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.text.clone()).collect()
    }
}

impl TextLayoutDetector {
    pub fn new() -> Self {
        Self
    }

    fn body_row(header: &Header, fields: &[Field]) -> Vec<String> {
        let mut cells = vec![String::new(); header.columns.width()];
        for field in fields {
            let cell = &mut cells[header.column_for(field)];
            if !cell.is_empty() {
                cell.push(' ');
            }
            cell.push_str(&field.text);
        }
        cells
    }
}

impl TableDetector for TextLayoutDetector {
    fn detect(&self, page: u32, text: &str) -> Vec<RawTable> {
        let mut tables = Vec::new();
        let mut current: Option<(Header, Vec<Vec<String>>)> = None;
        let mut previous_blank = true;

        for line in text.lines() {
            if line.trim().is_empty() {
                previous_blank = true;
                continue;
            }

            if let Some(header) = Header::parse(line) {
                // Repeated header on the same table
                if let Some((existing, _)) = &current {
                    if existing.columns == header.columns {
                        previous_blank = true;
                        continue;
                    }
                }
                if let Some(table) = finish(current.take(), page) {
                    tables.push(table);
                }
                trace!("Table header on page {}: {:?}", page, header.columns.roles());
                current = Some((header, Vec::new()));
                previous_blank = true;
                continue;
            }

            if current.is_some() && TABLE_END.is_match(line) {
                if let Some(table) = finish(current.take(), page) {
                    tables.push(table);
                }
                previous_blank = true;
                continue;
            }

            let Some((header, rows)) = current.as_mut() else {
                continue;
            };

            let mut cells = Self::body_row(header, &split_fields(line));
            let cell = |role: ColumnRole, cells: &[String]| {
                header
                    .columns
                    .position(role)
                    .map(|i| cells[i].clone())
                    .unwrap_or_default()
            };

            let is_item = !cell(ColumnRole::Quantity, &cells).is_empty()
                || !cell(ColumnRole::Rate, &cells).is_empty();

            if !is_item {
                // Wrapped description of the previous line
                let continuation = cell(ColumnRole::Description, &cells);
                if let (false, Some(last), Some(desc)) = (
                    previous_blank,
                    rows.last_mut(),
                    header.columns.position(ColumnRole::Description),
                ) {
                    if !continuation.is_empty() {
                        last[desc].push(' ');
                        last[desc].push_str(&continuation);
                    }
                }
                previous_blank = false;
                continue;
            }

            if let Some(last) = rows.last() {
                for role in [ColumnRole::SubjectId, ColumnRole::Subject] {
                    if let Some(i) = header.columns.position(role) {
                        if cells[i].is_empty() {
                            cells[i] = last[i].clone();
                        }
                    }
                }
            }

            rows.push(cells);
            previous_blank = false;
        }

        if let Some(table) = finish(current, page) {
            tables.push(table);
        }

        debug!("Detected {} tables on page {}", tables.len(), page);
        tables
    }
}

fn finish(current: Option<(Header, Vec<Vec<String>>)>, page: u32) -> Option<RawTable> {
    let (header, body) = current?;
    if body.is_empty() {
        return None;
    }
    let mut rows = Vec::with_capacity(body.len() + 1);
    rows.push(header.labels());
    rows.extend(body);
    Some(RawTable::new(page, rows))
}

/// Split a line into fields separated by two or more whitespace characters.
fn split_fields(line: &str) -> Vec<Field> {
    let chars: Vec<char> = line.chars().collect();
    let mut fields = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        let mut end = i;
        while end < chars.len() {
            if chars[end].is_whitespace() {
                let gap = chars[end..].iter().take_while(|c| c.is_whitespace()).count();
                if gap >= 2 || end + gap >= chars.len() {
                    break;
                }
                end += gap;
            } else {
                end += 1;
            }
        }

        fields.push(Field {
            start,
            end,
            text: chars[start..end].iter().collect(),
        });
        i = end;
    }

    fields
}
