//! Cell alignment for tables with stacked multi-line cells.
//!
//! Table detection merges visually stacked values into one cell per column,
//! separated by newlines. When a sub-line has no value in some column, that
//! column ends up with fewer stacked values than its neighbours, and the gap
//! can sit anywhere inside the stack. Right-padding shifts every later value
//! into the wrong sub-line.
//!
//! The aligner uses an anchor column that carries a value on every sub-line
//! (the wearer column repeats its label for each of the wearer's lines).
//! Positions where the anchor value changes are transitions between logical
//! entities, and missing values are placed next to those transitions.

use tracing::{debug, trace};

use crate::models::table::{AlignedRow, AlignedTable, Alignment, ColumnMap, ColumnRole, RawTable};

/// Rebuilds rectangular rows from raw table rows.
#[derive(Debug, Clone)]
pub struct CellAligner {
    anchor: ColumnRole,
}

/// Placeholder positions chosen for one under-length column.
struct Placement {
    blanks: Vec<bool>,
    uncertain: Vec<bool>,
}

impl CellAligner {
    /// Create an aligner using the given anchor column role.
    pub fn new(anchor: ColumnRole) -> Self {
        Self { anchor }
    }

    /// Align every row of `table` from `body_start` on.
    ///
    /// Each raw row yields one aligned row per stacked sub-line, and every
    /// aligned row has exactly `columns.width()` values.
    pub fn align(&self, table: &RawTable, columns: &ColumnMap, body_start: usize) -> AlignedTable {
        let mut rows = Vec::new();

        for (index, cells) in table.rows.iter().enumerate().skip(body_start) {
            let aligned = self.align_row(table.page, index, cells, columns);
            trace!("Row {} on page {} -> {} sub-lines", index, table.page, aligned.len());
            rows.extend(aligned);
        }

        let degraded = rows.iter().filter(|r| r.alignment.is_degraded()).count();
        debug!(
            "Aligned table on page {}: {} rows, {} degraded",
            table.page,
            rows.len(),
            degraded
        );

        AlignedTable {
            page: table.page,
            columns: columns.clone(),
            rows,
        }
    }

    /// Split one raw row into aligned sub-lines.
    pub fn align_row(
        &self,
        page: u32,
        source_row: usize,
        cells: &[String],
        columns: &ColumnMap,
    ) -> Vec<AlignedRow> {
        let width = columns.width();
        let stacks: Vec<Vec<String>> = (0..width)
            .map(|i| cells.get(i).map(|c| split_cell(c)).unwrap_or_default())
            .collect();

        let max_lines = stacks.iter().map(Vec::len).max().unwrap_or(0);
        if max_lines == 0 {
            return Vec::new();
        }

        let mut reasons: Vec<Vec<String>> = vec![Vec::new(); max_lines];
        if cells.len() != width {
            let reason = format!("row has {} cells, expected {}", cells.len(), width);
            reasons.iter_mut().for_each(|r| r.push(reason.clone()));
        }

        // A column with no values at all is blank on every sub-line, which is
        // unambiguous. Only partially filled columns need placement.
        let under: Vec<usize> = (0..width)
            .filter(|&i| !stacks[i].is_empty() && stacks[i].len() < max_lines)
            .collect();

        let transitions = self.transitions(&stacks, columns, max_lines);

        let mut columns_out: Vec<Vec<String>> = Vec::with_capacity(width);
        for (col, stack) in stacks.into_iter().enumerate() {
            if stack.is_empty() {
                columns_out.push(vec![String::new(); max_lines]);
                continue;
            }
            if stack.len() == max_lines {
                columns_out.push(stack);
                continue;
            }

            let deficit = max_lines - stack.len();
            let role = columns.roles()[col];
            let placement = match transitions.as_deref() {
                Some(ts) if !ts.is_empty() => place_around_transitions(ts, max_lines, deficit),
                _ => {
                    let reason = if under.len() > 1 {
                        "multiple under-length columns without anchor transitions".to_string()
                    } else {
                        format!("{:?} column padded without anchor transitions", role)
                    };
                    reasons.iter_mut().for_each(|r| {
                        if !r.contains(&reason) {
                            r.push(reason.clone())
                        }
                    });
                    pad_end(max_lines, deficit)
                }
            };

            for (i, uncertain) in placement.uncertain.iter().enumerate() {
                if *uncertain {
                    reasons[i].push(format!("ambiguous placement in {:?} column", role));
                }
            }

            columns_out.push(fill(stack, &placement.blanks));
        }

        (0..max_lines)
            .map(|i| {
                let alignment = if reasons[i].is_empty() {
                    Alignment::Confident
                } else {
                    Alignment::degraded(reasons[i].join("; "))
                };
                AlignedRow {
                    page,
                    source_row,
                    sub_line: i,
                    values: columns_out.iter().map(|c| c[i].clone()).collect(),
                    alignment,
                }
            })
            .collect()
    }

    /// Transition indices of the anchor column, or `None` if the anchor is
    /// missing or not full-length.
    fn transitions(
        &self,
        stacks: &[Vec<String>],
        columns: &ColumnMap,
        max_lines: usize,
    ) -> Option<Vec<usize>> {
        let anchor = &stacks[columns.position(self.anchor)?];
        if anchor.len() != max_lines {
            return None;
        }
        Some(
            (1..max_lines)
                .filter(|&i| anchor[i] != anchor[i - 1])
                .collect(),
        )
    }
}

impl Default for CellAligner {
    fn default() -> Self {
        Self::new(ColumnRole::Subject)
    }
}

/// Split a cell into its stacked values, dropping leading and trailing blank lines.
fn split_cell(cell: &str) -> Vec<String> {
    let lines: Vec<&str> = cell.lines().map(str::trim).collect();
    let start = lines.iter().position(|l| !l.is_empty());
    let end = lines.iter().rposition(|l| !l.is_empty());
    match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].iter().map(|l| l.to_string()).collect(),
        _ => Vec::new(),
    }
}

fn pad_end(max_lines: usize, deficit: usize) -> Placement {
    let blanks = (0..max_lines).map(|i| i >= max_lines - deficit).collect();
    Placement {
        blanks,
        uncertain: vec![false; max_lines],
    }
}

/// Distribute `deficit` placeholders across the transitions.
///
/// Each transition gets an equal share, earlier transitions taking the
/// remainder. A share goes to the tail of the segment ending at the
/// transition or the head of the segment starting there, whichever can hold
/// it. When both can, the tail wins and the positions whose value depends on
/// that choice are marked uncertain. When neither can, the share is split and
/// the rest carried forward, ending at the tail of the row.
///
/// A remainder that does not divide evenly could belong to any transition,
/// so everything from the first placeholder on is uncertain.
fn place_around_transitions(transitions: &[usize], max_lines: usize, deficit: usize) -> Placement {
    let mut blanks = vec![false; max_lines];
    let mut uncertain = vec![false; max_lines];

    let bounds: Vec<usize> = std::iter::once(0)
        .chain(transitions.iter().copied())
        .chain(std::iter::once(max_lines))
        .collect();
    let k = transitions.len();
    let mut carry = 0;

    for (i, &t) in transitions.iter().enumerate() {
        let quota = deficit / k + usize::from(i < deficit % k) + carry;
        carry = 0;
        if quota == 0 {
            continue;
        }

        let before = (bounds[i]..t).rev().take_while(|&p| !blanks[p]).count();
        let after = (t..bounds[i + 2]).take_while(|&p| !blanks[p]).count();

        match (quota <= before, quota <= after) {
            (true, false) => mark(&mut blanks, t - quota..t),
            (false, true) => mark(&mut blanks, t..t + quota),
            (true, true) => {
                mark(&mut blanks, t - quota..t);
                mark(&mut uncertain, t - quota..t + quota);
            }
            (false, false) => {
                let rest = (quota - before).min(after);
                mark(&mut blanks, t - before..t + rest);
                mark(&mut uncertain, t - before..t + rest);
                carry = quota - before - rest;
            }
        }
    }

    for p in (0..max_lines).rev() {
        if carry == 0 {
            break;
        }
        if !blanks[p] {
            blanks[p] = true;
            uncertain[p] = true;
            carry -= 1;
        }
    }

    if deficit % k != 0 {
        if let Some(first) = blanks.iter().position(|b| *b) {
            mark(&mut uncertain, first..max_lines);
        }
    }

    Placement { blanks, uncertain }
}

fn mark(flags: &mut [bool], range: std::ops::Range<usize>) {
    for flag in &mut flags[range] {
        *flag = true;
    }
}

/// Lay out `values` over the non-blank positions, in order.
fn fill(values: Vec<String>, blanks: &[bool]) -> Vec<String> {
    let mut values = values.into_iter();
    blanks
        .iter()
        .map(|blank| {
            if *blank {
                String::new()
            } else {
                values.next().unwrap_or_default()
            }
        })
        .collect()
}
