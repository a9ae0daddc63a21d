//! Table detection: runs of column-aligned lines → Markdown table rows.
//!
//! A line is a row candidate when its fragments fall into two or more cells
//! separated by wide horizontal gaps. Consecutive candidates on one page with
//! the same cell count and matching cell edges form a table, and each of its
//! lines is rewritten as `| a | b |`. Later stages recognise rows by that
//! shape alone: the segmenter never looks for markers inside them and the
//! normaliser leaves their line structure intact.
//!
//! Nothing here sees ruling lines, so a run of short aligned cells is the
//! only evidence. Cells that open with a question, option or answer marker
//! disqualify their line; `A. 3    B. 4` laid out as a grid stays options.

use crate::config::ParseConfig;
use crate::pipeline::lines::{em, estimated_width, Line};
use crate::pipeline::segment::starts_with_marker;
use tracing::debug;

/// Horizontal gap between two fragments, in ems, that starts a new cell.
const CELL_GAP_EMS: f32 = 2.0;

/// Cell edges this close (in ems) belong to the same column.
const ALIGN_TOLERANCE_EMS: f32 = 1.0;

/// A cell longer than this reads as prose.
const MAX_CELL_CHARS: usize = 32;

const MIN_TABLE_ROWS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
struct Cell {
    start: f32,
    end: f32,
    text: String,
}

impl Cell {
    fn centre(&self) -> f32 {
        (self.start + self.end) / 2.0
    }
}

/// A row candidate: its cells and the em size edges are compared in.
#[derive(Debug, Clone)]
struct Row {
    cells: Vec<Cell>,
    em: f32,
}

/// Whether `text` is a Markdown table row (`| a | b |`).
pub fn is_table_row(text: &str) -> bool {
    let text = text.trim();
    text.len() >= 2 && text.starts_with('|') && text.ends_with('|')
}

/// Rewrite every detected table's lines as Markdown rows.
///
/// Lines outside tables pass through untouched, and the line count and order
/// never change.
pub fn mark_tables(mut lines: Vec<Line>, config: &ParseConfig) -> Vec<Line> {
    let rows: Vec<Option<Row>> = lines.iter().map(|l| row_of(l, config)).collect();

    let mut tables = 0;
    let mut i = 0;
    while i < lines.len() {
        let len = run_length(&lines, &rows, i);
        if len < MIN_TABLE_ROWS {
            i += 1;
            continue;
        }
        for (line, row) in lines[i..i + len].iter_mut().zip(&rows[i..i + len]) {
            if let Some(row) = row {
                *line = line.with_text(render_row(&row.cells));
            }
        }
        debug!(
            "Page {}: {}-row table at y={:.1}",
            lines[i].page_index + 1,
            len,
            lines[i].y
        );
        tables += 1;
        i += len;
    }

    if tables > 0 {
        debug!("Detected {} tables", tables);
    }
    lines
}

/// Rows in the table starting at `start`, or 0 when it opens none.
fn run_length(lines: &[Line], rows: &[Option<Row>], start: usize) -> usize {
    let Some(mut prev) = rows[start].as_ref() else {
        return 0;
    };
    let mut len = 1;
    for (line, row) in lines[start + 1..].iter().zip(&rows[start + 1..]) {
        let Some(row) = row.as_ref() else { break };
        if line.page_index != lines[start].page_index || !aligned(prev, row) {
            break;
        }
        prev = row;
        len += 1;
    }
    len
}

/// Split `line` into cells, if it looks like a table row.
fn row_of(line: &Line, config: &ParseConfig) -> Option<Row> {
    let first = line.fragments.first()?;
    let mut cells: Vec<Cell> = Vec::new();

    for f in &line.fragments {
        let text = f.text.trim();
        if text.is_empty() || !f.x.is_finite() {
            continue;
        }
        let end = f.x + estimated_width(f);
        match cells.last_mut() {
            Some(cell) if f.x - cell.end < CELL_GAP_EMS * em(f) => {
                cell.text.push(' ');
                cell.text.push_str(text);
                cell.end = cell.end.max(end);
            }
            _ => cells.push(Cell {
                start: f.x,
                end,
                text: text.to_string(),
            }),
        }
    }

    let plausible = cells.len() >= 2
        && cells.iter().all(|c| {
            c.text.chars().count() <= MAX_CELL_CHARS
                && !starts_with_marker(&c.text, config.max_option_letter)
        });
    plausible.then(|| Row {
        cells,
        em: em(first),
    })
}

/// Same column count, and every column lines up by its left edge, right
/// edge or centre.
fn aligned(prev: &Row, row: &Row) -> bool {
    let tolerance = ALIGN_TOLERANCE_EMS * prev.em.max(row.em);
    let close = |a: f32, b: f32| (a - b).abs() <= tolerance;
    prev.cells.len() == row.cells.len()
        && prev.cells.iter().zip(&row.cells).all(|(a, b)| {
            close(a.start, b.start) || close(a.end, b.end) || close(a.centre(), b.centre())
        })
}

fn render_row(cells: &[Cell]) -> String {
    let cells: Vec<String> = cells.iter().map(|c| c.text.replace('|', "\\|")).collect();
    format!("| {} |", cells.join(" | "))
}
