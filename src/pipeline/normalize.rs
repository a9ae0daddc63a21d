//! Text normalisation for the downstream Markdown + math renderer.
//!
//! Extracted text is rendered by a Markdown engine with inline math support,
//! so two things go wrong if it is stored raw: plain text that happens to look
//! like Markdown syntax (`1. ` at a line start, a leading `- `) is reformatted,
//! and a currency amount like `$5` opens a formula. Formulas themselves must
//! survive byte for byte.
//!
//! ## Rule Order
//!
//! Invisible characters go first so they cannot hide a delimiter. The text is
//! then split into formula and text segments, and every later rule touches
//! text segments only.
//!
//! Markdown table rows are the one structure the renderer should see: they
//! keep their own lines and are never escaped.

use crate::pipeline::table::is_table_row;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Normalise one piece of extracted text.
///
/// Rules (applied in order):
/// 1. Strip invisible Unicode and expand typographic ligatures
/// 2. Split into formula segments (`$$…$$`, `$…$`, `\(…\)`, `\[…\]`), kept
///    verbatim, and text segments; `$` followed by a digit is currency
///    (escaped as `\$` when `escape_currency` is set)
/// 3. Collapse whitespace runs in text to one space, trim the ends
/// 4. Put roman-numeral list items `(i)`, `(ii)`, … on their own line
/// 5. Escape line-leading Markdown markers
///
/// Runs of table rows (`| a | b |`) skip rules 3–5: each cell is cleaned on
/// its own, a `| --- |` delimiter follows the header row, and the table is
/// set off from the surrounding text by blank lines.
pub fn normalize(input: &str, escape_currency: bool) -> String {
    if !input.split('\n').any(is_table_row) {
        return normalize_prose(input, escape_currency);
    }
    let lines: Vec<&str> = input.split('\n').collect();
    lines
        .chunk_by(|a, b| is_table_row(a) == is_table_row(b))
        .map(|chunk| {
            if is_table_row(chunk[0]) {
                normalize_table(chunk, escape_currency)
            } else {
                normalize_prose(&chunk.join("\n"), escape_currency)
            }
        })
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn normalize_prose(input: &str, escape_currency: bool) -> String {
    let s = remove_invisible_chars(input);
    let s = expand_ligatures(&s);

    let mut segments = split_segments(&s, escape_currency);
    for seg in &mut segments {
        if let Segment::Text(t) = seg {
            *t = collapse_whitespace(t);
        }
    }
    trim_segments(&mut segments);
    for seg in &mut segments {
        if let Segment::Text(t) = seg {
            *t = break_roman_items(t);
        }
    }
    escape_line_starts(&segments)
}

// ── Rule 1: Invisible characters and ligatures ───────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

fn expand_ligatures(input: &str) -> String {
    if !input.chars().any(|c| ('\u{FB00}'..='\u{FB04}').contains(&c)) {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        match c {
            '\u{FB00}' => out.push_str("ff"),
            '\u{FB01}' => out.push_str("fi"),
            '\u{FB02}' => out.push_str("fl"),
            '\u{FB03}' => out.push_str("ffi"),
            '\u{FB04}' => out.push_str("ffl"),
            _ => out.push(c),
        }
    }
    out
}

// ── Rule 2: Formula segmentation ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Formula(String),
}

fn split_segments(input: &str, escape_currency: bool) -> Vec<Segment> {
    let chars: Vec<char> = input.chars().collect();
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        let formula_end = match (c, next) {
            // already escaped dollar
            ('\\', Some('$')) => {
                text.push_str("\\$");
                i += 2;
                continue;
            }
            ('\\', Some('(')) => find_closing(&chars, i + 2, &['\\', ')']),
            ('\\', Some('[')) => find_closing(&chars, i + 2, &['\\', ']']),
            ('$', Some('$')) => find_closing(&chars, i + 2, &['$', '$']),
            ('$', Some(d)) if d.is_ascii_digit() => {
                text.push_str(if escape_currency { "\\$" } else { "$" });
                i += 1;
                continue;
            }
            ('$', Some(_)) => find_inline_dollar(&chars, i + 1),
            _ => None,
        };

        match formula_end {
            Some(end) => {
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Formula(chars[i..end].iter().collect()));
                i = end;
            }
            None => {
                text.push(c);
                i += 1;
            }
        }
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    segments
}

/// Index one past the closing two-char delimiter, searching from `from`.
fn find_closing(chars: &[char], from: usize, delim: &[char; 2]) -> Option<usize> {
    (from..chars.len().saturating_sub(1))
        .find(|&j| chars[j] == delim[0] && chars[j + 1] == delim[1])
        .map(|j| j + 2)
}

/// Index one past the `$` closing an inline formula opened at `from - 1`.
fn find_inline_dollar(chars: &[char], from: usize) -> Option<usize> {
    (from..chars.len())
        .find(|&j| chars[j] == '$' && chars[j - 1] != '\\')
        .filter(|&j| j > from)
        .map(|j| j + 1)
}

// ── Rule 3: Whitespace ───────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input, " ").to_string()
}

fn trim_segments(segments: &mut Vec<Segment>) {
    if let Some(Segment::Text(t)) = segments.first_mut() {
        *t = t.trim_start().to_string();
    }
    if let Some(Segment::Text(t)) = segments.last_mut() {
        *t = t.trim_end().to_string();
    }
    segments.retain(|s| !matches!(s, Segment::Text(t) if t.is_empty()));
}

// ── Rule 4: Roman-numeral items ──────────────────────────────────────────

static RE_ROMAN_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+(\((?:i|ii|iii|iv|v|vi|vii|viii|ix|x)\))").unwrap()
});

fn break_roman_items(input: &str) -> String {
    RE_ROMAN_ITEM
        .replace_all(input, |caps: &Captures| {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let followed_by_space = input[whole.end..]
                .chars()
                .next()
                .is_none_or(char::is_whitespace);
            if followed_by_space {
                format!("\n{}", &caps[1])
            } else {
                caps[0].to_string()
            }
        })
        .to_string()
}

// ── Rule 5: Line-leading Markdown markers ────────────────────────────────

static RE_ORDERED_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\.(\s)").unwrap());
static RE_BLOCK_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([#>+*-])(\s)").unwrap());

fn escape_line_start(line: &str) -> String {
    let line = RE_ORDERED_MARKER.replace(line, "${1}\\.${2}");
    RE_BLOCK_MARKER.replace(&line, "\\${1}${2}").to_string()
}

fn escape_line_starts(segments: &[Segment]) -> String {
    let mut out = String::new();
    let mut at_line_start = true;
    for seg in segments {
        match seg {
            Segment::Formula(f) => {
                out.push_str(f);
                at_line_start = false;
            }
            Segment::Text(t) => {
                for (n, piece) in t.split('\n').enumerate() {
                    if n > 0 {
                        out.push('\n');
                        at_line_start = true;
                    }
                    if at_line_start {
                        out.push_str(&escape_line_start(piece));
                    } else {
                        out.push_str(piece);
                    }
                    at_line_start = false;
                }
            }
        }
    }
    out
}

// ── Tables ───────────────────────────────────────────────────────────────

fn normalize_table(rows: &[&str], escape_currency: bool) -> String {
    let mut out = Vec::with_capacity(rows.len() + 1);
    for (i, row) in rows.iter().enumerate() {
        let cells: Vec<String> = split_cells(row)
            .into_iter()
            .map(|cell| normalize_cell(cell, escape_currency))
            .collect();
        out.push(format!("| {} |", cells.join(" | ")));
        if i == 0 && !rows.get(1).is_some_and(|r| is_delimiter_row(r)) {
            out.push(format!("|{}", " --- |".repeat(cells.len())));
        }
    }
    out.join("\n")
}

/// Cells of one row; `\|` stays inside its cell.
fn split_cells(row: &str) -> Vec<&str> {
    let inner = row.trim();
    let inner = inner.strip_prefix('|').unwrap_or(inner);
    let inner = inner.strip_suffix('|').unwrap_or(inner);

    let mut cells = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in inner.char_indices() {
        if c == '|' && !escaped {
            cells.push(&inner[start..i]);
            start = i + 1;
        }
        escaped = c == '\\' && !escaped;
    }
    cells.push(&inner[start..]);
    cells
}

fn normalize_cell(cell: &str, escape_currency: bool) -> String {
    let s = expand_ligatures(&remove_invisible_chars(cell));
    let mut segments = split_segments(&s, escape_currency);
    for seg in &mut segments {
        if let Segment::Text(t) = seg {
            *t = collapse_whitespace(t);
        }
    }
    trim_segments(&mut segments);
    segments
        .iter()
        .map(|seg| match seg {
            Segment::Text(t) | Segment::Formula(t) => t.as_str(),
        })
        .collect()
}

fn is_delimiter_row(row: &str) -> bool {
    split_cells(row).iter().all(|cell| {
        let cell = cell.trim();
        cell.contains('-') && cell.chars().all(|c| c == '-' || c == ':')
    })
}
