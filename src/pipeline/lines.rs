//! Line reconstruction: cluster positioned fragments into reading-order lines.
//!
//! Fragments are sorted top-to-bottom, left-to-right and grouped into bands
//! whose Y stays within `line_threshold` of the band's first fragment (the
//! anchor). Comparing against the anchor rather than the previous fragment
//! keeps a slowly drifting baseline from chaining two lines together.
//!
//! With [`ColumnMode::Auto`] a page that shows a clear vertical gutter is cut
//! in two first, and each column is clustered on its own.

use crate::budget::Deadline;
use crate::config::{ColumnMode, ParseConfig};
use crate::error::{Pdf2QuizError, Stage};
use crate::pipeline::extract::{ExtractedPage, PositionedFragment};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Share of the text extent, on each side, that a gutter centre must clear.
const GUTTER_MARGIN: f32 = 0.3;

/// Minimum fragments on each side of a gutter.
const MIN_COLUMN_FRAGMENTS: usize = 3;

/// Font size assumed for width estimation when the extractor reports none.
const FALLBACK_FONT_SIZE: f32 = 10.0;

/// Average glyph advance as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

/// Largest page side PDF allows (200 inches), bounding the projection.
const MAX_PAGE_EXTENT: f32 = 14_400.0;

/// One reconstructed line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// 0-based page index.
    pub page_index: usize,
    /// Y of the anchor fragment.
    pub y: f32,
    /// Fragments in ascending X.
    pub fragments: Vec<PositionedFragment>,
    /// Fragment texts joined with a single space.
    pub text: String,
}

impl Line {
    /// Build a line from the fragments of one Y band.
    pub fn new(page_index: usize, y: f32, mut fragments: Vec<PositionedFragment>) -> Self {
        fragments.sort_by(|a, b| a.x.total_cmp(&b.x));
        let text = fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            page_index,
            y,
            fragments,
            text,
        }
    }

    /// A single-fragment line at `x = 0`.
    pub fn from_text(page_index: usize, y: f32, text: impl Into<String>) -> Self {
        let fragment = PositionedFragment::new(page_index, text, 0.0, y);
        Self::new(page_index, y, vec![fragment])
    }

    /// The same line with its text replaced (e.g. a marker stripped).
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }
}

/// Reconstruct the lines of one page according to `config`.
pub fn reconstruct_page(
    page: &ExtractedPage,
    config: &ParseConfig,
    deadline: &Deadline,
) -> Result<Vec<Line>, Pdf2QuizError> {
    if config.column_mode == ColumnMode::Auto {
        if let Some(split) = find_column_split(page, config) {
            let (left, right): (Vec<_>, Vec<_>) = page
                .fragments
                .iter()
                .cloned()
                .partition(|f| f.x < split);
            debug!(
                "Page {}: column gutter at x={:.1} ({} | {} fragments)",
                page.index + 1,
                split,
                left.len(),
                right.len()
            );
            let mut lines = group_lines(page.index, left, config.line_threshold, deadline)?;
            lines.extend(group_lines(
                page.index,
                right,
                config.line_threshold,
                deadline,
            )?);
            return Ok(lines);
        }
    }

    group_lines(
        page.index,
        page.fragments.clone(),
        config.line_threshold,
        deadline,
    )
}

/// Cluster `fragments` into lines ordered by descending Y.
pub fn group_lines(
    page_index: usize,
    mut fragments: Vec<PositionedFragment>,
    threshold: f32,
    deadline: &Deadline,
) -> Result<Vec<Line>, Pdf2QuizError> {
    // Stable: equal (y, x) keeps emission order.
    fragments.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut lines = Vec::new();
    let mut current: Vec<PositionedFragment> = Vec::new();
    let mut anchor = 0.0_f32;

    for (i, fragment) in fragments.into_iter().enumerate() {
        deadline.check_every(i, Stage::Reconstruct)?;
        if current.is_empty() {
            anchor = fragment.y;
        } else if (fragment.y - anchor).abs() > threshold {
            lines.push(Line::new(page_index, anchor, std::mem::take(&mut current)));
            anchor = fragment.y;
        }
        current.push(fragment);
    }
    if !current.is_empty() {
        lines.push(Line::new(page_index, anchor, current));
    }

    Ok(lines)
}

// ── Column detection ─────────────────────────────────────────────────────

/// X coordinate of a column gutter, if the page has exactly one clear one.
///
/// A one-level vertical projection cut: estimate every fragment's horizontal
/// extent, project onto the X axis, and take the widest empty run in the
/// central band of the text extent.
fn find_column_split(page: &ExtractedPage, config: &ParseConfig) -> Option<f32> {
    if page.width < config.column_min_page_width
        || page.fragments.len() < 2 * MIN_COLUMN_FRAGMENTS
    {
        return None;
    }

    // Off-page text (stray CTMs, clipped runs) takes no part in the projection.
    let right_edge = page.width.min(MAX_PAGE_EXTENT);
    let spans: Vec<(f32, f32)> = page
        .fragments
        .iter()
        .filter(|f| f.x.is_finite())
        .filter_map(|f| {
            let start = f.x.max(0.0);
            let end = (f.x + estimated_width(f)).min(right_edge);
            (start < end).then_some((start, end))
        })
        .collect();
    let min_x = spans.iter().map(|s| s.0).fold(f32::INFINITY, f32::min);
    let max_x = spans.iter().map(|s| s.1).fold(f32::NEG_INFINITY, f32::max);
    let extent = max_x - min_x;
    if !extent.is_finite() || extent < 2.0 * config.column_min_gutter {
        return None;
    }

    // 1-unit buckets across the text extent.
    let buckets = extent.ceil() as usize + 1;
    let mut coverage = vec![0u32; buckets];
    for &(start, end) in &spans {
        let s = ((start - min_x).floor() as usize).min(buckets - 1);
        let e = ((end - min_x).ceil() as usize).min(buckets - 1);
        for slot in &mut coverage[s..e] {
            *slot += 1;
        }
    }

    let band_lo = min_x + GUTTER_MARGIN * extent;
    let band_hi = min_x + (1.0 - GUTTER_MARGIN) * extent;

    let mut best: Option<(f32, f32)> = None; // (width, centre)
    let mut run_start: Option<usize> = None;
    for (i, &count) in coverage.iter().enumerate() {
        match (count == 0, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                consider_gap(start, i, min_x, band_lo, band_hi, &mut best);
                run_start = None;
            }
            _ => {}
        }
    }

    let (width, split) = best?;
    if width < config.column_min_gutter {
        return None;
    }

    let left = page.fragments.iter().filter(|f| f.x < split).count();
    let right = page.fragments.len() - left;
    if left < MIN_COLUMN_FRAGMENTS || right < MIN_COLUMN_FRAGMENTS {
        return None;
    }
    Some(split)
}

fn consider_gap(
    start: usize,
    end: usize,
    min_x: f32,
    band_lo: f32,
    band_hi: f32,
    best: &mut Option<(f32, f32)>,
) {
    let width = (end - start) as f32;
    let centre = min_x + (start + end) as f32 / 2.0;
    if centre < band_lo || centre > band_hi {
        return;
    }
    if best.is_none_or(|(w, _)| width > w) {
        *best = Some((width, centre));
    }
}

/// Font size of `f`, or the fallback when the extractor reports none.
pub(crate) fn em(f: &PositionedFragment) -> f32 {
    if f.font_size > 0.0 {
        f.font_size
    } else {
        FALLBACK_FONT_SIZE
    }
}

pub(crate) fn estimated_width(f: &PositionedFragment) -> f32 {
    f.text.chars().count() as f32 * em(f) * AVG_GLYPH_WIDTH
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, x: f32, y: f32) -> PositionedFragment {
        PositionedFragment {
            page_index: 0,
            text: text.into(),
            x,
            y,
            font_size: 10.0,
            font_name: "F1".into(),
        }
    }

    fn texts(lines: &[Line]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    fn lines_of(fragments: Vec<PositionedFragment>) -> Vec<Line> {
        group_lines(0, fragments, 8.0, &Deadline::unbounded()).unwrap()
    }

    #[test]
    fn sorts_top_to_bottom_left_to_right() {
        let lines = lines_of(vec![
            frag("A. 3", 72.0, 680.0),
            frag("What is 2+2?", 90.0, 700.0),
            frag("1.", 72.0, 700.0),
            frag("B. 4", 72.0, 660.0),
        ]);
        assert_eq!(texts(&lines), vec!["1. What is 2+2?", "A. 3", "B. 4"]);
        assert_eq!(lines[0].y, 700.0);
    }

    #[test]
    fn small_baseline_shift_stays_on_line() {
        // superscript 4pt above the baseline
        let lines = lines_of(vec![
            frag("x", 72.0, 500.0),
            frag("2", 80.0, 504.0),
            frag("+ 1", 90.0, 500.0),
        ]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "x 2 + 1");
        // anchor is the highest fragment after sorting
        assert_eq!(lines[0].y, 504.0);
    }

    #[test]
    fn anchor_prevents_chaining() {
        // each step is within the threshold of the previous one but the
        // third is too far from the anchor
        let lines = lines_of(vec![
            frag("a", 10.0, 100.0),
            frag("b", 20.0, 94.0),
            frag("c", 30.0, 88.0),
        ]);
        assert_eq!(texts(&lines), vec!["a b", "c"]);
    }

    #[test]
    fn fragments_within_line_ascend_in_x() {
        let lines = lines_of(vec![
            frag("right", 300.0, 100.0),
            frag("left", 10.0, 96.0),
        ]);
        assert_eq!(lines.len(), 1);
        let xs: Vec<f32> = lines[0].fragments.iter().map(|f| f.x).collect();
        assert!(xs.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(lines[0].text, "left right");
    }

    #[test]
    fn lines_descend_in_y() {
        let frags: Vec<_> = (0..50)
            .map(|i| frag("t", (i * 37 % 400) as f32, (i * 13 % 700) as f32))
            .collect();
        let lines = lines_of(frags);
        assert!(lines.windows(2).all(|w| w[0].y > w[1].y));
    }

    #[test]
    fn deterministic_and_idempotent() {
        let frags = vec![
            frag("b", 50.0, 100.0),
            frag("a", 10.0, 102.0),
            frag("c", 10.0, 50.0),
            frag("d", 10.0, 50.0),
        ];
        let first = lines_of(frags.clone());
        assert_eq!(first, lines_of(frags));

        let flattened: Vec<_> = first.iter().flat_map(|l| l.fragments.clone()).collect();
        assert_eq!(texts(&lines_of(flattened)), texts(&first));
    }

    #[test]
    fn equal_positions_keep_emission_order() {
        let lines = lines_of(vec![frag("1.", 72.0, 700.0), frag("First", 72.0, 700.0)]);
        assert_eq!(lines[0].text, "1. First");
    }

    #[test]
    fn empty_input_yields_no_lines() {
        assert!(lines_of(vec![]).is_empty());
    }

    #[test]
    fn zero_deadline_aborts() {
        let d = Deadline::new(Some(std::time::Duration::ZERO));
        let err = group_lines(0, vec![frag("a", 0.0, 0.0)], 8.0, &d).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Reconstruct));
    }

    fn two_column_page() -> ExtractedPage {
        let mut fragments = Vec::new();
        for (i, y) in [700.0, 680.0, 660.0, 640.0].into_iter().enumerate() {
            fragments.push(frag(&format!("left {i}"), 50.0, y));
            fragments.push(frag(&format!("right {i}"), 400.0, y));
        }
        ExtractedPage {
            index: 0,
            width: 612.0,
            height: 792.0,
            fragments,
        }
    }

    #[test]
    fn single_mode_merges_columns() {
        let config = ParseConfig::default();
        let lines = reconstruct_page(&two_column_page(), &config, &Deadline::unbounded()).unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].text, "left 0 right 0");
    }

    #[test]
    fn auto_mode_reads_left_column_first() {
        let config = ParseConfig::builder()
            .column_mode(ColumnMode::Auto)
            .build()
            .unwrap();
        let lines = reconstruct_page(&two_column_page(), &config, &Deadline::unbounded()).unwrap();
        assert_eq!(
            texts(&lines),
            vec![
                "left 0", "left 1", "left 2", "left 3", "right 0", "right 1", "right 2", "right 3"
            ]
        );
    }

    #[test]
    fn auto_mode_ignores_narrow_pages() {
        let config = ParseConfig::builder()
            .column_mode(ColumnMode::Auto)
            .column_min_page_width(700.0)
            .build()
            .unwrap();
        let lines = reconstruct_page(&two_column_page(), &config, &Deadline::unbounded()).unwrap();
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn auto_mode_without_gutter_falls_back() {
        let page = ExtractedPage {
            index: 0,
            width: 612.0,
            height: 792.0,
            fragments: (0..8)
                .map(|i| {
                    frag(
                        "a long full-width sentence of body text here",
                        50.0,
                        700.0 - 20.0 * i as f32,
                    )
                })
                .collect(),
        };
        let config = ParseConfig::builder()
            .column_mode(ColumnMode::Auto)
            .build()
            .unwrap();
        let lines = reconstruct_page(&page, &config, &Deadline::unbounded()).unwrap();
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn auto_mode_survives_off_page_fragments() {
        let mut fragments: Vec<_> = (0..4)
            .map(|i| frag("body", 50.0, 700.0 - 20.0 * i as f32))
            .collect();
        fragments.extend((0..4).map(|i| frag("stray", 2e9, 700.0 - 20.0 * i as f32)));
        fragments.push(frag("negative", -1e9, 600.0));
        fragments.push(frag("nan", f32::NAN, 580.0));
        let page = ExtractedPage {
            index: 0,
            width: 612.0,
            height: 792.0,
            fragments,
        };
        let config = ParseConfig::builder()
            .column_mode(ColumnMode::Auto)
            .build()
            .unwrap();
        let lines = reconstruct_page(&page, &config, &Deadline::unbounded()).unwrap();
        let kept: usize = lines.iter().map(|l| l.fragments.len()).sum();
        assert_eq!(kept, 10);
    }

    #[test]
    fn off_page_fragment_does_not_hide_gutter() {
        let mut page = two_column_page();
        page.fragments.push(frag("stray", 2e9, 500.0));
        let config = ParseConfig::builder()
            .column_mode(ColumnMode::Auto)
            .build()
            .unwrap();
        let lines = reconstruct_page(&page, &config, &Deadline::unbounded()).unwrap();
        assert_eq!(lines[0].text, "left 0");
        assert_eq!(lines[3].text, "left 3");
    }

    #[test]
    fn with_text_keeps_geometry() {
        let line = Line::from_text(2, 300.0, "1. What is 2+2?");
        let stripped = line.with_text("What is 2+2?");
        assert_eq!(stripped.page_index, 2);
        assert_eq!(stripped.y, 300.0);
        assert_eq!(stripped.fragments, line.fragments);
        assert_eq!(stripped.text, "What is 2+2?");
    }
}
