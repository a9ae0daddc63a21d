//! Configuration types for question extraction.
//!
//! All parse behaviour is controlled through [`ParseConfig`], built via its
//! [`ParseConfigBuilder`]. Every tunable threshold of the pipeline lives here
//! so a caller who gets garbled output can re-run with adjusted values
//! instead of patching code.

use crate::error::Pdf2QuizError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Configuration for one parse of a question document (and optional key).
///
/// Built via [`ParseConfig::builder()`] or using [`ParseConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2quiz::{ColumnMode, MissingAnswerPolicy, ParseConfig};
///
/// let config = ParseConfig::builder()
///     .line_threshold(6.0)
///     .column_mode(ColumnMode::Auto)
///     .missing_answer_policy(MissingAnswerPolicy::DefaultTo('A'))
///     .max_pages(200)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ParseConfig {
    /// Maximum Y distance (PDF units) between a fragment and the anchor of
    /// the current line for the fragment to join that line. Default: 8.0.
    ///
    /// Calibrated to the ascent of 10–12pt body text. Raise it for documents
    /// whose superscripts or inline formulas sit noticeably above the
    /// baseline; lower it for tightly leaded small print.
    pub line_threshold: f32,

    /// Single-column (default) or column-aware line reconstruction.
    pub column_mode: ColumnMode,

    /// Pages narrower than this are never split into columns. Default: 500.
    pub column_min_page_width: f32,

    /// Minimum width of an empty vertical band for it to count as a column
    /// gutter. Default: 18.
    pub column_min_gutter: f32,

    /// Pages extracted concurrently. Default: 4.
    pub concurrency: usize,

    /// Page selection for the question document. Default: all pages.
    ///
    /// The answer-key document is always read in full.
    pub pages: PageSelection,

    /// Page-count budget per document. Default: none.
    pub max_pages: Option<usize>,

    /// Wall-clock budget for the whole parse in milliseconds. Default: none.
    pub timeout_ms: Option<u64>,

    /// Highest letter accepted as an option marker. Default: `'E'`.
    pub max_option_letter: char,

    /// Split `(A) 3 (B) 4 (C) 5` laid out on one line into separate options.
    /// Default: true.
    pub split_inline_options: bool,

    /// Reject a question number more than this far above the previous one.
    /// Default: none (any increase is accepted).
    pub max_question_gap: Option<u32>,

    /// Drop `Page N of M` footer lines before segmentation. Default: true.
    pub skip_page_footers: bool,

    /// What to store when no answer can be resolved for a question.
    pub missing_answer_policy: MissingAnswerPolicy,

    /// Collect the text following each answer-key entry as that question's
    /// explanation. Default: true.
    pub answer_key_explanations: bool,

    /// Render runs of column-aligned lines as Markdown table rows and keep
    /// them out of question/option matching. Default: true.
    pub detect_tables: bool,

    /// Escape `$` followed by a digit as currency so the downstream math
    /// renderer does not treat it as a formula delimiter. Default: true.
    pub escape_currency: bool,

    /// Optional progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            line_threshold: 8.0,
            column_mode: ColumnMode::default(),
            column_min_page_width: 500.0,
            column_min_gutter: 18.0,
            concurrency: 4,
            pages: PageSelection::default(),
            max_pages: None,
            timeout_ms: None,
            max_option_letter: 'E',
            split_inline_options: true,
            max_question_gap: None,
            skip_page_footers: true,
            missing_answer_policy: MissingAnswerPolicy::default(),
            answer_key_explanations: true,
            detect_tables: true,
            escape_currency: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ParseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseConfig")
            .field("line_threshold", &self.line_threshold)
            .field("column_mode", &self.column_mode)
            .field("column_min_page_width", &self.column_min_page_width)
            .field("column_min_gutter", &self.column_min_gutter)
            .field("concurrency", &self.concurrency)
            .field("pages", &self.pages)
            .field("max_pages", &self.max_pages)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_option_letter", &self.max_option_letter)
            .field("split_inline_options", &self.split_inline_options)
            .field("max_question_gap", &self.max_question_gap)
            .field("skip_page_footers", &self.skip_page_footers)
            .field("missing_answer_policy", &self.missing_answer_policy)
            .field("answer_key_explanations", &self.answer_key_explanations)
            .field("detect_tables", &self.detect_tables)
            .field("escape_currency", &self.escape_currency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ParseProgressCallback>"),
            )
            .finish()
    }
}

impl ParseConfig {
    /// Create a new builder for `ParseConfig`.
    pub fn builder() -> ParseConfigBuilder {
        ParseConfigBuilder {
            config: Self::default(),
        }
    }

    /// The wall-clock budget as a `Duration`, if one is set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Builder for [`ParseConfig`].
#[derive(Debug)]
pub struct ParseConfigBuilder {
    config: ParseConfig,
}

impl ParseConfigBuilder {
    pub fn line_threshold(mut self, threshold: f32) -> Self {
        self.config.line_threshold = threshold.clamp(0.5, 100.0);
        self
    }

    pub fn column_mode(mut self, mode: ColumnMode) -> Self {
        self.config.column_mode = mode;
        self
    }

    pub fn column_min_page_width(mut self, width: f32) -> Self {
        self.config.column_min_page_width = width.max(0.0);
        self
    }

    pub fn column_min_gutter(mut self, gutter: f32) -> Self {
        self.config.column_min_gutter = gutter.max(1.0);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn max_pages(mut self, limit: usize) -> Self {
        self.config.max_pages = Some(limit);
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = Some(ms);
        self
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        self.timeout_ms(timeout.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn max_option_letter(mut self, letter: char) -> Self {
        self.config.max_option_letter = letter.to_ascii_uppercase();
        self
    }

    pub fn split_inline_options(mut self, v: bool) -> Self {
        self.config.split_inline_options = v;
        self
    }

    pub fn max_question_gap(mut self, gap: u32) -> Self {
        self.config.max_question_gap = Some(gap.max(1));
        self
    }

    pub fn skip_page_footers(mut self, v: bool) -> Self {
        self.config.skip_page_footers = v;
        self
    }

    pub fn missing_answer_policy(mut self, policy: MissingAnswerPolicy) -> Self {
        self.config.missing_answer_policy = policy;
        self
    }

    pub fn answer_key_explanations(mut self, v: bool) -> Self {
        self.config.answer_key_explanations = v;
        self
    }

    pub fn detect_tables(mut self, v: bool) -> Self {
        self.config.detect_tables = v;
        self
    }

    pub fn escape_currency(mut self, v: bool) -> Self {
        self.config.escape_currency = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ParseConfig, Pdf2QuizError> {
        let c = &self.config;
        if !c.line_threshold.is_finite() || c.line_threshold <= 0.0 {
            return Err(Pdf2QuizError::InvalidConfig(format!(
                "line threshold must be positive, got {}",
                c.line_threshold
            )));
        }
        if !('A'..='Z').contains(&c.max_option_letter) {
            return Err(Pdf2QuizError::InvalidConfig(format!(
                "max option letter must be A–Z, got '{}'",
                c.max_option_letter
            )));
        }
        if c.max_option_letter == 'A' {
            return Err(Pdf2QuizError::InvalidConfig(
                "max option letter must allow at least two options".into(),
            ));
        }
        if let MissingAnswerPolicy::DefaultTo(letter) = c.missing_answer_policy {
            if !('A'..=c.max_option_letter).contains(&letter) {
                return Err(Pdf2QuizError::InvalidConfig(format!(
                    "default answer '{}' is outside A–{}",
                    letter, c.max_option_letter
                )));
            }
        }
        if c.max_pages == Some(0) {
            return Err(Pdf2QuizError::InvalidConfig(
                "page budget must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How lines are reconstructed on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnMode {
    /// One Y-band grouping across the full page width. (default)
    ///
    /// Two columns sharing a baseline are merged into one line; use
    /// [`ColumnMode::Auto`] for two-column exam layouts.
    #[default]
    Single,
    /// Look for a vertical gutter and, when one is found, read the left
    /// column top to bottom before the right one.
    Auto,
}

/// What the builder stores when neither the answer key nor the question
/// document gives a correct option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingAnswerPolicy {
    /// Leave `correct_option` empty. (default)
    #[default]
    LeaveUnset,
    /// Store the given letter, mark the answer source as `Default` and emit a
    /// `DefaultedCorrectOption` diagnostic.
    DefaultTo(char),
}

/// Specifies which pages of the question PDF to parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Parse all pages (default).
    #[default]
    All,
    /// Parse a single page (1-indexed).
    Single(usize),
    /// Parse a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Parse specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut pages: Vec<usize> = match self {
            PageSelection::All => (1..=total_pages).collect(),
            PageSelection::Single(p) => vec![*p],
            PageSelection::Range(first, last) => {
                ((*first).max(1)..=(*last).min(total_pages)).collect()
            }
            PageSelection::Set(pages) => pages.clone(),
        };
        pages.retain(|p| (1..=total_pages).contains(p));
        pages.sort_unstable();
        pages.dedup();
        pages.into_iter().map(|p| p - 1).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ParseConfig::default();
        assert_eq!(c.line_threshold, 8.0);
        assert_eq!(c.column_mode, ColumnMode::Single);
        assert_eq!(c.max_option_letter, 'E');
        assert_eq!(c.missing_answer_policy, MissingAnswerPolicy::LeaveUnset);
        assert!(c.detect_tables);
        assert!(c.timeout().is_none());
    }

    #[test]
    fn builder_clamps_threshold() {
        let c = ParseConfig::builder().line_threshold(1000.0).build().unwrap();
        assert_eq!(c.line_threshold, 100.0);
    }

    #[test]
    fn builder_rejects_default_answer_outside_letters() {
        let err = ParseConfig::builder()
            .max_option_letter('D')
            .missing_answer_policy(MissingAnswerPolicy::DefaultTo('E'))
            .build()
            .unwrap_err();
        assert!(matches!(err, Pdf2QuizError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_page_budget() {
        assert!(ParseConfig::builder().max_pages(0).build().is_err());
    }

    #[test]
    fn builder_rejects_single_letter_options() {
        assert!(ParseConfig::builder().max_option_letter('a').build().is_err());
    }

    #[test]
    fn timeout_round_trips_through_duration() {
        let c = ParseConfig::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap();
        assert_eq!(c.timeout_ms, Some(3000));
        assert_eq!(c.timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn page_selection_clips_to_document() {
        let none: Vec<usize> = Vec::new();
        assert_eq!(PageSelection::All.to_indices(3), vec![0, 1, 2]);
        assert_eq!(PageSelection::All.to_indices(0), none);
        assert_eq!(PageSelection::Single(2).to_indices(3), vec![1]);
        assert_eq!(PageSelection::Single(0).to_indices(3), none);
        assert_eq!(PageSelection::Single(4).to_indices(3), none);
        assert_eq!(PageSelection::Range(2, 99).to_indices(3), vec![1, 2]);
        assert_eq!(PageSelection::Range(3, 2).to_indices(3), none);
        assert_eq!(PageSelection::Set(vec![3, 9, 1, 3]).to_indices(3), vec![0, 2]);
    }
}
