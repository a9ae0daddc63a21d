//! Error types for the pdf2quiz library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * [`Pdf2QuizError`] — **Fatal**: no partial result is trustworthy
//!   (the buffer is not a PDF, the document has no pages, the parse ran past
//!   its budget). Returned as `Err(Pdf2QuizError)` from the `parse*` entry
//!   points.
//!
//! * [`Diagnostic`] — **Per-item**: one question could not be built, one
//!   answer-key entry matched nothing, an option letter arrived out of
//!   sequence. Collected into [`crate::output::ParseOutput::diagnostics`]
//!   next to whatever questions were recovered, so a human reviewer can fix
//!   what segmentation missed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage in which a fatal error originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Reconstruct,
    Segment,
    AnswerKey,
    Build,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "glyph extraction",
            Stage::Reconstruct => "line reconstruction",
            Stage::Segment => "question segmentation",
            Stage::AnswerKey => "answer-key parsing",
            Stage::Build => "question building",
        };
        f.write_str(name)
    }
}

/// Which of the two input documents an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentRole {
    Questions,
    AnswerKey,
}

impl fmt::Display for DocumentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentRole::Questions => f.write_str("question document"),
            DocumentRole::AnswerKey => f.write_str("answer-key document"),
        }
    }
}

/// The budget a parse ran out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Budget {
    /// Wall-clock budget in milliseconds.
    Time { limit_ms: u64 },
    /// Page-count budget.
    Pages { limit: usize, actual: usize },
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Budget::Time { limit_ms } => write!(f, "time budget of {limit_ms}ms"),
            Budget::Pages { limit, actual } => {
                write!(f, "page budget of {limit} (document has {actual} pages)")
            }
        }
    }
}

/// All fatal errors returned by the pdf2quiz library.
///
/// Per-item problems use [`Diagnostic`] and never surface here.
#[derive(Debug, Error)]
pub enum Pdf2QuizError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Document errors ───────────────────────────────────────────────────
    /// The buffer could not be parsed as a PDF.
    #[error("The {document} is not a parseable PDF: {detail}")]
    MalformedDocument { document: DocumentRole, detail: String },

    /// The PDF parsed but contains no pages.
    #[error("The {document} has no pages")]
    EmptyDocument { document: DocumentRole },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Budget errors ─────────────────────────────────────────────────────
    /// The parse exceeded its time or page budget. No partial output.
    #[error("Parse exceeded its {budget} during {stage}")]
    ParseTimeout { stage: Stage, budget: Budget },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2QuizError {
    /// The pipeline stage that raised this error, when it came from the
    /// pipeline rather than from the file/config shell around it.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Pdf2QuizError::MalformedDocument { .. } | Pdf2QuizError::EmptyDocument { .. } => {
                Some(Stage::Extract)
            }
            Pdf2QuizError::ParseTimeout { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Why the builder dropped a question block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No option markers were recovered for the block.
    NoOptions,
    /// The stem was empty after normalisation.
    EmptyStem,
    /// Option letters did not run contiguously from `A`.
    NonContiguousOptions,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoOptions => f.write_str("no options recovered"),
            SkipReason::EmptyStem => f.write_str("empty question stem"),
            SkipReason::NonContiguousOptions => f.write_str("option letters are not contiguous"),
        }
    }
}

/// A non-fatal finding to surface to a human reviewer.
///
/// Stored in [`crate::output::ParseOutput::diagnostics`] in the order the
/// pipeline produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The question document yielded no question blocks at all.
    #[error("No questions found")]
    NoQuestionsFound,

    /// A block failed validation and was dropped.
    #[error("Question {question_number} skipped: {reason}")]
    SkippedQuestion {
        question_number: u32,
        reason: SkipReason,
    },

    /// An option marker whose letter is not the expected successor; the line
    /// was kept as body text.
    #[error("Question {question_number}: option letter '{letter}' out of sequence (expected '{expected}'), kept as text")]
    OutOfOrderOptionLetter {
        question_number: u32,
        letter: char,
        expected: char,
    },

    /// A numbering marker that does not increase; kept as text.
    #[error("Question number {found} does not follow {last}, kept as text")]
    NumberingRegression { found: u32, last: u32 },

    /// No answer-key document was supplied.
    #[error("No answer key supplied; correct options are unverified")]
    AnswerKeyAbsent,

    /// The answer-key document was supplied but no entry could be parsed.
    #[error("Answer key contains no recognisable entries")]
    EmptyAnswerKey,

    /// The key lists a number twice; the later entry replaced the earlier.
    #[error("Answer key lists question {question_number} twice ('{previous}' then '{current}'), using '{current}'")]
    DuplicateAnswerKeyEntry {
        question_number: u32,
        previous: char,
        current: char,
    },

    /// A key entry whose number matches no segmented question.
    #[error("Answer key entry {question_number} → '{letter}' matches no question")]
    UnmatchedAnswerKeyEntry { question_number: u32, letter: char },

    /// A question the answer key says nothing about.
    #[error("Question {question_number} has no answer-key entry")]
    MissingAnswerKeyEntry { question_number: u32 },

    /// The resolved answer names an option the question does not have.
    #[error("Question {question_number}: answer '{letter}' is outside its {option_count} options")]
    AnswerOutOfRange {
        question_number: u32,
        letter: char,
        option_count: usize,
    },

    /// The correct option is a policy default, not a verified answer.
    #[error("Question {question_number}: correct option defaulted to '{letter}' (unverified)")]
    DefaultedCorrectOption { question_number: u32, letter: char },
}

impl Diagnostic {
    /// Whether the diagnostic is purely informational (a valid outcome
    /// rather than something that needs fixing).
    pub fn is_informational(&self) -> bool {
        matches!(self, Diagnostic::NoQuestionsFound | Diagnostic::AnswerKeyAbsent)
    }
}
