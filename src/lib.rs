//! # pdf2quiz
//!
//! Recover structured multiple-choice exam questions from PDF documents.
//!
//! Exam PDFs carry no semantic markup: a page is a bag of text runs with
//! `(x, y)` coordinates in no guaranteed order. This crate rebuilds reading
//! order, finds question and option boundaries from numbering patterns, joins
//! an optional answer-key document by question number, and emits validated
//! [`Question`] records together with a list of [`Diagnostic`]s describing
//! everything it could not reconstruct with confidence.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Extract     positioned fragments per page (lopdf, spawn_blocking)
//!  ├─ 2. Lines       Y-band clustering into reading-order lines
//!  ├─ 3. Tables      column-aligned runs → Markdown table rows
//!  ├─ 4. Segment     state machine → question blocks (stem / options / trailing)
//!  ├─ 5. Answer key  second document → number → letter, merged by number
//!  ├─ 6. Build       validated Question records, skip-and-continue
//!  └─ 7. Normalize   whitespace, Markdown escaping, formulas left opaque
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2quiz::{parse, ParseConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let questions = std::fs::read("sample-questions.pdf")?;
//!     let solutions = std::fs::read("sample-solutions.pdf")?;
//!
//!     let output = parse(&questions, Some(&solutions), &ParseConfig::default()).await?;
//!     for q in &output.questions {
//!         println!("{}: {} options, answer {:?}", q.id, q.options.len(), q.correct_option);
//!     }
//!     for d in &output.diagnostics {
//!         eprintln!("review: {d}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2quiz` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod budget;
pub mod config;
pub mod error;
pub mod output;
pub mod parse;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ColumnMode, MissingAnswerPolicy, PageSelection, ParseConfig, ParseConfigBuilder};
pub use error::{Budget, Diagnostic, DocumentRole, Pdf2QuizError, SkipReason, Stage};
pub use output::{AnswerSource, DocumentMetadata, ParseOutput, ParseStats, Question, QuestionOption};
pub use parse::{
    inspect, parse, parse_files, parse_pages, parse_sync, parse_to_file, reconstruct_lines,
    write_output,
};
pub use pipeline::extract::{ExtractedPage, PositionedFragment};
pub use pipeline::lines::Line;
pub use progress::{NoopProgressCallback, ParseProgressCallback, ProgressCallback};
