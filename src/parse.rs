//! Parse entry points.
//!
//! [`parse`] is the primary API: question bytes and optional answer-key bytes
//! in, [`ParseOutput`] out. Both documents are loaded and extracted
//! concurrently; within a document pages run on the blocking pool, at most
//! `concurrency` at a time, and are collected back in page order before the
//! single-threaded segmentation, merge and build stages run.
//!
//! [`parse_pages`] is the same pipeline minus the PDF layer, for callers that
//! already have positioned fragments.

use crate::budget::{check_page_budget, Deadline};
use crate::config::ParseConfig;
use crate::error::{DocumentRole, Pdf2QuizError};
use crate::output::{DocumentMetadata, ParseOutput, ParseStats};
use crate::pipeline::extract::{load_document, ExtractedPage, PdfDocument};
use crate::pipeline::lines::{self, Line};
use crate::pipeline::{answer_key, build, input, segment, table};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Parse a question PDF, and optionally its answer key, into questions.
///
/// # Errors
/// Returns `Err` only for fatal problems, with no partial output:
/// - either buffer is not a parseable PDF, or has no pages
/// - the page selection matches no page
/// - the page or time budget is exceeded
///
/// Everything else (skipped questions, key mismatches, defaulted answers) is
/// reported in [`ParseOutput::diagnostics`].
pub async fn parse(
    question_pdf: &[u8],
    answer_key_pdf: Option<&[u8]>,
    config: &ParseConfig,
) -> Result<ParseOutput, Pdf2QuizError> {
    let total_start = Instant::now();
    let deadline = Deadline::new(config.timeout());
    info!(
        "Starting parse ({} bytes, answer key: {})",
        question_pdf.len(),
        answer_key_pdf.map_or("none".to_string(), |b| format!("{} bytes", b.len()))
    );

    // ── Step 1: Load both documents ──────────────────────────────────────
    let (questions_doc, key_doc) = tokio::try_join!(
        load_blocking(question_pdf.to_vec(), DocumentRole::Questions),
        async {
            match answer_key_pdf {
                Some(bytes) => load_blocking(bytes.to_vec(), DocumentRole::AnswerKey)
                    .await
                    .map(Some),
                None => Ok(None),
            }
        }
    )?;

    check_page_budget(config.max_pages, questions_doc.page_count())?;
    if let Some(doc) = &key_doc {
        check_page_budget(config.max_pages, doc.page_count())?;
    }

    // ── Step 2: Select pages ─────────────────────────────────────────────
    let total_pages = questions_doc.page_count();
    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(Pdf2QuizError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }
    debug!("Selected {} of {} pages", page_indices.len(), total_pages);

    if let Some(ref cb) = config.progress_callback {
        cb.on_parse_start(page_indices.len());
    }

    // ── Step 3: Extract + reconstruct lines, both documents at once ──────
    let extract_start = Instant::now();
    let metadata = questions_doc.metadata();
    let key_pages = key_doc.as_ref().map(|d| (0..d.page_count()).collect::<Vec<_>>());
    let (question_pages, key_pages) = tokio::try_join!(
        extract_pages(
            Arc::clone(&questions_doc),
            page_indices,
            config,
            deadline,
            true
        ),
        async {
            match (key_doc, key_pages) {
                (Some(doc), Some(indices)) => extract_pages(doc, indices, config, deadline, false)
                    .await
                    .map(Some),
                _ => Ok(None),
            }
        }
    )?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} pages in {}ms",
        question_pages.len(),
        extract_duration_ms
    );

    // ── Step 4: Segment, merge, build ────────────────────────────────────
    let stats = ParseStats {
        total_pages,
        processed_pages: question_pages.len(),
        fragment_count: question_pages.iter().map(|p| p.fragments).sum(),
        extract_duration_ms,
        ..ParseStats::default()
    };
    let question_lines: Vec<Line> = question_pages.into_iter().flat_map(|p| p.lines).collect();
    let key_lines = key_pages.map(|pages| {
        pages
            .into_iter()
            .flat_map(|p| p.lines)
            .collect::<Vec<Line>>()
    });

    let mut output = assemble(question_lines, key_lines, config, &deadline, stats)?;
    output.metadata = Some(metadata);
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Parse complete: {} questions, {} diagnostics, {}ms total",
        output.questions.len(),
        output.diagnostics.len(),
        output.stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_parse_complete(output.questions.len(), output.diagnostics.len());
    }

    Ok(output)
}

/// Synchronous wrapper around [`parse`].
///
/// Creates a temporary tokio runtime internally.
pub fn parse_sync(
    question_pdf: &[u8],
    answer_key_pdf: Option<&[u8]>,
    config: &ParseConfig,
) -> Result<ParseOutput, Pdf2QuizError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2QuizError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(parse(question_pdf, answer_key_pdf, config))
}

/// Read the question (and answer-key) PDF from disk, then [`parse`].
pub async fn parse_files(
    question_path: impl AsRef<Path>,
    answer_key_path: Option<&Path>,
    config: &ParseConfig,
) -> Result<ParseOutput, Pdf2QuizError> {
    let (questions, key) = tokio::try_join!(input::read_pdf(question_path.as_ref()), async {
        match answer_key_path {
            Some(path) => input::read_pdf(path).await.map(Some),
            None => Ok(None),
        }
    })?;
    parse(&questions, key.as_deref(), config).await
}

/// Parse files and write the output as JSON.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn parse_to_file(
    question_path: impl AsRef<Path>,
    answer_key_path: Option<&Path>,
    output_path: impl AsRef<Path>,
    config: &ParseConfig,
) -> Result<ParseOutput, Pdf2QuizError> {
    let output = parse_files(question_path, answer_key_path, config).await?;
    write_output(&output, output_path).await?;
    Ok(output)
}

/// Write `output` as pretty JSON to `path`, atomically.
pub async fn write_output(
    output: &ParseOutput,
    path: impl AsRef<Path>,
) -> Result<(), Pdf2QuizError> {
    let path = path.as_ref();
    let json = serde_json::to_vec_pretty(output)
        .map_err(|e| Pdf2QuizError::Internal(format!("serialising output: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Pdf2QuizError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json)
        .await
        .map_err(|e| Pdf2QuizError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Pdf2QuizError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    debug!("Wrote {} bytes to {}", json.len(), path.display());
    Ok(())
}

/// Run segmentation, answer-key merge and build over pre-extracted pages.
///
/// Pages are reconstructed into lines with `config` and processed in the
/// order given. No PDF parsing and no I/O happen here.
pub fn parse_pages(
    pages: Vec<ExtractedPage>,
    answer_key_pages: Option<Vec<ExtractedPage>>,
    config: &ParseConfig,
) -> Result<ParseOutput, Pdf2QuizError> {
    let total_start = Instant::now();
    let deadline = Deadline::new(config.timeout());
    check_page_budget(config.max_pages, pages.len())?;
    if let Some(key) = &answer_key_pages {
        check_page_budget(config.max_pages, key.len())?;
    }

    let to_lines = |pages: &[ExtractedPage]| -> Result<Vec<Line>, Pdf2QuizError> {
        let mut all = Vec::new();
        for page in pages {
            all.extend(lines::reconstruct_page(page, config, &deadline)?);
        }
        Ok(all)
    };

    let stats = ParseStats {
        total_pages: pages.len(),
        processed_pages: pages.len(),
        fragment_count: pages.iter().map(|p| p.fragments.len()).sum(),
        ..ParseStats::default()
    };
    let question_lines = to_lines(pages.as_slice())?;
    let key_lines = answer_key_pages.as_deref().map(to_lines).transpose()?;

    let mut output = assemble(question_lines, key_lines, config, &deadline, stats)?;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    Ok(output)
}

/// Reconstructed lines of every selected page, for debugging layouts.
pub async fn reconstruct_lines(
    pdf: &[u8],
    config: &ParseConfig,
) -> Result<Vec<Vec<Line>>, Pdf2QuizError> {
    let deadline = Deadline::new(config.timeout());
    let doc = load_blocking(pdf.to_vec(), DocumentRole::Questions).await?;
    check_page_budget(config.max_pages, doc.page_count())?;

    let indices = config.pages.to_indices(doc.page_count());
    if indices.is_empty() {
        return Err(Pdf2QuizError::PageOutOfRange {
            page: 0,
            total: doc.page_count(),
        });
    }
    let pages = extract_pages(doc, indices, config, deadline, false).await?;
    Ok(pages.into_iter().map(|p| p.lines).collect())
}

/// Extract PDF metadata without parsing content.
pub async fn inspect(pdf: &[u8]) -> Result<DocumentMetadata, Pdf2QuizError> {
    let doc = load_blocking(pdf.to_vec(), DocumentRole::Questions).await?;
    Ok(doc.metadata())
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// The lines of one page plus how many fragments produced them.
struct PageLines {
    fragments: usize,
    lines: Vec<Line>,
}

async fn load_blocking(
    bytes: Vec<u8>,
    role: DocumentRole,
) -> Result<Arc<PdfDocument>, Pdf2QuizError> {
    tokio::task::spawn_blocking(move || load_document(&bytes, role).map(Arc::new))
        .await
        .map_err(|e| Pdf2QuizError::Internal(format!("Load task panicked: {}", e)))?
}

/// Extract and reconstruct `indices` of `doc`, returned in the order given.
async fn extract_pages(
    doc: Arc<PdfDocument>,
    indices: Vec<usize>,
    config: &ParseConfig,
    deadline: Deadline,
    report_progress: bool,
) -> Result<Vec<PageLines>, Pdf2QuizError> {
    let total = indices.len();
    let role = doc.role();

    let pages: Vec<PageLines> = stream::iter(indices.into_iter().map(|idx| {
        let doc = Arc::clone(&doc);
        let config = config.clone();
        async move {
            let page_num = idx + 1;
            let cb = config
                .progress_callback
                .clone()
                .filter(|_| report_progress);
            if let Some(ref cb) = cb {
                cb.on_page_start(page_num, total);
            }

            let page = tokio::task::spawn_blocking(move || {
                let page = doc.extract_page(idx, &deadline)?;
                let lines = lines::reconstruct_page(&page, &config, &deadline)?;
                Ok::<_, Pdf2QuizError>(PageLines {
                    fragments: page.fragments.len(),
                    lines,
                })
            })
            .await
            .map_err(|e| Pdf2QuizError::Internal(format!("Page task panicked: {}", e)))??;

            debug!(
                "{} page {}: {} fragments → {} lines",
                role,
                page_num,
                page.fragments,
                page.lines.len()
            );
            if let Some(ref cb) = cb {
                cb.on_page_complete(page_num, total, page.lines.len());
            }
            Ok::<_, Pdf2QuizError>(page)
        }
    }))
    .buffered(config.concurrency.max(1))
    .try_collect()
    .await?;

    Ok(pages)
}

/// Segment → parse key → merge → build, shared by [`parse`] and [`parse_pages`].
fn assemble(
    question_lines: Vec<Line>,
    key_lines: Option<Vec<Line>>,
    config: &ParseConfig,
    deadline: &Deadline,
    mut stats: ParseStats,
) -> Result<ParseOutput, Pdf2QuizError> {
    stats.line_count = question_lines.len();
    let question_lines = if config.detect_tables {
        table::mark_tables(question_lines, config)
    } else {
        question_lines
    };

    let segmented = segment::segment(&question_lines, config, deadline)?;
    let mut diagnostics = segmented.diagnostics;

    let parsed_key = match key_lines {
        Some(lines) => {
            let (key, key_diagnostics) = answer_key::parse_answer_key(&lines, config, deadline)?;
            diagnostics.extend(key_diagnostics);
            Some(key)
        }
        None => None,
    };
    stats.answer_key_entries = parsed_key.as_ref().map_or(0, |k| k.len());

    let (key, merge_diagnostics) = answer_key::merge(&segmented.blocks, parsed_key);
    diagnostics.extend(merge_diagnostics);

    let built = build::build_questions(&segmented.blocks, &key, config, deadline)?;
    diagnostics.extend(built.diagnostics);

    stats.block_count = segmented.blocks.len();
    stats.question_count = built.questions.len();
    stats.skipped_questions = built.skipped;
    stats.out_of_order_letters = segmented.out_of_order_letters;

    Ok(ParseOutput {
        questions: built.questions,
        diagnostics,
        metadata: None,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Diagnostic;
    use crate::pipeline::extract::PositionedFragment;

    fn page(index: usize, rows: &[&str]) -> ExtractedPage {
        let fragments = rows
            .iter()
            .enumerate()
            .map(|(i, t)| PositionedFragment::new(index, *t, 72.0, 700.0 - 20.0 * i as f32))
            .collect();
        ExtractedPage::new(index, fragments)
    }

    #[test]
    fn parse_pages_round_trip() {
        let questions = page(0, &["1. What is 2+2?", "A. 3", "B. 4", "C. 5"]);
        let key = page(0, &["1 B"]);
        let out = parse_pages(vec![questions], Some(vec![key]), &ParseConfig::default()).unwrap();
        assert_eq!(out.questions.len(), 1);
        assert_eq!(out.questions[0].correct_option, Some('B'));
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.stats.line_count, 4);
        assert_eq!(out.stats.answer_key_entries, 1);
        assert!(out.metadata.is_none());
    }

    #[test]
    fn questions_span_pages() {
        let p1 = page(0, &["1. Spans", "a page break", "A. x"]);
        let p2 = page(1, &["B. y", "2. Next", "A. z"]);
        let out = parse_pages(vec![p1, p2], None, &ParseConfig::default()).unwrap();
        assert_eq!(out.questions.len(), 2);
        assert_eq!(out.questions[0].content, "Spans a page break");
        assert_eq!(out.questions[0].options.len(), 2);
        assert_eq!(out.diagnostics, vec![Diagnostic::AnswerKeyAbsent]);
    }

    fn table_page() -> ExtractedPage {
        let cells = [
            ("1. How many deaths at ages 20-29?", 72.0, 700.0),
            ("Age", 72.0, 680.0),
            ("Deaths", 200.0, 680.0),
            ("20-29", 72.0, 660.0),
            ("12", 204.0, 660.0),
            ("A. 12", 72.0, 640.0),
            ("B. 20", 72.0, 620.0),
        ];
        let fragments = cells
            .iter()
            .map(|&(t, x, y)| PositionedFragment::new(0, t, x, y))
            .collect();
        ExtractedPage::new(0, fragments)
    }

    #[test]
    fn parse_pages_renders_tables() {
        let out = parse_pages(vec![table_page()], None, &ParseConfig::default()).unwrap();
        let q = &out.questions[0];
        assert_eq!(
            q.content,
            "How many deaths at ages 20-29?\n\n| Age | Deaths |\n| --- | --- |\n| 20-29 | 12 |"
        );
        assert_eq!(q.options.len(), 2);
        assert_eq!(out.stats.line_count, 5);
    }

    #[test]
    fn parse_pages_tables_can_be_disabled() {
        let config = ParseConfig::builder().detect_tables(false).build().unwrap();
        let out = parse_pages(vec![table_page()], None, &config).unwrap();
        assert_eq!(
            out.questions[0].content,
            "How many deaths at ages 20-29? Age Deaths 20-29 12"
        );
    }

    #[test]
    fn parse_pages_respects_page_budget() {
        let config = ParseConfig::builder().max_pages(1).build().unwrap();
        let err = parse_pages(vec![page(0, &[]), page(1, &[])], None, &config).unwrap_err();
        assert!(matches!(err, Pdf2QuizError::ParseTimeout { .. }));
    }

    #[test]
    fn parse_pages_budgets_answer_key_pages() {
        let config = ParseConfig::builder().max_pages(1).build().unwrap();
        let questions = page(0, &["1. What is 2+2?", "A. 3", "B. 4"]);
        let key = vec![page(0, &["1 B"]), page(1, &["2 C"])];
        let err = parse_pages(vec![questions], Some(key), &config).unwrap_err();
        assert!(matches!(err, Pdf2QuizError::ParseTimeout { .. }));
    }

    #[test]
    fn no_questions_is_not_an_error() {
        let out = parse_pages(vec![page(0, &["Cover page"])], None, &ParseConfig::default())
            .unwrap();
        assert!(out.questions.is_empty());
        assert!(out.diagnostics.contains(&Diagnostic::NoQuestionsFound));
    }
}
