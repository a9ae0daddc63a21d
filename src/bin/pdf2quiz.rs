//! CLI binary for pdf2quiz.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ParseConfig`, prints questions as JSON and diagnostics to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2quiz::pipeline::input::read_pdf;
use pdf2quiz::{
    inspect, parse_files, reconstruct_lines, write_output, ColumnMode, Diagnostic,
    MissingAnswerPolicy, PageSelection, ParseConfig, ParseOutput, ParseProgressCallback,
    ProgressCallback,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── Terminal styling ─────────────────────────────────────────────────────────

const GREEN: &str = "32";
const YELLOW: &str = "33";
const CYAN: &str = "36";
const DIM: &str = "2";
const BOLD: &str = "1";

fn paint(sgr: &str, s: &str) -> String {
    format!("\x1b[{sgr}m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback. Pages complete out of order when extracted
/// concurrently, so per-page start times are keyed by page number.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn start() -> Arc<Self> {
        let bar = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Loading");
        bar.set_message("reading page tree");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold} {wide_bar:.cyan/238} {pos}/{len} pages  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸─")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }
}

impl ParseProgressCallback for CliProgressCallback {
    fn on_parse_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, line_count: usize) {
        let elapsed_ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&page_num))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            paint(GREEN, "✓"),
            page_num,
            total,
            paint(DIM, &format!("{line_count:>4} lines")),
            paint(DIM, &format!("{elapsed_ms}ms")),
        ));
        self.bar.inc(1);
    }

    fn on_parse_complete(&self, question_count: usize, diagnostic_count: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} questions  {}",
            if diagnostic_count == 0 {
                paint(GREEN, "✔")
            } else {
                paint(CYAN, "◆")
            },
            paint(BOLD, &question_count.to_string()),
            paint(DIM, &format!("{diagnostic_count} diagnostics")),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Questions only (correct options left empty)
  pdf2quiz sample-questions.pdf

  # Questions joined with a separate answer key, written to a file
  pdf2quiz sample-questions.pdf --answer-key sample-solutions.pdf -o questions.json

  # Two-column layout, pages 3 to 20
  pdf2quiz --columns auto --pages 3-20 exam.pdf

  # Reproduce the "default to A" import behaviour (flagged as unverified)
  pdf2quiz --default-answer A exam.pdf

  # Show the reconstructed lines to tune --line-threshold
  pdf2quiz --dump-lines --pages 1 exam.pdf

  # Inspect PDF metadata only
  pdf2quiz --inspect-only exam.pdf

ENVIRONMENT VARIABLES:
  Every flag can also be set as PDF2QUIZ_<FLAG>, e.g. PDF2QUIZ_ANSWER_KEY,
  PDF2QUIZ_LINE_THRESHOLD, PDF2QUIZ_COLUMNS.
  RUST_LOG overrides the log filter.
"#;

/// Extract multiple-choice exam questions from PDF documents.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2quiz",
    version,
    about = "Extract multiple-choice exam questions from PDF documents",
    long_about = "Extract numbered multiple-choice questions from an exam PDF, optionally \
join them with an answer-key PDF by question number, and emit them as JSON. Everything \
the parser could not reconstruct with confidence is listed as a diagnostic on stderr.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Question PDF.
    input: PathBuf,

    /// Answer-key PDF, matched to questions by number.
    #[arg(short = 'k', long, env = "PDF2QUIZ_ANSWER_KEY")]
    answer_key: Option<PathBuf>,

    /// Write JSON to this file instead of stdout.
    #[arg(short, long, env = "PDF2QUIZ_OUTPUT")]
    output: Option<PathBuf>,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2QUIZ_PAGES", default_value = "all")]
    pages: String,

    /// Max Y distance (PDF units) for fragments to share a line.
    #[arg(long, env = "PDF2QUIZ_LINE_THRESHOLD", default_value_t = 8.0)]
    line_threshold: f32,

    /// Line reconstruction: single column, or detect a column gutter.
    #[arg(long, env = "PDF2QUIZ_COLUMNS", value_enum, default_value = "single")]
    columns: ColumnsArg,

    /// Refuse documents with more pages than this.
    #[arg(long, env = "PDF2QUIZ_MAX_PAGES")]
    max_pages: Option<usize>,

    /// Abort the parse after this many seconds.
    #[arg(long, env = "PDF2QUIZ_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Store this letter when no answer is found (marked as unverified).
    #[arg(long, env = "PDF2QUIZ_DEFAULT_ANSWER")]
    default_answer: Option<char>,

    /// Highest letter accepted as an option marker.
    #[arg(long, env = "PDF2QUIZ_MAX_OPTION", default_value_t = 'E')]
    max_option: char,

    /// Do not split "(A) 3 (B) 4" on one line into separate options.
    #[arg(long, env = "PDF2QUIZ_NO_INLINE_OPTIONS")]
    no_inline_options: bool,

    /// Keep "Page N of M" footer lines.
    #[arg(long, env = "PDF2QUIZ_KEEP_FOOTERS")]
    keep_footers: bool,

    /// Keep column-aligned rows as plain text instead of Markdown tables.
    #[arg(long, env = "PDF2QUIZ_NO_TABLES")]
    no_tables: bool,

    /// Pages extracted concurrently.
    #[arg(short, long, env = "PDF2QUIZ_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Print the reconstructed lines per page and exit.
    #[arg(long)]
    dump_lines: bool,

    /// Print PDF metadata only, no parsing.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2QUIZ_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2QUIZ_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the JSON itself.
    #[arg(short, long, env = "PDF2QUIZ_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ColumnsArg {
    Single,
    Auto,
}

impl From<ColumnsArg> for ColumnMode {
    fn from(v: ColumnsArg) -> Self {
        match v {
            ColumnsArg::Single => ColumnMode::Single,
            ColumnsArg::Auto => ColumnMode::Auto,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs while it is on screen.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.dump_lines && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let bytes = read_pdf(&cli.input).await.context("Failed to read PDF")?;
        let meta = inspect(&bytes).await.context("Failed to inspect PDF")?;
        let json = serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?;
        println!("{json}");
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::start();
        Some(cb as Arc<dyn ParseProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Dump-lines mode ──────────────────────────────────────────────────
    if cli.dump_lines {
        let bytes = read_pdf(&cli.input).await.context("Failed to read PDF")?;
        let pages = reconstruct_lines(&bytes, &config)
            .await
            .context("Line reconstruction failed")?;

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        for lines in &pages {
            let Some(first) = lines.first() else { continue };
            writeln!(handle, "{}", paint(BOLD, &format!("── page {} ──", first.page_index + 1)))?;
            for line in lines {
                writeln!(handle, "{}  {}", paint(DIM, &format!("{:>7.1}", line.y)), line.text)?;
            }
        }
        return Ok(());
    }

    // ── Run parse ────────────────────────────────────────────────────────
    let output = parse_files(&cli.input, cli.answer_key.as_deref(), &config)
        .await
        .context("Parse failed")?;

    if let Some(ref output_path) = cli.output {
        write_output(&output, output_path)
            .await
            .context("Failed to write output")?;
    } else {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    // Diagnostics are for a human reviewer and are printed even in quiet mode.
    print_diagnostics(&output.diagnostics);

    if !cli.quiet {
        print_summary(&output, cli.output.as_ref(), show_progress);
    }

    Ok(())
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        if d.is_informational() {
            eprintln!("  {} {}", paint(CYAN, "ℹ"), d);
        } else {
            eprintln!("  {} {}", paint(YELLOW, "⚠"), d);
        }
    }
}

fn print_summary(output: &ParseOutput, path: Option<&PathBuf>, show_progress: bool) {
    let stats = &output.stats;
    let verified = output
        .questions
        .iter()
        .filter(|q| q.has_verified_answer())
        .count();

    if !show_progress {
        eprintln!(
            "Parsed {} questions from {}/{} pages in {}ms",
            stats.question_count, stats.processed_pages, stats.total_pages, stats.total_duration_ms
        );
    }
    eprintln!(
        "   {} with verified answers  /  {} skipped  /  {} out-of-order letters",
        paint(DIM, &verified.to_string()),
        paint(DIM, &stats.skipped_questions.to_string()),
        paint(DIM, &stats.out_of_order_letters.to_string()),
    );
    if let Some(path) = path {
        eprintln!("   →  {}", paint(BOLD, &path.display().to_string()));
    }
}

/// Map CLI args to `ParseConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ParseConfig> {
    let mut builder = ParseConfig::builder()
        .pages(parse_page_selection(&cli.pages)?)
        .line_threshold(cli.line_threshold)
        .column_mode(cli.columns.clone().into())
        .concurrency(cli.concurrency)
        .max_option_letter(cli.max_option)
        .split_inline_options(!cli.no_inline_options)
        .skip_page_footers(!cli.keep_footers)
        .detect_tables(!cli.no_tables);

    if let Some(limit) = cli.max_pages {
        builder = builder.max_pages(limit);
    }
    if let Some(secs) = cli.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(letter) = cli.default_answer {
        builder =
            builder.missing_answer_policy(MissingAnswerPolicy::DefaultTo(letter.to_ascii_uppercase()));
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages`: `all`, `5`, `3-15`, `1,3,5` or a mix such as `1-3,8`.
fn parse_page_selection(spec: &str) -> Result<PageSelection> {
    let spec = spec.trim();
    if spec.eq_ignore_ascii_case("all") {
        return Ok(PageSelection::All);
    }

    let mut pages = Vec::new();
    let mut ranges = Vec::new();
    for item in spec.split(',').map(str::trim) {
        match item.split_once('-') {
            Some((lo, hi)) => {
                let (lo, hi) = (page_number(lo)?, page_number(hi)?);
                if lo > hi {
                    anyhow::bail!("Page range '{item}' runs backwards");
                }
                ranges.push((lo, hi));
            }
            None => pages.push(page_number(item)?),
        }
    }

    if ranges.is_empty() && pages.len() == 1 {
        return Ok(PageSelection::Single(pages[0]));
    }
    if pages.is_empty() && ranges.len() == 1 {
        let (lo, hi) = ranges[0];
        return Ok(PageSelection::Range(lo, hi));
    }
    for (lo, hi) in ranges {
        pages.extend(lo..=hi);
    }
    Ok(PageSelection::Set(pages))
}

fn page_number(s: &str) -> Result<usize> {
    let n: usize = s
        .trim()
        .parse()
        .with_context(|| format!("'{}' is not a page number", s.trim()))?;
    if n == 0 {
        anyhow::bail!("Pages are numbered from 1");
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_selection_forms() {
        assert!(matches!(parse_page_selection("all").unwrap(), PageSelection::All));
        assert!(matches!(parse_page_selection("5").unwrap(), PageSelection::Single(5)));
        assert!(matches!(
            parse_page_selection("3-15").unwrap(),
            PageSelection::Range(3, 15)
        ));
        match parse_page_selection("1, 3,5").unwrap() {
            PageSelection::Set(pages) => assert_eq!(pages, vec![1, 3, 5]),
            other => panic!("unexpected selection: {other:?}"),
        }
        match parse_page_selection("8,1-3").unwrap() {
            PageSelection::Set(mut pages) => {
                pages.sort_unstable();
                assert_eq!(pages, vec![1, 2, 3, 8]);
            }
            other => panic!("unexpected selection: {other:?}"),
        }
    }

    #[test]
    fn page_selection_rejects_bad_input() {
        assert!(parse_page_selection("0").is_err());
        assert!(parse_page_selection("9-3").is_err());
        assert!(parse_page_selection("1,x").is_err());
        assert!(parse_page_selection("").is_err());
    }

    #[test]
    fn cli_maps_onto_config() {
        let cli = Cli::parse_from([
            "pdf2quiz",
            "exam.pdf",
            "--columns",
            "auto",
            "--default-answer",
            "a",
            "--max-pages",
            "50",
            "--no-inline-options",
            "--no-tables",
        ]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.column_mode, ColumnMode::Auto);
        assert_eq!(
            config.missing_answer_policy,
            MissingAnswerPolicy::DefaultTo('A')
        );
        assert_eq!(config.max_pages, Some(50));
        assert!(!config.split_inline_options);
        assert!(config.skip_page_footers);
        assert!(!config.detect_tables);
    }
}
