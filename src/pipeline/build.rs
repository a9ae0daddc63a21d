//! Question model building: blocks + answer key → validated `Question`s.
//!
//! A block that fails validation is dropped with a `SkippedQuestion`
//! diagnostic and the build moves on; one malformed question never costs the
//! rest of the document.

use crate::budget::Deadline;
use crate::config::{MissingAnswerPolicy, ParseConfig};
use crate::error::{Diagnostic, Pdf2QuizError, SkipReason, Stage};
use crate::output::{AnswerSource, Question, QuestionOption};
use crate::pipeline::answer_key::AnswerKey;
use crate::pipeline::lines::Line;
use crate::pipeline::normalize::normalize;
use crate::pipeline::segment::QuestionBlock;
use crate::pipeline::table::is_table_row;
use tracing::{debug, warn};

/// Questions and the diagnostics raised while building them.
#[derive(Debug, Clone, Default)]
pub struct BuildOutcome {
    pub questions: Vec<Question>,
    pub diagnostics: Vec<Diagnostic>,
    pub skipped: usize,
}

/// Build one `Question` per valid block.
pub fn build_questions(
    blocks: &[QuestionBlock],
    key: &AnswerKey,
    config: &ParseConfig,
    deadline: &Deadline,
) -> Result<BuildOutcome, Pdf2QuizError> {
    let mut outcome = BuildOutcome::default();

    for (i, block) in blocks.iter().enumerate() {
        deadline.check_every(i, Stage::Build)?;
        match build_one(block, key, config, &mut outcome.diagnostics) {
            Ok(question) => outcome.questions.push(question),
            Err(reason) => {
                warn!("Question {} skipped: {}", block.question_number, reason);
                outcome.skipped += 1;
                outcome.diagnostics.push(Diagnostic::SkippedQuestion {
                    question_number: block.question_number,
                    reason,
                });
            }
        }
    }

    debug!(
        "Built {} questions ({} skipped)",
        outcome.questions.len(),
        outcome.skipped
    );
    Ok(outcome)
}

fn build_one(
    block: &QuestionBlock,
    key: &AnswerKey,
    config: &ParseConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Question, SkipReason> {
    let number = block.question_number;
    let clean = |lines: &Vec<Line>| normalize(&join_lines(lines), config.escape_currency);

    if block.option_lines.is_empty() {
        return Err(SkipReason::NoOptions);
    }
    let content = clean(&block.stem_lines);
    if content.is_empty() {
        return Err(SkipReason::EmptyStem);
    }

    let mut options = Vec::with_capacity(block.option_lines.len());
    for (position, (&letter, lines)) in block.option_lines.iter().enumerate() {
        let expected = char::from(b'A' + position.min(25) as u8);
        if letter != expected {
            return Err(SkipReason::NonContiguousOptions);
        }
        options.push(QuestionOption {
            key: expected,
            text: clean(lines),
        });
    }

    let entry = key.get(number);
    let candidates = [
        entry.map(|e| (e.correct_letter, AnswerSource::AnswerKey)),
        block.inline_answer.map(|l| (l, AnswerSource::Inline)),
    ];
    let mut answer = None;
    for (letter, source) in candidates.into_iter().flatten() {
        if options.iter().any(|o| o.key == letter) {
            answer = Some((letter, source));
            break;
        }
        warn!(
            "Question {}: answer '{}' outside its {} options",
            number,
            letter,
            options.len()
        );
        diagnostics.push(Diagnostic::AnswerOutOfRange {
            question_number: number,
            letter,
            option_count: options.len(),
        });
    }

    if answer.is_none() {
        if let MissingAnswerPolicy::DefaultTo(letter) = config.missing_answer_policy {
            if options.iter().any(|o| o.key == letter) {
                answer = Some((letter, AnswerSource::Default));
                diagnostics.push(Diagnostic::DefaultedCorrectOption {
                    question_number: number,
                    letter,
                });
            } else {
                diagnostics.push(Diagnostic::AnswerOutOfRange {
                    question_number: number,
                    letter,
                    option_count: options.len(),
                });
            }
        }
    }

    let mut explanation = clean(&block.trailing_lines);
    if explanation.is_empty() {
        if let Some(text) = entry.and_then(|e| e.explanation.as_deref()) {
            explanation = normalize(text, config.escape_currency);
        }
    }

    Ok(Question {
        id: number,
        content,
        options,
        correct_option: answer.map(|(letter, _)| letter),
        answer_source: answer.map(|(_, source)| source),
        explanation: (!explanation.is_empty()).then_some(explanation),
    })
}

/// Join region lines with spaces; table rows keep a line of their own.
fn join_lines(lines: &[Line]) -> String {
    let mut out = String::new();
    let mut prev_row: Option<bool> = None;
    for text in lines.iter().map(|l| l.text.trim()).filter(|t| !t.is_empty()) {
        let row = is_table_row(text);
        if let Some(prev) = prev_row {
            out.push(if prev || row { '\n' } else { ' ' });
        }
        out.push_str(text);
        prev_row = Some(row);
    }
    out
}
