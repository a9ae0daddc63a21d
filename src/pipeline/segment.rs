//! Question segmentation: reading-order lines → question blocks.
//!
//! A four-state machine driven by three line patterns: a question start
//! (`12.` / `12)`), an option start (`B.` / `B)` / `B:` / `(B)`) and a
//! trailing marker (`Answer:`, `Solution:`, `Explanation:`,
//! `Correct answer:`). Anything else is body text for whatever region is open.
//!
//! Two rules keep stray markers from corrupting structure:
//! * question numbers must strictly increase, otherwise the line is text;
//! * options open only in alphabetical succession, so a capital letter that
//!   merely looks like a marker stays inside the current option.
//!
//! Markdown table rows (`| a | b |`) are always body text.

use crate::budget::Deadline;
use crate::config::ParseConfig;
use crate::error::{Diagnostic, Pdf2QuizError, Stage};
use crate::pipeline::lines::Line;
use crate::pipeline::table::is_table_row;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

static RE_QUESTION_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)[.)](?:$|([^0-9].*)$)").unwrap());

static RE_OPTION_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\(([A-Z])\)|([A-Z])[.):])(?:\s+(.*))?$").unwrap());

/// An option marker inside a line (used for horizontally laid out options).
static RE_INLINE_OPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)(?:\(([A-Z])\)|([A-Z])[.):])(?:\s|$)").unwrap());

static RE_TRAILING_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:(correct answer|answer|solution|explanation))\s*:\s*(.*)$").unwrap()
});

/// A leading answer letter, its punctuation, and the first character after it.
static RE_INLINE_ANSWER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<marker>\(?(?P<letter>[A-Z])\)?[.,;:]?)(?:$|\s+(?P<next>\S))").unwrap()
});

static RE_PAGE_FOOTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^page\s+\d+\s+of\s+\d+$").unwrap());

/// The lines of one question, split into regions.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionBlock {
    pub question_number: u32,
    pub stem_lines: Vec<Line>,
    /// Option letter → lines; letters as segmented, contiguous from `'A'`.
    pub option_lines: BTreeMap<char, Vec<Line>>,
    /// Lines after an answer/explanation marker.
    pub trailing_lines: Vec<Line>,
    /// Letter from an `Answer: X` line inside the block.
    pub inline_answer: Option<char>,
}

impl QuestionBlock {
    pub fn new(question_number: u32) -> Self {
        Self {
            question_number,
            stem_lines: Vec::new(),
            option_lines: BTreeMap::new(),
            trailing_lines: Vec::new(),
            inline_answer: None,
        }
    }
}

/// Everything the segmenter produced.
#[derive(Debug, Clone, Default)]
pub struct SegmentOutcome {
    pub blocks: Vec<QuestionBlock>,
    pub diagnostics: Vec<Diagnostic>,
    pub out_of_order_letters: usize,
    pub footer_lines: usize,
    pub preamble_lines: usize,
}

/// Segment `lines` (the whole document, in reading order) into question blocks.
pub fn segment(
    lines: &[Line],
    config: &ParseConfig,
    deadline: &Deadline,
) -> Result<SegmentOutcome, Pdf2QuizError> {
    let mut segmenter = Segmenter::new(config);
    for (i, line) in lines.iter().enumerate() {
        deadline.check_every(i, Stage::Segment)?;
        segmenter.feed(line);
    }
    Ok(segmenter.finish())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SeekQuestion,
    InStem,
    InOptions(char),
    InTrailing,
}

struct Segmenter<'a> {
    config: &'a ParseConfig,
    state: State,
    current: Option<QuestionBlock>,
    last_number: Option<u32>,
    outcome: SegmentOutcome,
}

impl<'a> Segmenter<'a> {
    fn new(config: &'a ParseConfig) -> Self {
        Self {
            config,
            state: State::SeekQuestion,
            current: None,
            last_number: None,
            outcome: SegmentOutcome::default(),
        }
    }

    fn feed(&mut self, line: &Line) {
        let text = line.text.trim();
        if text.is_empty() {
            return;
        }
        if self.config.skip_page_footers && is_page_footer(text) {
            self.outcome.footer_lines += 1;
            return;
        }
        if is_table_row(text) {
            self.push_text(line, text);
            return;
        }

        if let Some((number, rest)) = question_start(text) {
            if self.accepts(number) {
                self.open_question(number, line, rest);
                return;
            }
            if let Some(last) = self.last_number {
                debug!("Question marker {} after {} kept as text", number, last);
                self.outcome.diagnostics.push(Diagnostic::NumberingRegression {
                    found: number,
                    last,
                });
            }
        }

        match self.state {
            State::SeekQuestion => self.outcome.preamble_lines += 1,
            State::InStem => self.feed_stem(line, text),
            State::InOptions(current) => self.feed_options(line, text, current),
            State::InTrailing => self.push_text(line, text),
        }
    }

    /// Append `text` to whichever region is open, without looking for markers.
    fn push_text(&mut self, line: &Line, text: &str) {
        match self.state {
            State::SeekQuestion => self.outcome.preamble_lines += 1,
            State::InStem => {
                if let Some(block) = self.current.as_mut() {
                    block.stem_lines.push(line.with_text(text));
                }
            }
            State::InOptions(current) => self.append_to_option(current, line.with_text(text)),
            State::InTrailing => {
                if let Some(block) = self.current.as_mut() {
                    block.trailing_lines.push(line.with_text(text));
                }
            }
        }
    }

    fn accepts(&self, number: u32) -> bool {
        match self.last_number {
            None => number > 0,
            Some(last) => {
                number > last
                    && self
                        .config
                        .max_question_gap
                        .is_none_or(|gap| number - last <= gap)
            }
        }
    }

    fn open_question(&mut self, number: u32, line: &Line, rest: &str) {
        self.close_block();
        let mut block = QuestionBlock::new(number);
        if !rest.is_empty() {
            block.stem_lines.push(line.with_text(rest));
        }
        self.current = Some(block);
        self.last_number = Some(number);
        self.state = State::InStem;
    }

    fn feed_stem(&mut self, line: &Line, text: &str) {
        if self.enter_trailing(line, text) {
            return;
        }
        match self.option_start(text) {
            Some(('A', rest)) => self.open_options('A', line, rest),
            Some((letter, _)) => {
                self.report_out_of_order(letter, 'A');
                if let Some(block) = self.current.as_mut() {
                    block.stem_lines.push(line.with_text(text));
                }
            }
            None => {
                if let Some(block) = self.current.as_mut() {
                    block.stem_lines.push(line.with_text(text));
                }
            }
        }
    }

    fn feed_options(&mut self, line: &Line, text: &str, current: char) {
        if self.enter_trailing(line, text) {
            return;
        }
        let expected = successor(current);
        match self.option_start(text) {
            Some((letter, rest)) if letter == expected => {
                self.open_options(letter, line, rest);
            }
            Some((letter, _)) => {
                self.report_out_of_order(letter, expected);
                self.append_to_option(current, line.with_text(text));
            }
            None => self.append_to_option(current, line.with_text(text)),
        }
    }

    /// Open option `first` and, when enabled, every alphabetical successor
    /// found later on the same line.
    fn open_options(&mut self, first: char, line: &Line, rest: &str) {
        let parts = self.split_inline(first, rest);
        let Some(block) = self.current.as_mut() else {
            return;
        };
        let mut last = first;
        for (letter, text) in parts {
            let entry = block.option_lines.entry(letter).or_default();
            if !text.is_empty() {
                entry.push(line.with_text(text));
            }
            last = letter;
        }
        self.state = State::InOptions(last);
    }

    fn split_inline<'t>(&self, first: char, rest: &'t str) -> Vec<(char, &'t str)> {
        let mut parts = Vec::new();
        let mut current = first;
        let mut remaining = rest;

        while self.config.split_inline_options {
            let expected = successor(current);
            if expected > self.config.max_option_letter {
                break;
            }
            let found = RE_INLINE_OPTION.captures_iter(remaining).find_map(|caps| {
                let letter = marker_letter(&caps)?;
                let whole = caps.get(0)?;
                (letter == expected).then(|| whole.range())
            });
            let Some(range) = found else { break };
            parts.push((current, remaining[..range.start].trim()));
            current = expected;
            remaining = &remaining[range.end..];
        }
        parts.push((current, remaining.trim()));
        parts
    }

    fn append_to_option(&mut self, letter: char, line: Line) {
        if let Some(block) = self.current.as_mut() {
            block.option_lines.entry(letter).or_default().push(line);
        }
    }

    /// Switch to `InTrailing` when `text` carries an answer/explanation marker.
    fn enter_trailing(&mut self, line: &Line, text: &str) -> bool {
        let Some(caps) = RE_TRAILING_MARKER.captures(text) else {
            return false;
        };
        let marker = caps[1].to_ascii_lowercase();
        let mut rest = caps.get(2).map_or("", |m| m.as_str()).trim();

        let Some(block) = self.current.as_mut() else {
            return false;
        };
        if marker != "explanation" {
            let answer = leading_answer(rest)
                .filter(|(letter, _)| *letter <= self.config.max_option_letter);
            if let Some((letter, consumed)) = answer {
                block.inline_answer = Some(letter);
                rest = rest[consumed..].trim();
            }
        }
        if !rest.is_empty() {
            block.trailing_lines.push(line.with_text(rest));
        }
        self.state = State::InTrailing;
        true
    }

    fn option_start<'t>(&self, text: &'t str) -> Option<(char, &'t str)> {
        let caps = RE_OPTION_START.captures(text)?;
        let letter = marker_letter(&caps)?;
        if letter > self.config.max_option_letter {
            return None;
        }
        let rest = caps.get(3).map_or("", |m| m.as_str()).trim();
        Some((letter, rest))
    }

    fn report_out_of_order(&mut self, letter: char, expected: char) {
        self.outcome.out_of_order_letters += 1;
        if let Some(block) = &self.current {
            debug!(
                "Question {}: option '{}' where '{}' was expected",
                block.question_number, letter, expected
            );
            self.outcome
                .diagnostics
                .push(Diagnostic::OutOfOrderOptionLetter {
                    question_number: block.question_number,
                    letter,
                    expected,
                });
        }
    }

    fn close_block(&mut self) {
        if let Some(block) = self.current.take() {
            self.outcome.blocks.push(block);
        }
        self.state = State::SeekQuestion;
    }

    fn finish(mut self) -> SegmentOutcome {
        self.close_block();
        if self.outcome.blocks.is_empty() {
            self.outcome.diagnostics.push(Diagnostic::NoQuestionsFound);
        }
        debug!(
            "Segmented {} blocks ({} preamble, {} footer lines, {} out-of-order letters)",
            self.outcome.blocks.len(),
            self.outcome.preamble_lines,
            self.outcome.footer_lines,
            self.outcome.out_of_order_letters
        );
        self.outcome
    }
}

/// Whether `text` is a `Page N of M` footer.
pub(crate) fn is_page_footer(text: &str) -> bool {
    RE_PAGE_FOOTER.is_match(text.trim())
}

/// Whether `text` opens with a question, option or answer marker.
pub(crate) fn starts_with_marker(text: &str, max_option_letter: char) -> bool {
    let text = text.trim();
    question_start(text).is_some()
        || RE_TRAILING_MARKER.is_match(text)
        || RE_OPTION_START
            .captures(text)
            .and_then(|caps| marker_letter(&caps))
            .is_some_and(|letter| letter <= max_option_letter)
}

/// `(number, rest)` when `text` starts with a question marker.
fn question_start(text: &str) -> Option<(u32, &str)> {
    let caps = RE_QUESTION_START.captures(text)?;
    let number = caps[1].parse().ok()?;
    let rest = caps.get(2).map_or("", |m| m.as_str()).trim();
    Some((number, rest))
}

/// The answer letter at the start of `text` and the bytes its marker spans.
///
/// A bare capital followed by a word (`A policyholder pays`) is prose, not an
/// answer; punctuation (`B.`, `(B)`) or end of line is required before one.
fn leading_answer(text: &str) -> Option<(char, usize)> {
    let caps = RE_INLINE_ANSWER.captures(text)?;
    let marker = caps.name("marker")?;
    let letter = caps.name("letter")?.as_str().chars().next()?;
    let punctuated = marker.as_str().ends_with(|c: char| !c.is_ascii_uppercase());
    let word_follows = caps
        .name("next")
        .and_then(|m| m.as_str().chars().next())
        .is_some_and(char::is_alphabetic);
    (punctuated || !word_follows).then_some((letter, marker.end()))
}

/// The letter of an option marker match: group 1 for `(A)`, group 2 for `A.`.
fn marker_letter(caps: &regex::Captures<'_>) -> Option<char> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().chars().next())
}

fn successor(letter: char) -> char {
    char::from_u32(letter as u32 + 1).unwrap_or(letter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(texts: &[&str]) -> Vec<Line> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Line::from_text(0, 700.0 - 14.0 * i as f32, *t))
            .collect()
    }

    fn run(texts: &[&str]) -> SegmentOutcome {
        run_with(texts, &ParseConfig::default())
    }

    fn run_with(texts: &[&str], config: &ParseConfig) -> SegmentOutcome {
        segment(&lines(texts), config, &Deadline::unbounded()).unwrap()
    }

    fn option_text(block: &QuestionBlock, letter: char) -> String {
        block.option_lines[&letter]
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn stem_text(block: &QuestionBlock) -> String {
        block
            .stem_lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn basic_question() {
        let out = run(&["1. What is 2+2?", "A. 3", "B. 4", "C. 5"]);
        assert_eq!(out.blocks.len(), 1);
        let b = &out.blocks[0];
        assert_eq!(b.question_number, 1);
        assert_eq!(stem_text(b), "What is 2+2?");
        assert_eq!(b.option_lines.keys().copied().collect::<String>(), "ABC");
        assert_eq!(option_text(b, 'B'), "4");
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn preamble_is_dropped() {
        let out = run(&["Exam P Sample Questions", "Copyright 2024", "1. Q", "A. x"]);
        assert_eq!(out.preamble_lines, 2);
        assert_eq!(out.blocks.len(), 1);
    }

    #[test]
    fn multi_line_stem_and_options() {
        let out = run(&[
            "2. An insurer offers",
            "a policy with deductible 100.",
            "A. 50",
            "B. 100 after",
            "the deductible",
        ]);
        let b = &out.blocks[0];
        assert_eq!(stem_text(b), "An insurer offers a policy with deductible 100.");
        assert_eq!(option_text(b, 'B'), "100 after the deductible");
    }

    #[test]
    fn numbering_must_increase() {
        let out = run(&["1. First", "A. a", "3. Third", "A. c", "2. Stray", "A. s"]);
        let numbers: Vec<u32> = out.blocks.iter().map(|b| b.question_number).collect();
        assert_eq!(numbers, vec![1, 3]);
        assert!(out
            .diagnostics
            .contains(&Diagnostic::NumberingRegression { found: 2, last: 3 }));
        // "2. Stray" and the repeated "A. s" both land in option A of 3
        assert!(option_text(&out.blocks[1], 'A').contains("2. Stray"));
    }

    #[test]
    fn decimal_is_not_a_question_marker() {
        let out = run(&["1. Compute", "2.5 times x", "A. 1"]);
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(stem_text(&out.blocks[0]), "Compute 2.5 times x");
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn max_question_gap_rejects_jumps() {
        let config = ParseConfig::builder().max_question_gap(5).build().unwrap();
        let out = run_with(&["1. First", "A. a", "250. pounds of", "B. b"], &config);
        assert_eq!(out.blocks.len(), 1);
        assert!(out
            .diagnostics
            .contains(&Diagnostic::NumberingRegression { found: 250, last: 1 }));
        assert_eq!(option_text(&out.blocks[0], 'A'), "a 250. pounds of");
        assert_eq!(option_text(&out.blocks[0], 'B'), "b");
    }

    #[test]
    fn options_stay_contiguous() {
        let out = run(&["1. Q", "A. a", "C. c", "B. b", "D. d"]);
        let b = &out.blocks[0];
        assert_eq!(b.option_lines.keys().copied().collect::<String>(), "AB");
        assert_eq!(option_text(b, 'A'), "a C. c");
        assert_eq!(option_text(b, 'B'), "b D. d");
        assert_eq!(out.out_of_order_letters, 2);
    }

    #[test]
    fn price_is_high_stays_in_option_b() {
        let out = run(&[
            "1. Which describes the market?",
            "A. Price is Low, not High",
            "B. Price is High, not Low",
            "L. Low)",
        ]);
        let b = &out.blocks[0];
        assert_eq!(b.option_lines.len(), 2);
        assert_eq!(option_text(b, 'B'), "Price is High, not Low L. Low)");
        // 'L' is above the max option letter, so it is plain text
        assert_eq!(out.out_of_order_letters, 0);
    }

    #[test]
    fn out_of_order_letter_in_stem() {
        let out = run(&["1. Consider", "B. starts early", "A. first"]);
        let b = &out.blocks[0];
        assert_eq!(stem_text(b), "Consider B. starts early");
        assert_eq!(option_text(b, 'A'), "first");
        assert_eq!(
            out.diagnostics,
            vec![Diagnostic::OutOfOrderOptionLetter {
                question_number: 1,
                letter: 'B',
                expected: 'A',
            }]
        );
    }

    #[test]
    fn parenthesised_markers() {
        let out = run(&["1) Pick one", "(A) red", "(B) blue"]);
        let b = &out.blocks[0];
        assert_eq!(option_text(b, 'A'), "red");
        assert_eq!(option_text(b, 'B'), "blue");
    }

    #[test]
    fn inline_options_are_split() {
        let out = run(&["1. What is 2+2?", "(A) 3 (B) 4 (C) 5"]);
        let b = &out.blocks[0];
        assert_eq!(b.option_lines.keys().copied().collect::<String>(), "ABC");
        assert_eq!(option_text(b, 'C'), "5");
    }

    #[test]
    fn inline_split_only_accepts_successor() {
        let out = run(&["1. Q", "A. x (C) y B. z"]);
        let b = &out.blocks[0];
        assert_eq!(option_text(b, 'A'), "x (C) y");
        assert_eq!(option_text(b, 'B'), "z");
    }

    #[test]
    fn inline_split_can_be_disabled() {
        let config = ParseConfig::builder()
            .split_inline_options(false)
            .build()
            .unwrap();
        let out = run_with(&["1. Q", "(A) 3 (B) 4"], &config);
        assert_eq!(option_text(&out.blocks[0], 'A'), "3 (B) 4");
    }

    #[test]
    fn marker_without_text_opens_empty_option() {
        let out = run(&["1. Q", "A.", "three", "B. four"]);
        let b = &out.blocks[0];
        assert_eq!(option_text(b, 'A'), "three");
    }

    #[test]
    fn trailing_region_and_inline_answer() {
        let out = run(&[
            "1. What is 2+2?",
            "A. 3",
            "B. 4",
            "Answer: B",
            "Because 2+2=4.",
            "A. this is not an option",
            "2. Next",
            "A. y",
        ]);
        let b = &out.blocks[0];
        assert_eq!(b.inline_answer, Some('B'));
        assert_eq!(b.option_lines.len(), 2);
        let trailing: Vec<&str> = b.trailing_lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(trailing, vec!["Because 2+2=4.", "A. this is not an option"]);
        assert_eq!(out.blocks[1].question_number, 2);
    }

    #[test]
    fn solution_marker_with_parenthesised_letter() {
        let out = run(&["1. Q", "A. a", "B. b", "Solution: (A) since a wins"]);
        let b = &out.blocks[0];
        assert_eq!(b.inline_answer, Some('A'));
        assert_eq!(b.trailing_lines[0].text, "since a wins");
    }

    #[test]
    fn article_after_answer_marker_is_prose() {
        let out = run(&["1. Q", "A. a", "B. b", "Answer: A policyholder pays 5"]);
        let b = &out.blocks[0];
        assert_eq!(b.inline_answer, None);
        assert_eq!(b.trailing_lines[0].text, "A policyholder pays 5");
    }

    #[test]
    fn punctuated_answer_letter_before_prose() {
        for text in ["Answer: B. The mean is 4", "Answer: B, since 4", "Answer: B 4 is even"] {
            let out = run(&["1. Q", "A. a", "B. b", text]);
            assert_eq!(out.blocks[0].inline_answer, Some('B'), "{text}");
        }
        let out = run(&["1. Q", "A. a", "B. b", "Answer: B. The mean is 4"]);
        assert_eq!(out.blocks[0].trailing_lines[0].text, "The mean is 4");
    }

    #[test]
    fn explanation_marker_sets_no_answer() {
        let out = run(&["1. Q", "A. a", "Explanation: A is right"]);
        let b = &out.blocks[0];
        assert_eq!(b.inline_answer, None);
        assert_eq!(b.trailing_lines[0].text, "A is right");
    }

    #[test]
    fn page_footers_are_skipped() {
        let out = run(&["1. Q", "A. a", "Page 1 of 40", "B. b"]);
        assert_eq!(out.footer_lines, 1);
        assert_eq!(option_text(&out.blocks[0], 'A'), "a");

        let config = ParseConfig::builder().skip_page_footers(false).build().unwrap();
        let out = run_with(&["1. Q", "A. a", "Page 1 of 40", "B. b"], &config);
        assert_eq!(option_text(&out.blocks[0], 'A'), "a Page 1 of 40");
    }

    #[test]
    fn no_questions_found() {
        let out = run(&["Just a cover page", "nothing numbered"]);
        assert!(out.blocks.is_empty());
        assert_eq!(out.diagnostics, vec![Diagnostic::NoQuestionsFound]);
    }

    #[test]
    fn question_start_closes_block_in_any_state() {
        let out = run(&["1. Q", "Answer: A", "2. R", "3. S"]);
        let numbers: Vec<u32> = out.blocks.iter().map(|b| b.question_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(out.blocks[0].inline_answer, Some('A'));
    }

    #[test]
    fn numbers_strictly_increase_across_output() {
        let texts = [
            "5. a", "A. x", "3. b", "7. c", "A. y", "7. d", "8. e", "1. f", "A. z",
        ];
        let out = run(&texts);
        let numbers: Vec<u32> = out.blocks.iter().map(|b| b.question_number).collect();
        assert!(numbers.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(numbers, vec![5, 7, 8]);
    }

    #[test]
    fn stored_lines_keep_geometry() {
        let out = run(&["1. What is 2+2?", "A. 3"]);
        let stem = &out.blocks[0].stem_lines[0];
        assert_eq!(stem.text, "What is 2+2?");
        assert_eq!(stem.y, 700.0);
        assert_eq!(stem.fragments[0].text, "1. What is 2+2?");
    }

    #[test]
    fn table_rows_are_never_markers() {
        let out = run(&[
            "1. Given the distribution",
            "| 2. | Answer: A |",
            "| A. | 0.4 |",
            "A. 0.2",
            "| B) | 0.6 |",
            "B. 0.5",
        ]);
        assert_eq!(out.blocks.len(), 1);
        let b = &out.blocks[0];
        assert_eq!(
            stem_text(b),
            "Given the distribution | 2. | Answer: A | | A. | 0.4 |"
        );
        assert_eq!(option_text(b, 'A'), "0.2 | B) | 0.6 |");
        assert_eq!(option_text(b, 'B'), "0.5");
        assert_eq!(b.inline_answer, None);
        assert_eq!(out.out_of_order_letters, 0);
    }

    #[test]
    fn table_row_before_first_question_is_preamble() {
        let out = run(&["| Exam | P |", "1. Q", "A. x"]);
        assert_eq!(out.preamble_lines, 1);
        assert_eq!(stem_text(&out.blocks[0]), "Q");
    }

    #[test]
    fn marker_detection_for_cells() {
        assert!(starts_with_marker("(B) 4", 'E'));
        assert!(starts_with_marker("12. Find", 'E'));
        assert!(starts_with_marker("Answer: C", 'E'));
        assert!(!starts_with_marker("F. 6", 'E'));
        assert!(!starts_with_marker("Age", 'E'));
        assert!(!starts_with_marker("0.25", 'E'));
    }

    #[test]
    fn zero_deadline_aborts() {
        let d = Deadline::new(Some(std::time::Duration::ZERO));
        let err = segment(&lines(&["1. Q"]), &ParseConfig::default(), &d).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Segment));
    }
}
