//! Answer-key parsing and the lookup merge with segmented questions.
//!
//! Answer keys come in a few layouts: one entry per line (`1 B`, `1. B`,
//! `1) (B)`), solution books that spell it out (`1. Solution: D` followed by
//! a worked explanation) and compact tables (`1 B  2 C  3 A`). All of them
//! reduce to a map from question number to letter. The merge is a pure
//! lookup by number; nothing is inferred from position.

use crate::budget::Deadline;
use crate::config::ParseConfig;
use crate::error::{Diagnostic, Pdf2QuizError, Stage};
use crate::pipeline::lines::Line;
use crate::pipeline::segment::{is_page_footer, QuestionBlock};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

static RE_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<prefix>(?i:question)\s+)?(?P<number>\d+)\s*[.):]?\s*(?P<label>(?i:solution|answer|key)\s*[:.\-]?\s*)?\(?(?P<letter>[A-Z])\)?(?:[\s.,;:)]|$)(?P<rest>.*)$",
    )
    .unwrap()
});

/// A line made of nothing but two or more `number letter` pairs.
static RE_TABLE_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d+\s*[.):]?\s*\(?[A-Z]\)?\s+)+\d+\s*[.):]?\s*\(?[A-Z]\)?$").unwrap());

static RE_TABLE_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*[.):]?\s*\(?([A-Z])\)?").unwrap());

/// One parsed answer-key entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerKeyEntry {
    pub question_number: u32,
    pub correct_letter: char,
    pub explanation: Option<String>,
}

/// Question number → entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerKey {
    entries: BTreeMap<u32, AnswerKeyEntry>,
}

impl AnswerKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning the one it replaced.
    pub fn insert(&mut self, entry: AnswerKeyEntry) -> Option<AnswerKeyEntry> {
        self.entries.insert(entry.question_number, entry)
    }

    pub fn get(&self, question_number: u32) -> Option<&AnswerKeyEntry> {
        self.entries.get(&question_number)
    }

    pub fn letter(&self, question_number: u32) -> Option<char> {
        self.get(question_number).map(|e| e.correct_letter)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending question number.
    pub fn iter(&self) -> impl Iterator<Item = &AnswerKeyEntry> {
        self.entries.values()
    }
}

impl FromIterator<AnswerKeyEntry> for AnswerKey {
    fn from_iter<T: IntoIterator<Item = AnswerKeyEntry>>(iter: T) -> Self {
        let mut key = AnswerKey::new();
        for entry in iter {
            key.insert(entry);
        }
        key
    }
}

/// Parse the reconstructed lines of an answer-key document.
pub fn parse_answer_key(
    lines: &[Line],
    config: &ParseConfig,
    deadline: &Deadline,
) -> Result<(AnswerKey, Vec<Diagnostic>), Pdf2QuizError> {
    let mut parser = KeyParser {
        config,
        key: AnswerKey::new(),
        diagnostics: Vec::new(),
        open: None,
    };
    for (i, line) in lines.iter().enumerate() {
        deadline.check_every(i, Stage::AnswerKey)?;
        parser.feed(line.text.trim());
    }
    parser.close_open();

    info!("Answer key: {} entries", parser.key.len());
    Ok((parser.key, parser.diagnostics))
}

struct KeyParser<'a> {
    config: &'a ParseConfig,
    key: AnswerKey,
    diagnostics: Vec<Diagnostic>,
    /// The entry whose explanation is still collecting lines.
    open: Option<OpenEntry>,
}

struct OpenEntry {
    entry: AnswerKeyEntry,
    explanation: Vec<String>,
    /// Opened by `Solution:`, `Answer:`, `Key:` or `Question N`.
    labelled: bool,
}

impl KeyParser<'_> {
    fn feed(&mut self, text: &str) {
        if text.is_empty() || (self.config.skip_page_footers && is_page_footer(text)) {
            return;
        }

        if RE_TABLE_ROW.is_match(text) {
            let pairs: Vec<(u32, char)> = RE_TABLE_PAIR
                .captures_iter(text)
                .filter_map(|caps| {
                    let number = caps[1].parse().ok()?;
                    let letter = caps[2].chars().next()?;
                    Some((number, letter))
                })
                .collect();
            if pairs.iter().all(|(_, l)| self.in_range(*l)) {
                self.close_open();
                for (question_number, correct_letter) in pairs {
                    self.record(AnswerKeyEntry {
                        question_number,
                        correct_letter,
                        explanation: None,
                    });
                }
                return;
            }
        }

        if let Some(caps) = RE_ENTRY.captures(text) {
            let labelled = caps.name("prefix").is_some() || caps.name("label").is_some();
            // A solution book's worked explanation can open with "2 A claims ...";
            // only another labelled entry ends a labelled one.
            let inside_labelled = self.open.as_ref().is_some_and(|o| o.labelled);
            let number = caps["number"].parse::<u32>().ok();
            let letter = caps["letter"].chars().next().filter(|l| self.in_range(*l));
            if let (Some(question_number), Some(correct_letter)) = (number, letter) {
                if labelled || !inside_labelled {
                    self.close_open();
                    let rest = caps.name("rest").map_or("", |m| m.as_str()).trim();
                    let mut explanation = Vec::new();
                    if !rest.is_empty() {
                        explanation.push(rest.to_string());
                    }
                    self.open = Some(OpenEntry {
                        entry: AnswerKeyEntry {
                            question_number,
                            correct_letter,
                            explanation: None,
                        },
                        explanation,
                        labelled,
                    });
                    return;
                }
            }
        }

        if let Some(open) = self.open.as_mut() {
            open.explanation.push(text.to_string());
        }
    }

    fn in_range(&self, letter: char) -> bool {
        ('A'..=self.config.max_option_letter).contains(&letter)
    }

    fn close_open(&mut self) {
        if let Some(OpenEntry {
            mut entry,
            explanation,
            ..
        }) = self.open.take()
        {
            if self.config.answer_key_explanations && !explanation.is_empty() {
                entry.explanation = Some(explanation.join(" "));
            }
            self.record(entry);
        }
    }

    fn record(&mut self, entry: AnswerKeyEntry) {
        let question_number = entry.question_number;
        let current = entry.correct_letter;
        if let Some(previous) = self.key.insert(entry) {
            warn!(
                "Answer key lists question {} twice ('{}' then '{}')",
                question_number, previous.correct_letter, current
            );
            self.diagnostics.push(Diagnostic::DuplicateAnswerKeyEntry {
                question_number,
                previous: previous.correct_letter,
                current,
            });
        }
    }
}

/// Join the answer key with the segmented blocks by question number.
///
/// Returns the key to look answers up in plus the join diagnostics. With no
/// key document the mapping is empty and a single `AnswerKeyAbsent` is
/// reported.
pub fn merge(blocks: &[QuestionBlock], key: Option<AnswerKey>) -> (AnswerKey, Vec<Diagnostic>) {
    let Some(key) = key else {
        return (AnswerKey::new(), vec![Diagnostic::AnswerKeyAbsent]);
    };
    if key.is_empty() {
        warn!("Answer key document contains no entries");
        return (key, vec![Diagnostic::EmptyAnswerKey]);
    }

    let numbers: BTreeSet<u32> = blocks.iter().map(|b| b.question_number).collect();
    let mut diagnostics = Vec::new();

    for entry in key.iter() {
        if !numbers.contains(&entry.question_number) {
            warn!(
                "Answer key entry {} matches no question",
                entry.question_number
            );
            diagnostics.push(Diagnostic::UnmatchedAnswerKeyEntry {
                question_number: entry.question_number,
                letter: entry.correct_letter,
            });
        }
    }
    for block in blocks {
        if key.get(block.question_number).is_none() {
            debug!("Question {} has no answer-key entry", block.question_number);
            diagnostics.push(Diagnostic::MissingAnswerKeyEntry {
                question_number: block.question_number,
            });
        }
    }

    (key, diagnostics)
}
