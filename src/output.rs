//! Output types: the records handed to the persistence collaborator.

use crate::error::Diagnostic;
use serde::{Deserialize, Serialize};

/// One answer choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub key: char,
    pub text: String,
}

/// Where a question's correct option came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnswerSource {
    /// Looked up in the answer-key document.
    AnswerKey,
    /// Read from an `Answer: X` line in the question document itself.
    Inline,
    /// Filled in by [`crate::config::MissingAnswerPolicy::DefaultTo`]. Unverified.
    Default,
}

/// A fully built exam question.
///
/// Invariants, checked by the builder before a question is emitted:
/// `options` is non-empty, keys run `A`, `B`, … without gaps, and
/// `correct_option` (when set) names one of those keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// The question's number in the source document.
    pub id: u32,
    pub content: String,
    pub options: Vec<QuestionOption>,
    pub correct_option: Option<char>,
    pub answer_source: Option<AnswerSource>,
    pub explanation: Option<String>,
}

impl Question {
    /// Index of the correct option in `options`.
    pub fn correct_index(&self) -> Option<usize> {
        let key = self.correct_option?;
        self.options.iter().position(|o| o.key == key)
    }

    /// Whether the stored answer was verified by a document rather than
    /// filled in by policy.
    pub fn has_verified_answer(&self) -> bool {
        matches!(
            self.answer_source,
            Some(AnswerSource::AnswerKey) | Some(AnswerSource::Inline)
        )
    }
}

/// Metadata read from the PDF trailer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
    pub is_encrypted: bool,
}

/// Counters and timings for one parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    /// Pages in the question document.
    pub total_pages: usize,
    /// Pages actually parsed (after page selection).
    pub processed_pages: usize,
    pub fragment_count: usize,
    pub line_count: usize,
    /// Question blocks the segmenter produced.
    pub block_count: usize,
    pub question_count: usize,
    pub skipped_questions: usize,
    /// Option markers folded into body text because they were out of sequence.
    pub out_of_order_letters: usize,
    /// Entries parsed from the answer-key document (0 when absent).
    pub answer_key_entries: usize,
    pub total_duration_ms: u64,
    pub extract_duration_ms: u64,
}

/// The result of a parse: questions plus everything a reviewer should see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutput {
    pub questions: Vec<Question>,
    pub diagnostics: Vec<Diagnostic>,
    pub metadata: Option<DocumentMetadata>,
    pub stats: ParseStats,
}

impl ParseOutput {
    /// Diagnostics that need a human decision (everything but informational).
    pub fn actionable_diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_informational())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Question {
        Question {
            id: 4,
            content: "What is 2+2?".into(),
            options: vec![
                QuestionOption {
                    key: 'A',
                    text: "3".into(),
                },
                QuestionOption {
                    key: 'B',
                    text: "4".into(),
                },
            ],
            correct_option: Some('B'),
            answer_source: Some(AnswerSource::AnswerKey),
            explanation: None,
        }
    }

    #[test]
    fn correct_index_resolves_key() {
        assert_eq!(sample().correct_index(), Some(1));
        let mut q = sample();
        q.correct_option = None;
        assert_eq!(q.correct_index(), None);
    }

    #[test]
    fn defaulted_answer_is_not_verified() {
        let mut q = sample();
        assert!(q.has_verified_answer());
        q.answer_source = Some(AnswerSource::Default);
        assert!(!q.has_verified_answer());
    }

    #[test]
    fn serialises_in_collaborator_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["id"], 4);
        assert_eq!(json["correctOption"], "B");
        assert_eq!(json["answerSource"], "answerKey");
        assert_eq!(json["options"][1]["key"], "B");
        assert!(json["explanation"].is_null());
    }
}
