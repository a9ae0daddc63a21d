//! Time and page budgets for a single parse.
//!
//! A pathological PDF (tens of thousands of one-glyph runs) makes clustering
//! superlinear. Extraction runs on blocking threads that cannot be cancelled
//! from outside, so every stage checks a shared [`Deadline`] from inside its
//! loops and bails out with [`Pdf2QuizError::ParseTimeout`] instead.

use crate::error::{Budget, Pdf2QuizError, Stage};
use std::time::{Duration, Instant};

/// How many loop iterations a stage runs between deadline checks.
pub(crate) const CHECK_INTERVAL: usize = 256;

/// A wall-clock deadline, or none.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    /// A deadline `limit` from now, or an unbounded one when `None`.
    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    /// A deadline that never expires.
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn is_expired(&self) -> bool {
        self.limit
            .is_some_and(|limit| self.started.elapsed() >= limit)
    }

    /// Fail with `ParseTimeout` attributed to `stage` once the deadline passed.
    pub fn check(&self, stage: Stage) -> Result<(), Pdf2QuizError> {
        match self.limit {
            Some(limit) if self.started.elapsed() >= limit => Err(Pdf2QuizError::ParseTimeout {
                stage,
                budget: Budget::Time {
                    limit_ms: limit.as_millis() as u64,
                },
            }),
            _ => Ok(()),
        }
    }

    /// Like [`Deadline::check`], but only on every `CHECK_INTERVAL`-th iteration.
    pub(crate) fn check_every(&self, iteration: usize, stage: Stage) -> Result<(), Pdf2QuizError> {
        if iteration % CHECK_INTERVAL == 0 {
            self.check(stage)
        } else {
            Ok(())
        }
    }
}

/// Enforce the page-count budget on a freshly loaded document.
pub fn check_page_budget(limit: Option<usize>, actual: usize) -> Result<(), Pdf2QuizError> {
    match limit {
        Some(limit) if actual > limit => Err(Pdf2QuizError::ParseTimeout {
            stage: Stage::Extract,
            budget: Budget::Pages { limit, actual },
        }),
        _ => Ok(()),
    }
}
