//! crates/muneccim_core/src/assessment.rs
//!
//! The five-question skill assessment shown on a user's first visit.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{AssessmentResult, SkillLevel};

pub const QUESTION_COUNT: usize = 5;

/// Highest option index; each answer says "how advanced" the chosen option was.
pub const MAX_OPTION: u8 = 4;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AssessmentError {
    #[error("Option {0} is out of range (0..=4)")]
    OptionOutOfRange(u8),
    #[error("The assessment has already been completed")]
    AlreadyCompleted,
}

/// Maps five answers to a skill level by their mean:
/// below 1 is beginner, below 2.5 is intermediate, anything else is advanced.
pub fn classify(answers: &[u8; QUESTION_COUNT]) -> SkillLevel {
    // Compared on the sum to stay exact: mean < 1 <=> sum < 5, mean < 2.5 <=> 2*sum < 25.
    let sum: u32 = answers.iter().map(|&a| u32::from(a)).sum();
    let count = QUESTION_COUNT as u32;
    if sum < count {
        SkillLevel::Beginner
    } else if sum * 2 < count * 5 {
        SkillLevel::Intermediate
    } else {
        SkillLevel::Advanced
    }
}

/// What happened after an option was selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssessmentStep {
    /// The flow moved on to the question at this index.
    Next(usize),
    Complete(AssessmentResult),
}

/// Quiz progress: the current question and the answers given so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssessmentFlow {
    current: usize,
    answers: [Option<u8>; QUESTION_COUNT],
    completed: bool,
}

impl AssessmentFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_question(&self) -> usize {
        self.current
    }

    pub fn answers(&self) -> &[Option<u8>; QUESTION_COUNT] {
        &self.answers
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Records `option` for the current question and either advances or completes.
    ///
    /// Completing does not move the index, so selecting again on the last question
    /// recomputes the result (used when saving the result failed).
    pub fn select(&mut self, user_id: Uuid, option: u8) -> Result<AssessmentStep, AssessmentError> {
        if self.completed {
            return Err(AssessmentError::AlreadyCompleted);
        }
        if option > MAX_OPTION {
            return Err(AssessmentError::OptionOutOfRange(option));
        }
        self.answers[self.current] = Some(option);

        if self.current + 1 < QUESTION_COUNT {
            self.current += 1;
            return Ok(AssessmentStep::Next(self.current));
        }

        let mut answers = [0u8; QUESTION_COUNT];
        for (slot, answer) in answers.iter_mut().zip(self.answers.iter()) {
            *slot = answer.unwrap_or_default();
        }
        Ok(AssessmentStep::Complete(AssessmentResult::new(user_id, answers)))
    }

    /// Marks the flow finished once its result has been persisted.
    pub fn mark_completed(&mut self) {
        self.completed = true;
    }
}
