use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::finalize::Outcome;
use crate::model::ids::{ChoiceId, QuestionId};
use crate::model::progress::ProgressSnapshot;

/// One answer option, in the order the server returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: ChoiceId,
    pub text: String,
}

/// A trivia question as shown to the player. Never carries the correct answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub choices: Vec<Choice>,
}

impl Question {
    #[must_use]
    pub fn has_choice(&self, id: ChoiceId) -> bool {
        self.choices.iter().any(|choice| choice.id == id)
    }
}

/// Server-computed trivia totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriviaResult {
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub answered: u32,
    #[serde(default)]
    pub correct: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl TriviaResult {
    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            answered: Some(self.answered),
            score: Some(self.score),
            correct: Some(self.correct),
            mistakes: None,
        }
    }
}

/// Entries a ranking holds at most.
pub const RANKING_SIZE: usize = 10;

/// One finished trivia session on the company leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub username: String,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub answered: u32,
    #[serde(default)]
    pub correct: u32,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

/// What the question supplier hands back when asked for the next question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextQuestion {
    Question(Question),
    /// The server closed the session; scoring is already final.
    Finished(TriviaResult),
}

/// Authoritative response to an answer submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerReceipt {
    pub correct: bool,
    pub score: Option<u32>,
    pub answered: Option<u32>,
    pub correct_count: Option<u32>,
    /// Set when the server considers the round terminal.
    pub done: bool,
}

impl AnswerReceipt {
    /// Only the fields the server actually provided.
    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            answered: self.answered,
            score: self.score,
            correct: self.correct_count,
            mistakes: None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WordError {
    #[error("hangman word is empty")]
    Empty,
}

/// Sticky hangman word for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HangmanWord {
    word: String,
    hint: String,
}

impl HangmanWord {
    /// Normalise the word to uppercase and trim both fields.
    ///
    /// # Errors
    ///
    /// Returns `WordError::Empty` when the word is blank.
    pub fn new(word: impl AsRef<str>, hint: impl AsRef<str>) -> Result<Self, WordError> {
        let word = word.as_ref().trim().to_uppercase();
        if word.is_empty() {
            return Err(WordError::Empty);
        }
        Ok(Self {
            word,
            hint: hint.as_ref().trim().to_owned(),
        })
    }

    #[must_use]
    pub fn word(&self) -> &str {
        &self.word
    }

    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        Some(self.hint.as_str()).filter(|hint| !hint.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_decodes_from_server_shape() {
        let q: Question = serde_json::from_str(
            r#"{"id": 4, "text": "Capital?", "choices": [{"id": 10, "text": "A"}, {"id": 11, "text": "B"}]}"#,
        )
        .unwrap();
        assert_eq!(q.id, QuestionId::new(4));
        assert!(q.has_choice(ChoiceId::new(11)));
        assert!(!q.has_choice(ChoiceId::new(12)));
    }

    #[test]
    fn trivia_result_tolerates_missing_fields() {
        let result: TriviaResult = serde_json::from_str(r#"{"score": 300}"#).unwrap();
        assert_eq!(result.score, 300);
        assert_eq!(result.answered, 0);
        assert!(result.outcome.is_none());
    }

    #[test]
    fn ranking_entry_accepts_null_end_time() {
        let entry: RankingEntry = serde_json::from_str(
            r#"{"username": "ana", "score": 300, "answered": 4, "correct": 3, "ended_at": null}"#,
        )
        .unwrap();
        assert_eq!(entry.username, "ana");
        assert_eq!(entry.score, 300);
        assert!(entry.ended_at.is_none());
    }

    #[test]
    fn receipt_progress_only_carries_provided_fields() {
        let receipt = AnswerReceipt {
            correct: true,
            score: Some(200),
            answered: None,
            correct_count: Some(2),
            done: false,
        };
        let snapshot = receipt.progress();
        assert_eq!(snapshot.score, Some(200));
        assert_eq!(snapshot.answered, None);
        assert_eq!(snapshot.correct, Some(2));
    }

    #[test]
    fn hangman_word_is_uppercased() {
        let word = HangmanWord::new(" casa ", "").unwrap();
        assert_eq!(word.word(), "CASA");
        assert_eq!(word.hint(), None);
        assert_eq!(HangmanWord::new("  ", "x"), Err(WordError::Empty));
    }

    #[test]
    fn hangman_word_keeps_enye() {
        let word = HangmanWord::new("niño", "pista").unwrap();
        assert_eq!(word.word(), "NIÑO");
        assert_eq!(word.hint(), Some("pista"));
    }
}
