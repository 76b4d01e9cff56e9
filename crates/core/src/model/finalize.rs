use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::hangman::HangmanBoard;
use crate::model::ids::SessionId;
use crate::model::question::TriviaResult;

/// How a round ended from the player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
    Completed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Win => "win",
            Outcome::Lose => "lose",
            Outcome::Completed => "completed",
        })
    }
}

/// Terminal result persisted by the finalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FinalResult {
    Hangman {
        outcome: Outcome,
        word: String,
        moves: u32,
        mistakes: u32,
    },
    Trivia(TriviaResult),
}

impl FinalResult {
    #[must_use]
    pub fn hangman(outcome: Outcome, board: &HangmanBoard) -> Self {
        FinalResult::Hangman {
            outcome,
            word: board.secret(),
            moves: board.moves(),
            mistakes: board.mistakes(),
        }
    }

    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            FinalResult::Hangman { outcome, .. } => Some(*outcome),
            FinalResult::Trivia(result) => result.outcome,
        }
    }
}

/// Client-observed state sent along with the result (`estado_cliente`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientState {
    pub finished: bool,
    pub outcome: Outcome,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizeRequest {
    pub result: FinalResult,
    pub client_state: ClientState,
}

impl FinalizeRequest {
    #[must_use]
    pub fn new(result: FinalResult, outcome: Outcome, finished_at: DateTime<Utc>) -> Self {
        Self {
            result,
            client_state: ClientState {
                finished: true,
                outcome,
                finished_at,
            },
        }
    }
}

//
// ─── RUN SUMMARY ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RunSummaryError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,
}

/// Aggregate of one finished run, as observed by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    session_id: SessionId,
    outcome: Option<Outcome>,
    score: u32,
    answered: u32,
    correct: u32,
    mistakes: u32,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    finalized: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub score: u32,
    pub answered: u32,
    pub correct: u32,
    pub mistakes: u32,
}

impl RunSummary {
    /// # Errors
    ///
    /// Returns `RunSummaryError::InvalidTimeRange` if `completed_at` is before `started_at`.
    pub fn new(
        session_id: SessionId,
        outcome: Option<Outcome>,
        totals: RunTotals,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        finalized: bool,
    ) -> Result<Self, RunSummaryError> {
        if completed_at < started_at {
            return Err(RunSummaryError::InvalidTimeRange);
        }
        Ok(Self {
            session_id,
            outcome,
            score: totals.score,
            answered: totals.answered,
            correct: totals.correct,
            mistakes: totals.mistakes,
            started_at,
            completed_at,
            finalized,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn answered(&self) -> u32 {
        self.answered
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn mistakes(&self) -> u32 {
        self.mistakes
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Whether the finalizer acknowledged the result. Server-closed trivia runs count as finalized.
    #[must_use]
    pub fn finalized(&self) -> bool {
        self.finalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::hangman::Letter;
    use crate::model::question::HangmanWord;
    use crate::time::fixed_now;
    use serde_json::json;

    #[test]
    fn hangman_payload_matches_wire_shape() {
        let mut board = HangmanBoard::new(&HangmanWord::new("SOL", "").unwrap());
        for l in ["S", "X", "O", "L"] {
            board.guess(Letter::parse(l).unwrap());
        }
        let request = FinalizeRequest::new(
            FinalResult::hangman(Outcome::Win, &board),
            Outcome::Win,
            fixed_now(),
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value["result"],
            json!({ "outcome": "win", "word": "SOL", "moves": 4, "mistakes": 1 })
        );
        assert_eq!(value["client_state"]["finished"], json!(true));
        assert_eq!(value["client_state"]["outcome"], json!("win"));
    }

    #[test]
    fn trivia_payload_is_flat() {
        let result = FinalResult::Trivia(TriviaResult {
            score: 300,
            answered: 5,
            correct: 3,
            outcome: Some(Outcome::Lose),
        });
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({ "score": 300, "answered": 5, "correct": 3, "outcome": "lose" })
        );
        assert_eq!(result.outcome(), Some(Outcome::Lose));
    }

    #[test]
    fn summary_rejects_inverted_time_range() {
        let now = fixed_now();
        let err = RunSummary::new(
            SessionId::random(),
            None,
            RunTotals::default(),
            now,
            now - chrono::Duration::seconds(1),
            false,
        )
        .unwrap_err();
        assert_eq!(err, RunSummaryError::InvalidTimeRange);
    }
}
