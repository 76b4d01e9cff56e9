use std::fmt;

use runner_core::model::{Question, RankingEntry, SessionStatus, Texts, Watermark};

use crate::error::RunnerError;

use super::finalize::FinalizeStatus;
use super::state::RunnerState;

/// Player-facing status line.
///
/// Presentation decides how to render it; `Display` gives the default wording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Loading,
    ConfigFallback,
    InvalidSession,
    SessionNotActive { status: SessionStatus },
    FetchFailed { code: Option<String> },
    Submitting,
    SubmissionFailed { code: Option<String> },
    Correct { score: u32 },
    Incorrect { score: u32 },
    TimeUp,
    Finished { score: u32 },
    OutOfLives { score: u32 },
    Won,
    Lost { word: String },
    FinalizeFailed,
}

impl StatusMessage {
    /// Status line for a runner error, when there is one worth showing.
    #[must_use]
    pub fn for_error(err: &RunnerError) -> Option<Self> {
        let code = err.code().map(str::to_owned);
        match err {
            RunnerError::Readiness(_) | RunnerError::InvalidSession { .. } => {
                Some(StatusMessage::InvalidSession)
            }
            RunnerError::SessionNotActive { status } => Some(StatusMessage::SessionNotActive {
                status: status.clone(),
            }),
            RunnerError::TransientFetch { .. } => Some(StatusMessage::FetchFailed { code }),
            RunnerError::SubmissionRejected { .. } => {
                Some(StatusMessage::SubmissionFailed { code })
            }
            RunnerError::FinalizeFailure { .. } => Some(StatusMessage::FinalizeFailed),
            RunnerError::TimeUp => Some(StatusMessage::TimeUp),
            _ => None,
        }
    }
}

fn or_unknown(code: Option<&String>) -> &str {
    code.map_or("unknown", String::as_str)
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusMessage::Loading => f.write_str("Loading..."),
            StatusMessage::ConfigFallback => {
                f.write_str("Customization unavailable, playing with default settings.")
            }
            StatusMessage::InvalidSession => {
                f.write_str("Invalid session. Start again from the catalog.")
            }
            StatusMessage::SessionNotActive { status } => write!(
                f,
                "This session is no longer active ({status}). Start a new game from the catalog."
            ),
            StatusMessage::FetchFailed { code } => {
                write!(f, "Error: {}", or_unknown(code.as_ref()))
            }
            StatusMessage::Submitting => f.write_str("Checking..."),
            StatusMessage::SubmissionFailed { code } => {
                write!(f, "Answer error: {}. Try again.", or_unknown(code.as_ref()))
            }
            StatusMessage::Correct { score } => write!(f, "Correct (score {score})"),
            StatusMessage::Incorrect { score } => write!(f, "Incorrect (score {score})"),
            StatusMessage::TimeUp => f.write_str("Time is up. Press next to continue."),
            StatusMessage::Finished { score } => write!(f, "Finished · Score {score}"),
            StatusMessage::OutOfLives { score } => write!(f, "Out of lives · Score {score}"),
            StatusMessage::Won => f.write_str("You won!"),
            StatusMessage::Lost { word } => write!(f, "You lost. The word was {word}."),
            StatusMessage::FinalizeFailed => {
                f.write_str("Your result could not be saved, but the game is over.")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerView {
    pub remaining: u32,
    pub expired: bool,
}

/// Everything a trivia screen needs, with no formatting applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TriviaView {
    pub state: RunnerState,
    pub question: Option<Question>,
    pub choices_enabled: bool,
    pub next_enabled: bool,
    /// Every question is answered; the next request returns the final result.
    pub results_ready: bool,
    pub timer: Option<TimerView>,
    pub score: u32,
    pub answered: u32,
    pub correct: u32,
    pub max_questions: u32,
    pub lives_remaining: Option<u32>,
    pub last_answer_correct: Option<bool>,
    pub status: Option<StatusMessage>,
    pub finalize: Option<FinalizeStatus>,
    pub texts: Texts,
    pub watermark: Option<Watermark>,
    /// Company leaderboard, once loaded after the run.
    pub ranking: Option<Vec<RankingEntry>>,
}

/// Everything a hangman screen needs, with no formatting applied.
#[derive(Debug, Clone, PartialEq)]
pub struct HangmanView {
    pub state: RunnerState,
    /// Secret with unguessed letters as `_`, characters separated by spaces.
    pub masked: String,
    pub hint: Option<String>,
    pub wrong_letters: Vec<char>,
    pub mistakes: u32,
    pub max_mistakes: u32,
    pub input_enabled: bool,
    pub restart_allowed: bool,
    pub status: Option<StatusMessage>,
    pub finalize: Option<FinalizeStatus>,
    pub texts: Texts,
    pub watermark: Option<Watermark>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wording() {
        assert_eq!(
            StatusMessage::Correct { score: 300 }.to_string(),
            "Correct (score 300)"
        );
        assert_eq!(
            StatusMessage::FetchFailed { code: None }.to_string(),
            "Error: unknown"
        );
        assert_eq!(
            StatusMessage::SessionNotActive {
                status: SessionStatus::Finished
            }
            .to_string(),
            "This session is no longer active (finished). Start a new game from the catalog."
        );
    }
}
