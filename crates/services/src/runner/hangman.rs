use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, info, warn};

use gateway::Gateway;
use runner_core::model::{
    EffectiveConfig, FinalResult, FinalizeRequest, GuessResult, HangmanBoard, Letter, LetterError,
    Outcome, RunSummary, RunTotals, SessionCredentials, MAX_MISTAKES,
};
use runner_core::Clock;

use crate::error::RunnerError;

use super::bootstrap::{resolve_config, validate_session};
use super::finalize::{finalize_once, FinalizeGuard, FinalizeStatus};
use super::state::RunnerState;
use super::view::{HangmanView, StatusMessage};

/// What a single letter attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessOutcome {
    /// The board changed and must be redrawn.
    Applied(GuessResult),
    /// Malformed input; nothing changed.
    Invalid(LetterError),
    /// Letter was already tried; nothing changed.
    Repeated(Letter),
}

/// Hangman state machine for one session.
///
/// The word is fetched once; guesses are resolved locally and only the terminal
/// result goes back to the server.
pub struct HangmanRunner {
    credentials: SessionCredentials,
    gateway: Gateway,
    clock: Clock,
    state: RunnerState,
    config: EffectiveConfig,
    board: Option<HangmanBoard>,
    guard: FinalizeGuard,
    finalize_status: Option<FinalizeStatus>,
    outcome: Option<Outcome>,
    status: Option<StatusMessage>,
    renders: u64,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl HangmanRunner {
    #[must_use]
    pub fn new(credentials: SessionCredentials, gateway: Gateway, clock: Clock) -> Self {
        Self {
            credentials,
            gateway,
            clock,
            state: RunnerState::LoadingSession,
            config: EffectiveConfig::defaults(),
            board: None,
            guard: FinalizeGuard::new(),
            finalize_status: None,
            outcome: None,
            status: None,
            renders: 0,
            started_at: clock.now(),
            completed_at: None,
        }
    }

    /// Validate the session, resolve its config and fetch the sticky word.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::InvalidSession`, `RunnerError::SessionNotActive`, or
    /// `RunnerError::TransientFetch` when no word can be assigned. The runner is
    /// then in `ErrorTerminal` and offers a restart.
    pub async fn load(&mut self) -> Result<(), RunnerError> {
        if self.state != RunnerState::LoadingSession {
            return Err(RunnerError::InvalidTransition {
                action: "load",
                state: self.state,
            });
        }

        self.state = RunnerState::Validating;
        self.status = Some(StatusMessage::Loading);
        if let Err(err) = validate_session(&self.gateway, &self.credentials).await {
            self.fail(&err);
            return Err(err);
        }

        self.state = RunnerState::LoadingConfig;
        match resolve_config(&self.gateway, &self.credentials).await {
            Ok(config) => {
                self.config = config;
                self.status = None;
            }
            Err(err) => {
                warn!(error = %err, "customization unavailable, using defaults");
                self.config = EffectiveConfig::defaults();
                self.status = Some(StatusMessage::ConfigFallback);
            }
        }

        self.state = RunnerState::AwaitingQuestion;
        let word = match self.gateway.words.sticky_word(&self.credentials).await {
            Ok(word) => word,
            Err(source) => {
                let err = RunnerError::TransientFetch {
                    what: "word",
                    source,
                };
                warn!(error = %err, "no word for session");
                self.fail(&err);
                return Err(err);
            }
        };

        self.board = Some(HangmanBoard::new(&word));
        self.state = RunnerState::QuestionActive;
        self.renders += 1;
        info!(
            session_id = %self.credentials.session_id(),
            letters = word.word().chars().count(),
            "hangman session ready"
        );
        Ok(())
    }

    /// Try one letter. Invalid or repeated input is rejected silently: no state
    /// change and no redraw.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::InvalidTransition` unless the round is in play.
    pub fn guess(&mut self, input: &str) -> Result<GuessOutcome, RunnerError> {
        let state = self.state;
        let board = match (&mut self.board, state.accepts_input()) {
            (Some(board), true) => board,
            _ => {
                return Err(RunnerError::InvalidTransition {
                    action: "guess",
                    state,
                });
            }
        };

        let letter = match Letter::parse(input) {
            Ok(letter) => letter,
            Err(err) => {
                debug!(error = %err, "ignoring invalid letter");
                return Ok(GuessOutcome::Invalid(err));
            }
        };

        match board.guess(letter) {
            GuessResult::Repeated => {
                debug!(%letter, "ignoring repeated letter");
                Ok(GuessOutcome::Repeated(letter))
            }
            result => {
                self.renders += 1;
                Ok(GuessOutcome::Applied(result))
            }
        }
    }

    /// Check both end conditions and finalize on the first one that holds.
    ///
    /// Win and loss are checked unconditionally; the finalize guard makes sure only
    /// one of them (and only one call overall) reaches the server.
    pub async fn check_terminal(&mut self) -> Option<Outcome> {
        let (won, lost) = match &self.board {
            Some(board) => (board.is_won(), board.is_lost()),
            None => return None,
        };
        if won {
            self.conclude(Outcome::Win).await;
        }
        if lost {
            self.conclude(Outcome::Lose).await;
        }
        self.outcome
    }

    /// [`HangmanRunner::guess`] followed by [`HangmanRunner::check_terminal`]
    /// when the board changed.
    ///
    /// # Errors
    ///
    /// Same as [`HangmanRunner::guess`].
    pub async fn play(&mut self, input: &str) -> Result<GuessOutcome, RunnerError> {
        let outcome = self.guess(input)?;
        if matches!(outcome, GuessOutcome::Applied(_)) {
            self.check_terminal().await;
        }
        Ok(outcome)
    }

    async fn conclude(&mut self, outcome: Outcome) {
        if self.guard.is_claimed() {
            debug!(%outcome, "round already concluded");
            return;
        }
        let Some(board) = &self.board else {
            return;
        };

        let finished_at = self.clock.stamp_once(&mut self.completed_at);
        let request = FinalizeRequest::new(
            FinalResult::hangman(outcome, board),
            outcome,
            finished_at,
        );
        self.status = Some(match outcome {
            Outcome::Lose => StatusMessage::Lost {
                word: board.secret(),
            },
            _ => StatusMessage::Won,
        });
        self.outcome = Some(outcome);
        self.renders += 1;
        self.state = RunnerState::Finalizing;
        let status =
            finalize_once(&self.guard, &self.gateway, &self.credentials, &request).await;
        if status.is_some() {
            self.finalize_status.clone_from(&status);
        }
        self.state = RunnerState::Done;
    }

    fn fail(&mut self, err: &RunnerError) {
        self.status = StatusMessage::for_error(err);
        self.clock.stamp_once(&mut self.completed_at);
        self.state = RunnerState::ErrorTerminal;
    }

    // ─── READ MODELS ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn state(&self) -> RunnerState {
        self.state
    }

    #[must_use]
    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    #[must_use]
    pub fn board(&self) -> Option<&HangmanBoard> {
        self.board.as_ref()
    }

    #[must_use]
    pub fn finalize_status(&self) -> Option<&FinalizeStatus> {
        self.finalize_status.as_ref()
    }

    /// Number of times the board changed in a way that needs a redraw.
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    /// A new session can be started from the catalog once this one is over.
    #[must_use]
    pub fn restart_allowed(&self) -> bool {
        self.state.is_terminal()
    }

    #[must_use]
    pub fn view(&self) -> HangmanView {
        let board = self.board.as_ref();
        HangmanView {
            state: self.state,
            masked: board.map(HangmanBoard::masked).unwrap_or_default(),
            hint: board.and_then(HangmanBoard::hint).map(str::to_owned),
            wrong_letters: board
                .map(|b| b.wrong_letters().to_vec())
                .unwrap_or_default(),
            mistakes: board.map_or(0, HangmanBoard::mistakes),
            max_mistakes: MAX_MISTAKES,
            input_enabled: self.state.accepts_input(),
            restart_allowed: self.restart_allowed(),
            status: self.status.clone(),
            finalize: self.finalize_status.clone(),
            texts: self.config.texts.clone(),
            watermark: self
                .config
                .show_watermark()
                .then(|| self.config.watermark.clone()),
        }
    }

    /// # Errors
    ///
    /// Returns `RunnerError::InvalidTransition` before the round is `Done`.
    pub fn summary(&self) -> Result<RunSummary, RunnerError> {
        let (Some(board), Some(completed_at), RunnerState::Done) =
            (&self.board, self.completed_at, self.state)
        else {
            return Err(RunnerError::InvalidTransition {
                action: "summarize",
                state: self.state,
            });
        };
        let correct = u32::try_from(board.guessed_letters().len()).unwrap_or(u32::MAX);
        Ok(RunSummary::new(
            self.credentials.session_id(),
            self.outcome,
            RunTotals {
                score: 0,
                answered: board.moves(),
                correct,
                mistakes: board.mistakes(),
            },
            self.started_at,
            completed_at,
            self.finalize_status
                .as_ref()
                .is_some_and(FinalizeStatus::is_acknowledged),
        )?)
    }
}

impl fmt::Debug for HangmanRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HangmanRunner")
            .field("session_id", &self.credentials.session_id())
            .field("state", &self.state)
            .field("mistakes", &self.board.as_ref().map(HangmanBoard::mistakes))
            .field("finalize_status", &self.finalize_status)
            .finish_non_exhaustive()
    }
}
