use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use gateway::{Gateway, GatewayError};
use runner_core::model::{
    AnswerReceipt, ChoiceId, EffectiveConfig, FinalResult, FinalizeRequest, NextQuestion, Outcome,
    Question, RankingEntry, RunSummary, RunTotals, RunnerProgress, SessionCredentials,
    TriviaResult,
};
use runner_core::Clock;

use crate::error::RunnerError;

use super::bootstrap::{resolve_config, validate_session};
use super::finalize::{finalize_once, FinalizeGuard, FinalizeStatus};
use super::state::{Applied, RunnerState, Ticket};
use super::timer::{Countdown, TimerEvent, TimerEvents};
use super::view::{StatusMessage, TimerView, TriviaView};

fn progress_for(config: &EffectiveConfig) -> RunnerProgress {
    let rules = config.rules;
    RunnerProgress::new(rules.max_questions, rules.use_lives.then_some(rules.lives))
}

//
// ─── RUNNER ────────────────────────────────────────────────────────────────────
//

/// Trivia state machine for one session.
///
/// Owns the resolved config, the cached progress and the current countdown. The
/// server is authoritative for scoring; local progress is overwritten by every
/// answer receipt.
pub struct TriviaRunner {
    credentials: SessionCredentials,
    gateway: Gateway,
    clock: Clock,
    state: RunnerState,
    config: EffectiveConfig,
    progress: RunnerProgress,
    question: Option<Question>,
    last_answer_correct: Option<bool>,
    generation: u64,
    countdown: Option<Countdown>,
    timer: Option<TimerView>,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    guard: FinalizeGuard,
    finalize_status: Option<FinalizeStatus>,
    server_closed: bool,
    outcome: Option<Outcome>,
    status: Option<StatusMessage>,
    ranking: Option<Vec<RankingEntry>>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TriviaRunner {
    /// Create a runner plus the receiver its countdowns tick into.
    ///
    /// The receiver is separate so a caller can select on it while holding the
    /// runner mutably; feed each event back through [`TriviaRunner::apply_timer_event`].
    #[must_use]
    pub fn new(
        credentials: SessionCredentials,
        gateway: Gateway,
        clock: Clock,
    ) -> (Self, TimerEvents) {
        let (timer_tx, events) = mpsc::unbounded_channel();
        let config = EffectiveConfig::defaults();
        let progress = progress_for(&config);
        let runner = Self {
            credentials,
            gateway,
            clock,
            state: RunnerState::LoadingSession,
            config,
            progress,
            question: None,
            last_answer_correct: None,
            generation: 0,
            countdown: None,
            timer: None,
            timer_tx,
            guard: FinalizeGuard::new(),
            finalize_status: None,
            server_closed: false,
            outcome: None,
            status: None,
            ranking: None,
            started_at: clock.now(),
            completed_at: None,
        };
        (runner, events)
    }

    /// Validate the session, then resolve its config.
    ///
    /// A config failure is not fatal: the runner continues with defaults.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::InvalidSession` or `RunnerError::SessionNotActive`;
    /// the runner is then in `ErrorTerminal`.
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
        self.progress = progress_for(&self.config);
        self.state = RunnerState::AwaitingQuestion;

        info!(
            session_id = %self.credentials.session_id(),
            max_questions = self.config.rules.max_questions,
            timer_seconds = self.config.rules.timer_seconds,
            use_lives = self.config.rules.use_lives,
            "trivia session ready"
        );
        Ok(())
    }

    // ─── QUESTIONS ─────────────────────────────────────────────────────────────

    /// Fetch and show the next question (or the pending one, if unanswered).
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::InvalidTransition` outside the question loop, and
    /// `RunnerError::TransientFetch` when the supplier fails.
    pub async fn next_question(&mut self) -> Result<Applied, RunnerError> {
        let ticket = self.begin_next()?;
        let response = self
            .gateway
            .questions
            .next_question(&self.credentials)
            .await;
        self.apply_next(ticket, response)
    }

    /// Stop the current countdown and move to `AwaitingQuestion`.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::InvalidTransition` outside the question loop, and
    /// while an answer is in flight.
    pub fn begin_next(&mut self) -> Result<Ticket, RunnerError> {
        match self.state {
            RunnerState::AwaitingQuestion | RunnerState::QuestionActive => {}
            state => {
                return Err(RunnerError::InvalidTransition {
                    action: "request a question",
                    state,
                });
            }
        }
        self.stop_timer();
        self.generation += 1;
        self.state = RunnerState::AwaitingQuestion;
        self.status = Some(StatusMessage::Loading);
        Ok(Ticket::new(self.generation))
    }

    /// # Errors
    ///
    /// Returns `RunnerError::TransientFetch` when `response` is a failure.
    pub fn apply_next(
        &mut self,
        ticket: Ticket,
        response: Result<NextQuestion, GatewayError>,
    ) -> Result<Applied, RunnerError> {
        if ticket.generation() != self.generation || self.state != RunnerState::AwaitingQuestion {
            debug!(
                ticket = ticket.generation(),
                current = self.generation,
                "discarding stale question response"
            );
            return Ok(Applied::Stale);
        }

        match response {
            Ok(NextQuestion::Question(question)) => {
                debug!(question_id = %question.id, "question received");
                self.question = Some(question);
                self.last_answer_correct = None;
                self.status = None;
                self.state = RunnerState::QuestionActive;
                self.start_timer();
                Ok(Applied::Updated)
            }
            Ok(NextQuestion::Finished(result)) => {
                self.close_from_server(result);
                Ok(Applied::Updated)
            }
            Err(source) => Err(self.recover(
                RunnerError::TransientFetch {
                    what: "question",
                    source,
                },
                RunnerState::AwaitingQuestion,
            )),
        }
    }

    /// The server already closed the session and scored it; no finalize follows.
    fn close_from_server(&mut self, result: TriviaResult) {
        self.stop_timer();
        self.timer = None;
        self.guard.try_claim();
        self.progress.reconcile(result.progress());
        self.progress.mark_finished();
        self.server_closed = true;
        self.outcome = Some(result.outcome.unwrap_or(Outcome::Completed));
        self.question = None;
        self.clock.stamp_once(&mut self.completed_at);
        self.status = Some(StatusMessage::Finished {
            score: self.progress.score(),
        });
        self.state = RunnerState::Done;
        info!(
            session_id = %self.credentials.session_id(),
            score = self.progress.score(),
            answered = self.progress.answered(),
            "session closed by server"
        );
    }

    // ─── ANSWERS ───────────────────────────────────────────────────────────────

    /// Submit a choice for the current question and reconcile with the receipt.
    ///
    /// Finalizes the session when the receipt ends the round.
    ///
    /// # Errors
    ///
    /// Returns the `begin_answer` errors, or `RunnerError::SubmissionRejected`
    /// when the server refuses the answer (local progress is left unchanged).
    pub async fn submit_answer(&mut self, choice: ChoiceId) -> Result<Applied, RunnerError> {
        let ticket = self.begin_answer(choice)?;
        let response = self
            .gateway
            .questions
            .submit_answer(&self.credentials, choice)
            .await;
        let applied = self.apply_answer(ticket, response)?;
        if self.state == RunnerState::Finished {
            self.finalize().await;
        }
        Ok(applied)
    }

    /// Lock input and stop the countdown for a submission.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::InvalidTransition` unless a question is active,
    /// `RunnerError::TimeUp` once its countdown expired, and
    /// `RunnerError::UnknownChoice` for a choice the question does not offer.
    pub fn begin_answer(&mut self, choice: ChoiceId) -> Result<Ticket, RunnerError> {
        let invalid = RunnerError::InvalidTransition {
            action: "answer",
            state: self.state,
        };
        if !self.state.accepts_input() {
            return Err(invalid);
        }
        if self.timer.is_some_and(|timer| timer.expired) {
            return Err(RunnerError::TimeUp);
        }
        let Some(question) = &self.question else {
            return Err(invalid);
        };
        if !question.has_choice(choice) {
            return Err(RunnerError::UnknownChoice(choice));
        }

        self.stop_timer();
        self.state = RunnerState::SubmittingAnswer;
        self.status = Some(StatusMessage::Submitting);
        Ok(Ticket::new(self.generation))
    }

    /// Apply an answer receipt. Server values replace local progress.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::SubmissionRejected` when `response` is a failure;
    /// the question stays active so the player can retry.
    pub fn apply_answer(
        &mut self,
        ticket: Ticket,
        response: Result<AnswerReceipt, GatewayError>,
    ) -> Result<Applied, RunnerError> {
        if ticket.generation() != self.generation || self.state != RunnerState::SubmittingAnswer {
            debug!(
                ticket = ticket.generation(),
                current = self.generation,
                "discarding stale answer response"
            );
            return Ok(Applied::Stale);
        }

        let receipt = match response {
            Ok(receipt) => receipt,
            Err(source) => {
                return Err(self.recover(
                    RunnerError::SubmissionRejected { source },
                    RunnerState::QuestionActive,
                ));
            }
        };

        self.progress.reconcile(receipt.progress());
        self.last_answer_correct = Some(receipt.correct);
        let score = self.progress.score();
        self.status = Some(if receipt.correct {
            StatusMessage::Correct { score }
        } else {
            StatusMessage::Incorrect { score }
        });

        if self.progress.is_failed() {
            self.status = Some(StatusMessage::OutOfLives { score });
            self.conclude(Outcome::Lose);
        } else if receipt.done {
            self.conclude(Outcome::Completed);
        } else {
            self.state = RunnerState::AwaitingQuestion;
        }
        Ok(Applied::Updated)
    }

    fn conclude(&mut self, outcome: Outcome) {
        self.stop_timer();
        self.progress.mark_finished();
        self.outcome = Some(outcome);
        self.clock.stamp_once(&mut self.completed_at);
        self.state = RunnerState::Finished;
    }

    // ─── FINALIZE ──────────────────────────────────────────────────────────────

    /// Post the locally observed result, at most once per session.
    ///
    /// Returns `None` when there is nothing to finalize or it was already issued.
    /// A failure is recorded in the view; the runner still ends in `Done`.
    pub async fn finalize(&mut self) -> Option<FinalizeStatus> {
        if self.state != RunnerState::Finished {
            debug!(state = %self.state, "nothing to finalize");
            return None;
        }
        self.state = RunnerState::Finalizing;

        let outcome = self.outcome.unwrap_or(Outcome::Completed);
        let result = FinalResult::Trivia(TriviaResult {
            score: self.progress.score(),
            answered: self.progress.answered(),
            correct: self.progress.correct(),
            outcome: Some(outcome),
        });
        let finished_at = self.clock.stamp_once(&mut self.completed_at);
        let request = FinalizeRequest::new(result, outcome, finished_at);

        let status =
            finalize_once(&self.guard, &self.gateway, &self.credentials, &request).await;
        if status.is_some() {
            self.finalize_status.clone_from(&status);
        }
        self.state = RunnerState::Done;
        status
    }

    // ─── RANKING ───────────────────────────────────────────────────────────────

    /// Fetch the company ranking once the run is over and keep it for the view.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::InvalidTransition` before the runner is `Done`, and
    /// `RunnerError::TransientFetch` when the supplier fails. A failed fetch
    /// leaves the runner in `Done` and can be retried.
    pub async fn load_ranking(&mut self) -> Result<&[RankingEntry], RunnerError> {
        if self.state != RunnerState::Done {
            return Err(RunnerError::InvalidTransition {
                action: "load the ranking",
                state: self.state,
            });
        }
        match self.gateway.ranking.ranking(&self.credentials).await {
            Ok(entries) => {
                debug!(entries = entries.len(), "ranking received");
                Ok(self.ranking.insert(entries).as_slice())
            }
            Err(source) => {
                let err = RunnerError::TransientFetch {
                    what: "ranking",
                    source,
                };
                warn!(error = %err, "ranking unavailable");
                Err(err)
            }
        }
    }

    // ─── TIMER ─────────────────────────────────────────────────────────────────

    fn start_timer(&mut self) {
        self.stop_timer();
        if !self.config.rules.show_timer {
            self.timer = None;
            return;
        }
        let countdown = Countdown::start(
            self.generation,
            self.config.rules.timer_seconds,
            self.timer_tx.clone(),
        );
        self.timer = Some(TimerView {
            remaining: countdown.seconds(),
            expired: false,
        });
        self.countdown = Some(countdown);
    }

    fn stop_timer(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            countdown.cancel();
        }
    }

    /// Feed a countdown tick. Returns whether the view changed.
    ///
    /// Ticks from cancelled countdowns are ignored. Expiry locks the choices but
    /// never submits anything; the player moves on with the next question.
    pub fn apply_timer_event(&mut self, event: TimerEvent) -> bool {
        let Some(countdown) = &self.countdown else {
            return false;
        };
        if event.generation != countdown.generation()
            || self.state != RunnerState::QuestionActive
        {
            return false;
        }

        let expired = event.remaining == 0;
        self.timer = Some(TimerView {
            remaining: event.remaining,
            expired,
        });
        if expired {
            self.countdown = None;
            self.status = Some(StatusMessage::TimeUp);
            debug!(generation = event.generation, "question timed out");
        }
        true
    }

    /// Stop background work. Safe to call in any state.
    pub fn teardown(&mut self) {
        self.stop_timer();
        debug!(state = %self.state, "trivia runner torn down");
    }

    // ─── FAILURES ──────────────────────────────────────────────────────────────

    fn fail(&mut self, err: &RunnerError) {
        self.stop_timer();
        self.timer = None;
        self.question = None;
        self.status = StatusMessage::for_error(err);
        self.clock.stamp_once(&mut self.completed_at);
        self.state = RunnerState::ErrorTerminal;
    }

    /// Record a collaborator failure: stay in `resume` unless it ends the session.
    fn recover(&mut self, err: RunnerError, resume: RunnerState) -> RunnerError {
        if err.is_terminal() {
            warn!(error = %err, "session can no longer be played");
            self.fail(&err);
        } else {
            warn!(error = %err, "request failed");
            self.state = resume;
            self.status = StatusMessage::for_error(&err);
        }
        err
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
    pub fn progress(&self) -> &RunnerProgress {
        &self.progress
    }

    #[must_use]
    pub fn credentials(&self) -> &SessionCredentials {
        &self.credentials
    }

    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    #[must_use]
    pub fn finalize_status(&self) -> Option<&FinalizeStatus> {
        self.finalize_status.as_ref()
    }

    #[must_use]
    pub fn timer_running(&self) -> bool {
        self.countdown.as_ref().is_some_and(Countdown::is_running)
    }

    #[must_use]
    pub fn view(&self) -> TriviaView {
        let expired = self.timer.is_some_and(|timer| timer.expired);
        TriviaView {
            state: self.state,
            question: self.question.clone(),
            choices_enabled: self.state.accepts_input() && !expired,
            next_enabled: matches!(
                self.state,
                RunnerState::AwaitingQuestion | RunnerState::QuestionActive
            ),
            results_ready: self.state == RunnerState::AwaitingQuestion
                && self.progress.is_exhausted(),
            timer: self.timer,
            score: self.progress.score(),
            answered: self.progress.answered(),
            correct: self.progress.correct(),
            max_questions: self.progress.max_questions(),
            lives_remaining: self.progress.lives_remaining(),
            last_answer_correct: self.last_answer_correct,
            status: self.status.clone(),
            finalize: self.finalize_status.clone(),
            texts: self.config.texts.clone(),
            watermark: self
                .config
                .show_watermark()
                .then(|| self.config.watermark.clone()),
            ranking: self.ranking.clone(),
        }
    }

    /// Aggregate of the finished run.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::InvalidTransition` before the runner is `Done`.
    pub fn summary(&self) -> Result<RunSummary, RunnerError> {
        let Some(completed_at) = self.completed_at.filter(|_| self.state == RunnerState::Done)
        else {
            return Err(RunnerError::InvalidTransition {
                action: "summarize",
                state: self.state,
            });
        };
        let finalized = self.server_closed
            || self
                .finalize_status
                .as_ref()
                .is_some_and(FinalizeStatus::is_acknowledged);
        Ok(RunSummary::new(
            self.credentials.session_id(),
            self.outcome,
            RunTotals {
                score: self.progress.score(),
                answered: self.progress.answered(),
                correct: self.progress.correct(),
                mistakes: self.progress.mistakes(),
            },
            self.started_at,
            completed_at,
            finalized,
        )?)
    }
}

impl fmt::Debug for TriviaRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriviaRunner")
            .field("session_id", &self.credentials.session_id())
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("progress", &self.progress)
            .field("finalize_status", &self.finalize_status)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
