use std::fmt;

/// Lifecycle of one runner instance.
///
/// `LoadingSession → Validating → LoadingConfig → AwaitingQuestion → QuestionActive →
/// SubmittingAnswer → (AwaitingQuestion | Finished) → Finalizing → Done`, with
/// `ErrorTerminal` reachable from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunnerState {
    LoadingSession,
    Validating,
    LoadingConfig,
    AwaitingQuestion,
    QuestionActive,
    SubmittingAnswer,
    /// Terminal condition detected locally; finalize not issued yet.
    Finished,
    Finalizing,
    Done,
    ErrorTerminal,
}

impl RunnerState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunnerState::Done | RunnerState::ErrorTerminal)
    }

    /// Only an active question (or hangman round) takes player input.
    #[must_use]
    pub fn accepts_input(self) -> bool {
        matches!(self, RunnerState::QuestionActive)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunnerState::LoadingSession => "loading_session",
            RunnerState::Validating => "validating",
            RunnerState::LoadingConfig => "loading_config",
            RunnerState::AwaitingQuestion => "awaiting_question",
            RunnerState::QuestionActive => "question_active",
            RunnerState::SubmittingAnswer => "submitting_answer",
            RunnerState::Finished => "finished",
            RunnerState::Finalizing => "finalizing",
            RunnerState::Done => "done",
            RunnerState::ErrorTerminal => "error_terminal",
        }
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation stamp handed out when a request is issued.
///
/// A response is applied only if its ticket still matches the runner's current
/// generation; anything older is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    pub(crate) fn new(generation: u64) -> Self {
        Self { generation }
    }

    #[must_use]
    pub fn generation(self) -> u64 {
        self.generation
    }
}

/// What happened to a response handed back to the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Updated,
    /// Arrived after the runner moved on; ignored.
    Stale,
}
