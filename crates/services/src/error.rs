//! Shared error types for the services crate.

use thiserror::Error;

use gateway::GatewayError;
use runner_core::model::{ChoiceId, ReadinessError, RunSummaryError, SessionStatus};

use crate::runner::RunnerState;

/// Errors emitted by the game runners.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    #[error(transparent)]
    Readiness(#[from] ReadinessError),

    /// Missing session, mismatched user or revoked token.
    #[error("invalid session: {source}")]
    InvalidSession {
        #[source]
        source: GatewayError,
    },

    #[error("session is not active (status: {status})")]
    SessionNotActive { status: SessionStatus },

    #[error("failed to fetch {what}: {source}")]
    TransientFetch {
        what: &'static str,
        #[source]
        source: GatewayError,
    },

    #[error("answer submission rejected: {source}")]
    SubmissionRejected {
        #[source]
        source: GatewayError,
    },

    #[error("finalize failed: {source}")]
    FinalizeFailure {
        #[source]
        source: GatewayError,
    },

    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: RunnerState,
    },

    #[error("choice {0} is not offered by the current question")]
    UnknownChoice(ChoiceId),

    #[error("time is up for the current question")]
    TimeUp,

    #[error(transparent)]
    Summary(#[from] RunSummaryError),
}

impl RunnerError {
    /// The collaborator failure behind this error, if any.
    #[must_use]
    pub fn gateway_error(&self) -> Option<&GatewayError> {
        match self {
            Self::InvalidSession { source }
            | Self::TransientFetch { source, .. }
            | Self::SubmissionRejected { source }
            | Self::FinalizeFailure { source } => Some(source),
            _ => None,
        }
    }

    /// Server code behind a gateway failure, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.gateway_error().and_then(GatewayError::code)
    }

    /// Whether the runner can no longer make progress after this error.
    ///
    /// Besides startup failures this covers a token revoked mid-game (401) and a
    /// session closed elsewhere (409 `sesion_no_activa`).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Readiness(_) | Self::InvalidSession { .. } | Self::SessionNotActive { .. } => {
                true
            }
            Self::FinalizeFailure { .. } => false,
            _ => self.gateway_error().is_some_and(|source| {
                source.status() == Some(401) || source.code() == Some("sesion_no_activa")
            }),
        }
    }
}
