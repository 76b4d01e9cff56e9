use std::sync::atomic::{AtomicBool, Ordering};

use gateway::Gateway;
use runner_core::model::{FinalizeRequest, SessionCredentials};
use tracing::{debug, info, warn};

use crate::error::RunnerError;

/// Once-flag set synchronously before the finalize request is issued.
#[derive(Debug, Default)]
pub struct FinalizeGuard {
    claimed: AtomicBool,
}

impl FinalizeGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True exactly once; every later call returns false.
    pub fn try_claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }
}

/// Result of the one finalize attempt. Failures are never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeStatus {
    Acknowledged,
    Failed { reason: String },
}

impl FinalizeStatus {
    #[must_use]
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, FinalizeStatus::Acknowledged)
    }
}

/// Post the terminal result.
///
/// # Errors
///
/// Returns `RunnerError::FinalizeFailure` for any finalizer failure.
pub async fn submit(
    gateway: &Gateway,
    credentials: &SessionCredentials,
    request: &FinalizeRequest,
) -> Result<(), RunnerError> {
    gateway
        .finalizer
        .finalize(credentials, request)
        .await
        .map(|_| ())
        .map_err(|source| RunnerError::FinalizeFailure { source })
}

/// Claim the guard and post; `None` when finalize was already issued.
pub(crate) async fn finalize_once(
    guard: &FinalizeGuard,
    gateway: &Gateway,
    credentials: &SessionCredentials,
    request: &FinalizeRequest,
) -> Option<FinalizeStatus> {
    if !guard.try_claim() {
        debug!(session_id = %credentials.session_id(), "finalize already issued");
        return None;
    }

    info!(
        session_id = %credentials.session_id(),
        outcome = %request.client_state.outcome,
        "finalizing session"
    );
    match submit(gateway, credentials, request).await {
        Ok(()) => Some(FinalizeStatus::Acknowledged),
        Err(err) => {
            warn!(session_id = %credentials.session_id(), error = %err, "finalize failed");
            Some(FinalizeStatus::Failed {
                reason: err.to_string(),
            })
        }
    }
}
