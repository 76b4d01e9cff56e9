use gateway::Gateway;
use runner_core::model::{EffectiveConfig, SessionCredentials, SessionSnapshot};
use tracing::{debug, info};

use crate::error::RunnerError;

/// Confirm the session exists, belongs to the user and is still active.
///
/// # Errors
///
/// Returns `RunnerError::InvalidSession` when the validator rejects or cannot be
/// reached, and `RunnerError::SessionNotActive` for any status other than active.
pub async fn validate_session(
    gateway: &Gateway,
    credentials: &SessionCredentials,
) -> Result<SessionSnapshot, RunnerError> {
    let snapshot = gateway
        .sessions
        .validate(credentials)
        .await
        .map_err(|source| RunnerError::InvalidSession { source })?;

    if !snapshot.status.is_active() {
        info!(
            session_id = %credentials.session_id(),
            status = %snapshot.status,
            "session is not active"
        );
        return Err(RunnerError::SessionNotActive {
            status: snapshot.status,
        });
    }

    debug!(session_id = %credentials.session_id(), "session validated");
    Ok(snapshot)
}

/// Fetch and resolve the session's customization.
///
/// Callers degrade to [`EffectiveConfig::defaults`] on failure.
///
/// # Errors
///
/// Returns `RunnerError::TransientFetch` when the customization cannot be fetched.
pub async fn resolve_config(
    gateway: &Gateway,
    credentials: &SessionCredentials,
) -> Result<EffectiveConfig, RunnerError> {
    let payload = gateway
        .customization
        .fetch_customization(credentials)
        .await
        .map_err(|source| RunnerError::TransientFetch {
            what: "customization",
            source,
        })?;
    Ok(EffectiveConfig::resolve(
        &payload.customization,
        payload.preview_mode,
    ))
}
