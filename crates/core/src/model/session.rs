use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use url::Url;

use crate::model::ids::{SessionId, UserId};

pub const SESSION_ID_PARAM: &str = "session_id";
pub const USER_ID_PARAM: &str = "user_id";
pub const SESSION_TOKEN_PARAM: &str = "session_token";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Startup precondition failures, raised before the runner makes any transition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReadinessError {
    #[error("missing required parameter `{name}`")]
    MissingParameter { name: &'static str },

    #[error("malformed session id: {raw}")]
    MalformedSessionId { raw: String },

    #[error("malformed user id: {raw}")]
    MalformedUserId { raw: String },

    #[error("session token is empty")]
    EmptyToken,

    #[error("invalid runner url: {raw}")]
    InvalidUrl { raw: String },

    #[error("required surface unavailable: {name}")]
    MissingSurface { name: &'static str },
}

//
// ─── TOKEN ─────────────────────────────────────────────────────────────────────
//

/// Revocable runner token bound to a session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Trim and validate a raw token.
    ///
    /// # Errors
    ///
    /// Returns `ReadinessError::EmptyToken` for blank input.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ReadinessError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ReadinessError::EmptyToken);
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

//
// ─── CREDENTIALS ───────────────────────────────────────────────────────────────
//

/// The `(session_id, user_id, session_token)` triple carried by every runner call.
///
/// The runner never persists it; it is only forwarded to the collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    session_id: SessionId,
    user_id: UserId,
    token: SessionToken,
}

impl SessionCredentials {
    #[must_use]
    pub fn new(session_id: SessionId, user_id: UserId, token: SessionToken) -> Self {
        Self {
            session_id,
            user_id,
            token,
        }
    }

    /// Parse the identity triple from a runner query string (`a=1&b=2`, with or without `?`).
    ///
    /// # Errors
    ///
    /// Returns `ReadinessError` if any parameter is missing or malformed.
    pub fn from_query(query: &str) -> Result<Self, ReadinessError> {
        let query = query.trim_start_matches('?');
        let mut session_id = None;
        let mut user_id = None;
        let mut token = None;

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                SESSION_ID_PARAM => session_id = Some(value.into_owned()),
                USER_ID_PARAM => user_id = Some(value.into_owned()),
                SESSION_TOKEN_PARAM => token = Some(value.into_owned()),
                _ => {}
            }
        }

        Self::from_parts(session_id.as_deref(), user_id.as_deref(), token.as_deref())
    }

    /// Parse the identity triple from the full runner page URL.
    ///
    /// # Errors
    ///
    /// Returns `ReadinessError::InvalidUrl` if the URL cannot be parsed, or any
    /// error of [`SessionCredentials::from_query`].
    pub fn from_runner_url(raw: &str) -> Result<Self, ReadinessError> {
        let url = Url::parse(raw.trim()).map_err(|_| ReadinessError::InvalidUrl {
            raw: raw.to_owned(),
        })?;
        Self::from_query(url.query().unwrap_or_default())
    }

    /// Validate individually supplied parameters.
    ///
    /// # Errors
    ///
    /// Returns `ReadinessError` for the first missing or malformed parameter.
    pub fn from_parts(
        session_id: Option<&str>,
        user_id: Option<&str>,
        token: Option<&str>,
    ) -> Result<Self, ReadinessError> {
        let session_id = required(session_id, SESSION_ID_PARAM)?;
        let user_id = required(user_id, USER_ID_PARAM)?;
        let token = required(token, SESSION_TOKEN_PARAM)?;

        let session_id = session_id
            .parse::<SessionId>()
            .map_err(|_| ReadinessError::MalformedSessionId {
                raw: session_id.to_owned(),
            })?;
        let user_id = user_id
            .trim()
            .parse::<UserId>()
            .map_err(|_| ReadinessError::MalformedUserId {
                raw: user_id.to_owned(),
            })?;
        let token = SessionToken::parse(token)?;

        Ok(Self::new(session_id, user_id, token))
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Query pairs in the order the runner routes expect them.
    #[must_use]
    pub fn query_pairs(&self) -> [(&'static str, String); 3] {
        [
            (SESSION_ID_PARAM, self.session_id.to_string()),
            (USER_ID_PARAM, self.user_id.to_string()),
            (SESSION_TOKEN_PARAM, self.token.expose().to_owned()),
        ]
    }
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, ReadinessError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ReadinessError::MissingParameter { name }),
    }
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Server-side lifecycle state of a session (`estado`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum SessionStatus {
    Active,
    Finished,
    Error,
    Other(String),
}

impl SessionStatus {
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Active)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Finished => "finished",
            SessionStatus::Error => "error",
            SessionStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for SessionStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "active" => SessionStatus::Active,
            "finished" => SessionStatus::Finished,
            "error" => SessionStatus::Error,
            _ => SessionStatus::Other(raw),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the session validator (and the finalizer) report about a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
}

impl SessionSnapshot {
    #[must_use]
    pub fn new(status: SessionStatus) -> Self {
        Self { status }
    }
}
