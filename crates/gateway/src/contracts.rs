use async_trait::async_trait;
use runner_core::model::{
    AnswerReceipt, ChoiceId, FinalizeRequest, HangmanWord, NextQuestion, RankingEntry,
    SessionCredentials, SessionSnapshot,
};
use serde_json::Value;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::http::{HttpConfig, HttpGateway};
use crate::memory::InMemoryBackend;

/// Raw per-contract customization plus the preview flag of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomizationPayload {
    pub customization: Value,
    pub preview_mode: bool,
}

/// Confirms that a session exists, belongs to the user and reports its state.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// # Errors
    ///
    /// Returns `GatewayError::Rejected` for unknown sessions or mismatched user/token.
    async fn validate(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<SessionSnapshot, GatewayError>;
}

/// Returns the contract customization a session was launched with.
#[async_trait]
pub trait CustomizationResolver: Send + Sync {
    /// # Errors
    ///
    /// Returns `GatewayError` when the customization cannot be fetched.
    async fn fetch_customization(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<CustomizationPayload, GatewayError>;
}

/// Server side of the trivia protocol.
#[async_trait]
pub trait QuestionSupplier: Send + Sync {
    /// The pending question, a fresh one, or the closed session's result.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` for rejected or failed requests.
    async fn next_question(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<NextQuestion, GatewayError>;

    /// # Errors
    ///
    /// Returns `GatewayError` for rejected or failed requests.
    async fn submit_answer(
        &self,
        credentials: &SessionCredentials,
        choice: ChoiceId,
    ) -> Result<AnswerReceipt, GatewayError>;
}

/// Leaderboard of finished trivia sessions within the player's company.
///
/// Unlike the rest of the trivia protocol it also answers for finished sessions.
#[async_trait]
pub trait RankingSupplier: Send + Sync {
    /// Best scores first, at most `RANKING_SIZE` entries.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Rejected` for mismatched credentials or a player
    /// without a company (409 `usuario_sin_company`).
    async fn ranking(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<Vec<RankingEntry>, GatewayError>;
}

/// Hands out the session's sticky hangman word.
#[async_trait]
pub trait WordSupplier: Send + Sync {
    /// # Errors
    ///
    /// Returns `GatewayError` when no word can be assigned.
    async fn sticky_word(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<HangmanWord, GatewayError>;
}

/// Persists a session's terminal result.
#[async_trait]
pub trait SessionFinalizer: Send + Sync {
    /// # Errors
    ///
    /// Returns `GatewayError` for rejected or failed requests.
    async fn finalize(
        &self,
        credentials: &SessionCredentials,
        request: &FinalizeRequest,
    ) -> Result<SessionSnapshot, GatewayError>;
}

/// Aggregates the collaborators behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Gateway {
    pub sessions: Arc<dyn SessionValidator>,
    pub customization: Arc<dyn CustomizationResolver>,
    pub questions: Arc<dyn QuestionSupplier>,
    pub ranking: Arc<dyn RankingSupplier>,
    pub words: Arc<dyn WordSupplier>,
    pub finalizer: Arc<dyn SessionFinalizer>,
}

impl Gateway {
    /// All collaborators served by one shared in-memory backend.
    #[must_use]
    pub fn in_memory(backend: &InMemoryBackend) -> Self {
        Self {
            sessions: Arc::new(backend.clone()),
            customization: Arc::new(backend.clone()),
            questions: Arc::new(backend.clone()),
            ranking: Arc::new(backend.clone()),
            words: Arc::new(backend.clone()),
            finalizer: Arc::new(backend.clone()),
        }
    }

    /// All collaborators served by the runner HTTP routes.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if the HTTP client cannot be built.
    pub fn http(config: HttpConfig) -> Result<Self, GatewayError> {
        let client = HttpGateway::new(config)?;
        Ok(Self {
            sessions: Arc::new(client.clone()),
            customization: Arc::new(client.clone()),
            questions: Arc::new(client.clone()),
            ranking: Arc::new(client.clone()),
            words: Arc::new(client.clone()),
            finalizer: Arc::new(client),
        })
    }
}
