use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use runner_core::model::{
    AnswerReceipt, ChoiceId, ClientState, FinalResult, FinalizeRequest, HangmanWord, NextQuestion,
    Question, RankingEntry, SessionCredentials, SessionId, SessionSnapshot, SessionStatus,
    TriviaResult, UserId, RANKING_SIZE,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::contracts::{
    CustomizationPayload, CustomizationResolver, QuestionSupplier, RankingSupplier,
    SessionFinalizer, SessionValidator, WordSupplier,
};
use crate::error::GatewayError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl HttpConfig {
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if `base_url` is not an absolute URL.
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let mut raw = base_url.trim().to_owned();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Ok(Self {
            base_url: Url::parse(&raw)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// `RUNNER_BASE_URL` and `RUNNER_HTTP_TIMEOUT_SECS`, with defaults for both.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if `RUNNER_BASE_URL` is not a valid URL.
    pub fn from_env() -> Result<Self, GatewayError> {
        let base_url = env::var("RUNNER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let timeout = env::var("RUNNER_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Ok(Self::new(&base_url)?.with_timeout(Duration::from_secs(timeout)))
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Collaborators backed by the runner HTTP routes.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    config: HttpConfig,
}

impl HttpGateway {
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if the HTTP client cannot be built.
    pub fn new(config: HttpConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn route(&self, path: &str) -> Result<Url, GatewayError> {
        Ok(self.config.base_url.join(path)?)
    }

    /// Route with the identity triple appended as query parameters.
    fn authed_route(
        &self,
        path: &str,
        credentials: &SessionCredentials,
    ) -> Result<Url, GatewayError> {
        let mut url = self.route(path)?;
        url.query_pairs_mut()
            .extend_pairs(credentials.query_pairs());
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, GatewayError> {
        debug!(path = url.path(), "GET");
        let response = self.client.get(url).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, GatewayError> {
        debug!(path = url.path(), "POST");
        let response = self.client.post(url).json(body).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }
}

/// Non-2xx responses become `Rejected`, carrying the `{error}` code when present.
async fn ensure_success(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let code = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error);
    Err(GatewayError::Rejected {
        status: status.as_u16(),
        code,
    })
}

#[async_trait]
impl SessionValidator for HttpGateway {
    async fn validate(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<SessionSnapshot, GatewayError> {
        let path = format!("runner/sesiones/{}", credentials.session_id());
        let url = self.authed_route(&path, credentials)?;
        let body: SessionEnvelope = self.get(url).await?;
        Ok(SessionSnapshot::new(body.sesion.estado))
    }
}

#[async_trait]
impl CustomizationResolver for HttpGateway {
    async fn fetch_customization(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<CustomizationPayload, GatewayError> {
        let url = self.authed_route("runner/trivia/state", credentials)?;
        let body: StateBody = self.get(url).await?;
        Ok(CustomizationPayload {
            customization: body.customization,
            preview_mode: body.preview_mode,
        })
    }
}

#[async_trait]
impl QuestionSupplier for HttpGateway {
    async fn next_question(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<NextQuestion, GatewayError> {
        let url = self.authed_route("runner/trivia/next", credentials)?;
        let body: NextBody = self.get(url).await?;
        match body {
            NextBody {
                question: Some(question),
                ..
            } => Ok(NextQuestion::Question(question)),
            NextBody { finished: true, result, .. } => {
                Ok(NextQuestion::Finished(result.unwrap_or_default()))
            }
            NextBody { .. } => Err(GatewayError::Decode(
                "neither question nor finished flag in response".into(),
            )),
        }
    }

    async fn submit_answer(
        &self,
        credentials: &SessionCredentials,
        choice: ChoiceId,
    ) -> Result<AnswerReceipt, GatewayError> {
        let url = self.route("runner/trivia/answer")?;
        let payload = AnswerBody {
            session_id: credentials.session_id(),
            user_id: credentials.user_id(),
            session_token: credentials.token().expose(),
            choice_id: choice,
        };
        let body: AnswerResponse = self.post(url, &payload).await?;
        Ok(AnswerReceipt {
            correct: body.correct,
            score: body.score,
            answered: body.answered,
            correct_count: body.correct_count,
            done: body.done,
        })
    }
}

#[async_trait]
impl RankingSupplier for HttpGateway {
    async fn ranking(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<Vec<RankingEntry>, GatewayError> {
        let url = self.authed_route("runner/trivia/ranking", credentials)?;
        let mut body: RankingBody = self.get(url).await?;
        body.ranking.truncate(RANKING_SIZE);
        Ok(body.ranking)
    }
}

#[async_trait]
impl WordSupplier for HttpGateway {
    async fn sticky_word(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<HangmanWord, GatewayError> {
        let url = self.authed_route("runner/hangman/word/", credentials)?;
        let body: WordBody = self.get(url).await?;
        HangmanWord::new(&body.word, body.hint.as_deref().unwrap_or_default())
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SessionFinalizer for HttpGateway {
    async fn finalize(
        &self,
        credentials: &SessionCredentials,
        request: &FinalizeRequest,
    ) -> Result<SessionSnapshot, GatewayError> {
        let path = format!("runner/sesiones/{}/finalizar", credentials.session_id());
        let url = self.route(&path)?;
        let payload = FinalizeBody {
            user_id: credentials.user_id(),
            session_token: credentials.token().expose(),
            result: &request.result,
            estado_cliente: &request.client_state,
        };
        let body: SessionEnvelope = self.post(url, &payload).await?;
        Ok(SessionSnapshot::new(body.sesion.estado))
    }
}

// ─── WIRE TYPES ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionEnvelope {
    sesion: SessionBody,
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    estado: SessionStatus,
}

#[derive(Debug, Deserialize)]
struct StateBody {
    #[serde(default)]
    customization: Value,
    #[serde(default)]
    preview_mode: bool,
}

#[derive(Debug, Deserialize)]
struct NextBody {
    #[serde(default)]
    question: Option<Question>,
    #[serde(default)]
    finished: bool,
    #[serde(default)]
    result: Option<TriviaResult>,
}

#[derive(Debug, Serialize)]
struct AnswerBody<'a> {
    session_id: SessionId,
    user_id: UserId,
    session_token: &'a str,
    choice_id: ChoiceId,
}

#[derive(Debug, Deserialize)]
struct AnswerResponse {
    #[serde(default)]
    correct: bool,
    score: Option<u32>,
    answered: Option<u32>,
    correct_count: Option<u32>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct RankingBody {
    #[serde(default)]
    ranking: Vec<RankingEntry>,
}

#[derive(Debug, Deserialize)]
struct WordBody {
    word: String,
    #[serde(default)]
    hint: Option<String>,
}

#[derive(Debug, Serialize)]
struct FinalizeBody<'a> {
    user_id: UserId,
    session_token: &'a str,
    result: &'a FinalResult,
    estado_cliente: &'a ClientState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use runner_core::model::SessionToken;
    use serde_json::json;

    fn creds() -> SessionCredentials {
        SessionCredentials::new(
            "6f1c2b9e-8a41-4b55-9f43-2f3d1c0e7a10".parse().unwrap(),
            UserId::new(42),
            SessionToken::parse("abc").unwrap(),
        )
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let config = HttpConfig::new("https://games.example.com/app").unwrap();
        assert_eq!(config.base_url.as_str(), "https://games.example.com/app/");
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let err = HttpConfig::new("not a url").unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn routes_carry_identity_query() {
        let gateway = HttpGateway::new(HttpConfig::new("http://host/base").unwrap()).unwrap();
        let url = gateway.authed_route("runner/trivia/next", &creds()).unwrap();
        assert_eq!(url.path(), "/base/runner/trivia/next");
        assert_eq!(
            url.query(),
            Some("session_id=6f1c2b9e-8a41-4b55-9f43-2f3d1c0e7a10&user_id=42&session_token=abc")
        );
    }

    #[test]
    fn next_body_decodes_both_shapes() {
        let question: NextBody = serde_json::from_value(json!({
            "question": { "id": 3, "text": "?", "choices": [{ "id": 9, "text": "a" }] }
        }))
        .unwrap();
        assert!(question.question.is_some());

        let finished: NextBody = serde_json::from_value(json!({
            "finished": true,
            "result": { "score": 200, "answered": 3, "correct": 2 }
        }))
        .unwrap();
        assert!(finished.finished);
        assert_eq!(finished.result.unwrap().score, 200);
    }

    #[test]
    fn ranking_route_and_body() {
        let gateway = HttpGateway::new(HttpConfig::new("http://host/").unwrap()).unwrap();
        let url = gateway.authed_route("runner/trivia/ranking", &creds()).unwrap();
        assert_eq!(url.path(), "/runner/trivia/ranking");

        let body: RankingBody = serde_json::from_value(json!({
            "ranking": [
                { "username": "ana", "score": 300, "answered": 3, "correct": 3,
                  "ended_at": "2023-11-14T22:13:20+00:00" },
                { "username": "leo", "score": 100, "answered": 3, "correct": 1, "ended_at": null }
            ]
        }))
        .unwrap();
        assert_eq!(body.ranking.len(), 2);
        assert_eq!(body.ranking[0].ended_at, Some(runner_core::time::fixed_now()));
        assert!(body.ranking[1].ended_at.is_none());

        let empty: RankingBody = serde_json::from_value(json!({})).unwrap();
        assert!(empty.ranking.is_empty());
    }

    #[test]
    fn answer_response_keeps_missing_fields_absent() {
        let body: AnswerResponse =
            serde_json::from_value(json!({ "ok": true, "correct": true, "score": 100 })).unwrap();
        assert_eq!(body.score, Some(100));
        assert_eq!(body.answered, None);
        assert!(!body.done);
    }

    #[test]
    fn finalize_body_uses_server_field_names() {
        let creds = creds();
        let request = FinalizeRequest::new(
            FinalResult::Trivia(TriviaResult::default()),
            runner_core::model::Outcome::Completed,
            runner_core::time::fixed_now(),
        );
        let body = FinalizeBody {
            user_id: creds.user_id(),
            session_token: creds.token().expose(),
            result: &request.result,
            estado_cliente: &request.client_state,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["user_id"], json!(42));
        assert_eq!(value["estado_cliente"]["outcome"], json!("completed"));
    }
}
