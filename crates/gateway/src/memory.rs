use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use runner_core::Clock;
use runner_core::model::{
    AnswerReceipt, ChoiceId, ClientState, EffectiveConfig, FinalResult, FinalizeRequest,
    HangmanWord, NextQuestion, Question, QuestionId, RankingEntry, SessionCredentials, SessionId,
    SessionSnapshot, SessionStatus, TriviaResult, UserId, RANKING_SIZE,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::contracts::{
    CustomizationPayload, CustomizationResolver, QuestionSupplier, RankingSupplier,
    SessionFinalizer, SessionValidator, WordSupplier,
};
use crate::error::GatewayError;

/// Collaborator operations, used for call accounting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Validate,
    Customization,
    NextQuestion,
    SubmitAnswer,
    Ranking,
    StickyWord,
    Finalize,
}

/// Number of calls received per operation, failed ones included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallLog {
    pub validate: usize,
    pub customization: usize,
    pub next_question: usize,
    pub submit_answer: usize,
    pub ranking: usize,
    pub sticky_word: usize,
    pub finalize: usize,
}

impl CallLog {
    fn bump(&mut self, op: Operation) {
        let slot = match op {
            Operation::Validate => &mut self.validate,
            Operation::Customization => &mut self.customization,
            Operation::NextQuestion => &mut self.next_question,
            Operation::SubmitAnswer => &mut self.submit_answer,
            Operation::Ranking => &mut self.ranking,
            Operation::StickyWord => &mut self.sticky_word,
            Operation::Finalize => &mut self.finalize,
        };
        *slot += 1;
    }
}

/// Who plays a session, as far as the ranking is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub username: String,
    pub company: String,
}

impl Player {
    #[must_use]
    pub fn new(username: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            company: company.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct BankQuestion {
    question: Question,
    correct: ChoiceId,
}

#[derive(Debug, Clone, Default)]
struct TriviaProgress {
    asked: Vec<QuestionId>,
    current: Option<usize>,
    score: u32,
    answered: u32,
    correct: u32,
}

impl TriviaProgress {
    fn result(&self) -> TriviaResult {
        TriviaResult {
            score: self.score,
            answered: self.answered,
            correct: self.correct,
            outcome: None,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredSession {
    user_id: UserId,
    token: String,
    status: SessionStatus,
    customization: Value,
    preview_mode: bool,
    player: Option<Player>,
    trivia: TriviaProgress,
    word: Option<HangmanWord>,
    result: Option<FinalResult>,
    client_state: Option<ClientState>,
    ended_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    fn require_active(&self) -> Result<(), GatewayError> {
        if self.status.is_active() {
            Ok(())
        } else {
            Err(GatewayError::rejected(409, "sesion_no_activa"))
        }
    }

    fn rules(&self) -> runner_core::model::Rules {
        EffectiveConfig::resolve(&self.customization, self.preview_mode).rules
    }

    fn close(&mut self, result: FinalResult, clock: Clock) {
        self.status = SessionStatus::Finished;
        self.result = Some(result);
        clock.stamp_once(&mut self.ended_at);
    }

    fn close_trivia(&mut self, clock: Clock) -> TriviaResult {
        let result = self.trivia.result();
        self.close(FinalResult::Trivia(result), clock);
        result
    }

    /// Ranking row for a finished trivia session of `company`.
    fn ranking_entry(&self, company: &str) -> Option<RankingEntry> {
        let player = self.player.as_ref().filter(|p| p.company == company)?;
        let Some(FinalResult::Trivia(result)) = &self.result else {
            return None;
        };
        (self.status == SessionStatus::Finished).then(|| RankingEntry {
            username: player.username.clone(),
            score: result.score,
            answered: result.answered,
            correct: result.correct,
            ended_at: self.ended_at,
        })
    }
}

#[derive(Default)]
struct BackendState {
    sessions: HashMap<SessionId, StoredSession>,
    questions: Vec<BankQuestion>,
    words: Vec<HangmanWord>,
    calls: CallLog,
    failures: HashMap<Operation, VecDeque<GatewayError>>,
    shuffle: bool,
    clock: Clock,
}

impl BackendState {
    fn enter(&mut self, op: Operation) -> Result<(), GatewayError> {
        self.calls.bump(op);
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Session lookup with the same user/token checks as the runner routes.
fn authorize<'a>(
    sessions: &'a mut HashMap<SessionId, StoredSession>,
    credentials: &SessionCredentials,
) -> Result<&'a mut StoredSession, GatewayError> {
    let session = sessions
        .get_mut(&credentials.session_id())
        .filter(|s| s.user_id == credentials.user_id())
        .ok_or_else(|| GatewayError::rejected(404, "sesion_no_encontrada"))?;
    if session.token.is_empty() || session.token != credentials.token().expose() {
        return Err(GatewayError::rejected(401, "session_token_invalido"));
    }
    Ok(session)
}

/// In-memory stand-in for the runner backend, for tests and offline demos.
///
/// Mirrors the server protocol: tokens are checked, the pending trivia question is
/// returned until answered, scoring happens here, and the hangman word is sticky.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick questions and words at random instead of in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Transport` if the backend lock is poisoned.
    pub fn set_shuffle(&self, shuffle: bool) -> Result<(), GatewayError> {
        self.lock()?.shuffle = shuffle;
        Ok(())
    }

    /// Clock used to stamp when sessions end.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Transport` if the backend lock is poisoned.
    pub fn set_clock(&self, clock: Clock) -> Result<(), GatewayError> {
        self.lock()?.clock = clock;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BackendState>, GatewayError> {
        self.state
            .lock()
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }

    /// Register an active session reachable with the given credentials.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Transport` if the backend lock is poisoned.
    pub fn open_session(
        &self,
        credentials: &SessionCredentials,
        customization: Value,
        preview_mode: bool,
    ) -> Result<(), GatewayError> {
        let session = StoredSession {
            user_id: credentials.user_id(),
            token: credentials.token().expose().to_owned(),
            status: SessionStatus::Active,
            customization,
            preview_mode,
            player: None,
            trivia: TriviaProgress::default(),
            word: None,
            result: None,
            client_state: None,
            ended_at: None,
        };
        self.lock()?
            .sessions
            .insert(credentials.session_id(), session);
        Ok(())
    }

    /// Attach a player to a session so its result can be ranked.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Rejected` for unknown sessions.
    pub fn register_player(&self, session_id: SessionId, player: Player) -> Result<(), GatewayError> {
        let mut state = self.lock()?;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| GatewayError::rejected(404, "sesion_no_encontrada"))?;
        session.player = Some(player);
        Ok(())
    }

    /// Close a session with `result` as if it had been played to the end.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Rejected` for unknown sessions.
    pub fn record_result(&self, session_id: SessionId, result: FinalResult) -> Result<(), GatewayError> {
        let mut state = self.lock()?;
        let clock = state.clock;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| GatewayError::rejected(404, "sesion_no_encontrada"))?;
        session.close(result, clock);
        Ok(())
    }

    /// Add a question to the bank. `correct` must be one of its choices.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Rejected` (409) with `pregunta_sin_opciones` for a
    /// question without choices and `pregunta_sin_correcta` when `correct` is not
    /// among them.
    pub fn add_question(&self, question: Question, correct: ChoiceId) -> Result<(), GatewayError> {
        if question.choices.is_empty() {
            return Err(GatewayError::rejected(409, "pregunta_sin_opciones"));
        }
        if !question.has_choice(correct) {
            return Err(GatewayError::rejected(409, "pregunta_sin_correcta"));
        }
        self.lock()?.questions.push(BankQuestion { question, correct });
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `GatewayError::Transport` if the backend lock is poisoned.
    pub fn add_word(&self, word: HangmanWord) -> Result<(), GatewayError> {
        self.lock()?.words.push(word);
        Ok(())
    }

    /// Force a session into another lifecycle state (e.g. finished elsewhere).
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Rejected` for unknown sessions.
    pub fn set_status(&self, session_id: SessionId, status: SessionStatus) -> Result<(), GatewayError> {
        let mut state = self.lock()?;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| GatewayError::rejected(404, "sesion_no_encontrada"))?;
        session.status = status;
        Ok(())
    }

    /// Make the next call of `op` fail with `error`. Failures queue up per operation.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Transport` if the backend lock is poisoned.
    pub fn fail_next(&self, op: Operation, error: GatewayError) -> Result<(), GatewayError> {
        self.lock()?.failures.entry(op).or_default().push_back(error);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `GatewayError::Transport` if the backend lock is poisoned.
    pub fn calls(&self) -> Result<CallLog, GatewayError> {
        Ok(self.lock()?.calls)
    }

    /// # Errors
    ///
    /// Returns `GatewayError::Transport` if the backend lock is poisoned.
    pub fn session_status(&self, session_id: SessionId) -> Result<Option<SessionStatus>, GatewayError> {
        Ok(self
            .lock()?
            .sessions
            .get(&session_id)
            .map(|s| s.status.clone()))
    }

    /// # Errors
    ///
    /// Returns `GatewayError::Transport` if the backend lock is poisoned.
    pub fn stored_result(&self, session_id: SessionId) -> Result<Option<FinalResult>, GatewayError> {
        Ok(self
            .lock()?
            .sessions
            .get(&session_id)
            .and_then(|s| s.result.clone()))
    }

    /// # Errors
    ///
    /// Returns `GatewayError::Transport` if the backend lock is poisoned.
    pub fn stored_client_state(
        &self,
        session_id: SessionId,
    ) -> Result<Option<ClientState>, GatewayError> {
        Ok(self
            .lock()?
            .sessions
            .get(&session_id)
            .and_then(|s| s.client_state.clone()))
    }
}

#[async_trait]
impl SessionValidator for InMemoryBackend {
    async fn validate(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<SessionSnapshot, GatewayError> {
        let mut state = self.lock()?;
        state.enter(Operation::Validate)?;
        // Unknown sessions answer 401 like a bad token.
        let session = authorize(&mut state.sessions, credentials)
            .map_err(|_| GatewayError::rejected(401, "session_token_invalido"))?;
        Ok(SessionSnapshot::new(session.status.clone()))
    }
}

#[async_trait]
impl CustomizationResolver for InMemoryBackend {
    async fn fetch_customization(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<CustomizationPayload, GatewayError> {
        let mut state = self.lock()?;
        state.enter(Operation::Customization)?;
        let session = authorize(&mut state.sessions, credentials)?;
        session.require_active()?;
        Ok(CustomizationPayload {
            customization: session.customization.clone(),
            preview_mode: session.preview_mode,
        })
    }
}

#[async_trait]
impl QuestionSupplier for InMemoryBackend {
    async fn next_question(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<NextQuestion, GatewayError> {
        let mut state = self.lock()?;
        state.enter(Operation::NextQuestion)?;
        let shuffle = state.shuffle;
        let clock = state.clock;
        let BackendState {
            sessions,
            questions,
            ..
        } = &mut *state;
        let session = authorize(sessions, credentials)?;
        session.require_active()?;

        if let Some(idx) = session.trivia.current {
            return Ok(NextQuestion::Question(questions[idx].question.clone()));
        }

        let max_questions = session.rules().max_questions as usize;
        if session.trivia.asked.len() >= max_questions {
            return Ok(NextQuestion::Finished(session.close_trivia(clock)));
        }

        let candidates: Vec<usize> = questions
            .iter()
            .enumerate()
            .filter(|(_, q)| !session.trivia.asked.contains(&q.question.id))
            .map(|(idx, _)| idx)
            .collect();
        let pick = if shuffle {
            candidates.choose(&mut rand::rng()).copied()
        } else {
            candidates.first().copied()
        };
        let Some(idx) = pick else {
            return Ok(NextQuestion::Finished(session.close_trivia(clock)));
        };

        let question = questions[idx].question.clone();
        session.trivia.current = Some(idx);
        session.trivia.asked.push(question.id);
        Ok(NextQuestion::Question(question))
    }

    async fn submit_answer(
        &self,
        credentials: &SessionCredentials,
        choice: ChoiceId,
    ) -> Result<AnswerReceipt, GatewayError> {
        let mut state = self.lock()?;
        state.enter(Operation::SubmitAnswer)?;
        let BackendState {
            sessions,
            questions,
            ..
        } = &mut *state;
        let session = authorize(sessions, credentials)?;
        session.require_active()?;

        let Some(idx) = session.trivia.current else {
            return Err(GatewayError::rejected(409, "no_hay_pregunta_actual"));
        };
        let is_correct = questions[idx].correct == choice;
        let points = session.rules().points_per_correct;

        let trivia = &mut session.trivia;
        trivia.answered = trivia.answered.saturating_add(1);
        if is_correct {
            trivia.score = trivia.score.saturating_add(points);
            trivia.correct = trivia.correct.saturating_add(1);
        }
        trivia.current = None;

        Ok(AnswerReceipt {
            correct: is_correct,
            score: Some(trivia.score),
            answered: Some(trivia.answered),
            correct_count: Some(trivia.correct),
            done: false,
        })
    }
}

#[async_trait]
impl RankingSupplier for InMemoryBackend {
    async fn ranking(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<Vec<RankingEntry>, GatewayError> {
        let mut state = self.lock()?;
        state.enter(Operation::Ranking)?;
        let company = authorize(&mut state.sessions, credentials)?
            .player
            .as_ref()
            .map(|player| player.company.clone())
            .ok_or_else(|| GatewayError::rejected(409, "usuario_sin_company"))?;

        let mut entries: Vec<RankingEntry> = state
            .sessions
            .values()
            .filter_map(|session| session.ranking_entry(&company))
            .collect();
        // Ties go to whoever finished first.
        entries.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.ended_at.cmp(&b.ended_at))
                .then_with(|| a.username.cmp(&b.username))
        });
        entries.truncate(RANKING_SIZE);
        Ok(entries)
    }
}

#[async_trait]
impl WordSupplier for InMemoryBackend {
    async fn sticky_word(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<HangmanWord, GatewayError> {
        let mut state = self.lock()?;
        state.enter(Operation::StickyWord)?;
        let shuffle = state.shuffle;
        let BackendState {
            sessions, words, ..
        } = &mut *state;
        let session = authorize(sessions, credentials)?;
        session.require_active()?;

        if let Some(word) = &session.word {
            return Ok(word.clone());
        }
        let pick = if shuffle {
            words.choose(&mut rand::rng())
        } else {
            words.first()
        };
        let word = pick
            .cloned()
            .ok_or_else(|| GatewayError::rejected(409, "sin_palabras_cargadas"))?;
        session.word = Some(word.clone());
        Ok(word)
    }
}

#[async_trait]
impl SessionFinalizer for InMemoryBackend {
    async fn finalize(
        &self,
        credentials: &SessionCredentials,
        request: &FinalizeRequest,
    ) -> Result<SessionSnapshot, GatewayError> {
        let mut state = self.lock()?;
        state.enter(Operation::Finalize)?;
        let clock = state.clock;
        let session = authorize(&mut state.sessions, credentials)?;

        if session.status == SessionStatus::Finished {
            return Ok(SessionSnapshot::new(SessionStatus::Finished));
        }
        session.require_active()?;

        session.client_state = Some(request.client_state.clone());
        session.close(request.result.clone(), clock);
        Ok(SessionSnapshot::new(SessionStatus::Finished))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runner_core::model::{Choice, Outcome, SessionToken};
    use chrono::Duration;
    use runner_core::time::{fixed_clock, fixed_now};
    use serde_json::json;

    fn creds() -> SessionCredentials {
        SessionCredentials::new(
            SessionId::random(),
            UserId::new(7),
            SessionToken::parse("tok").unwrap(),
        )
    }

    fn question(id: u64) -> Question {
        Question {
            id: QuestionId::new(id),
            text: format!("Q{id}"),
            choices: vec![
                Choice {
                    id: ChoiceId::new(id * 10),
                    text: "right".into(),
                },
                Choice {
                    id: ChoiceId::new(id * 10 + 1),
                    text: "wrong".into(),
                },
            ],
        }
    }

    fn seeded(max_questions: u32) -> (InMemoryBackend, SessionCredentials) {
        let backend = InMemoryBackend::new();
        let creds = creds();
        backend
            .open_session(&creds, json!({ "rules": { "max_questions": max_questions } }), false)
            .unwrap();
        for id in 1..=3 {
            backend.add_question(question(id), ChoiceId::new(id * 10)).unwrap();
        }
        (backend, creds)
    }

    #[tokio::test]
    async fn pending_question_is_returned_until_answered() {
        let (backend, creds) = seeded(10);
        let first = backend.next_question(&creds).await.unwrap();
        let again = backend.next_question(&creds).await.unwrap();
        assert_eq!(first, again);
    }

    #[tokio::test]
    async fn answer_scores_and_clears_current() {
        let (backend, creds) = seeded(10);
        backend.next_question(&creds).await.unwrap();
        let receipt = backend.submit_answer(&creds, ChoiceId::new(10)).await.unwrap();
        assert!(receipt.correct);
        assert_eq!(receipt.score, Some(100));
        assert_eq!(receipt.answered, Some(1));

        let err = backend.submit_answer(&creds, ChoiceId::new(10)).await.unwrap_err();
        assert_eq!(err.code(), Some("no_hay_pregunta_actual"));
    }

    #[tokio::test]
    async fn closes_session_after_max_questions() {
        let (backend, creds) = seeded(1);
        backend.next_question(&creds).await.unwrap();
        backend.submit_answer(&creds, ChoiceId::new(11)).await.unwrap();

        let next = backend.next_question(&creds).await.unwrap();
        let NextQuestion::Finished(result) = next else {
            panic!("expected finished");
        };
        assert_eq!(result.answered, 1);
        assert_eq!(result.score, 0);
        assert_eq!(
            backend.session_status(creds.session_id()).unwrap(),
            Some(SessionStatus::Finished)
        );
    }

    #[tokio::test]
    async fn huge_points_saturate_the_score() {
        let backend = InMemoryBackend::new();
        let creds = creds();
        backend
            .open_session(&creds, json!({ "rules": { "points_per_correct": 4_000_000_000u64 } }), false)
            .unwrap();
        for id in 1..=2 {
            backend.add_question(question(id), ChoiceId::new(id * 10)).unwrap();
        }

        for id in 1..=2 {
            backend.next_question(&creds).await.unwrap();
            backend.submit_answer(&creds, ChoiceId::new(id * 10)).await.unwrap();
        }
        let NextQuestion::Finished(result) = backend.next_question(&creds).await.unwrap() else {
            panic!("expected finished");
        };
        assert_eq!(result.score, u32::MAX);
        assert_eq!(result.correct, 2);
    }

    #[test]
    fn question_must_offer_its_correct_choice() {
        let backend = InMemoryBackend::new();
        let err = backend.add_question(question(1), ChoiceId::new(99)).unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert_eq!(err.code(), Some("pregunta_sin_correcta"));

        let bare = Question {
            choices: Vec::new(),
            ..question(2)
        };
        let err = backend.add_question(bare, ChoiceId::new(20)).unwrap_err();
        assert_eq!(err.code(), Some("pregunta_sin_opciones"));
    }

    fn finished_trivia(backend: &InMemoryBackend, player: Player, score: u32) -> SessionCredentials {
        let creds = creds();
        backend.open_session(&creds, json!({}), false).unwrap();
        backend.register_player(creds.session_id(), player).unwrap();
        backend
            .record_result(
                creds.session_id(),
                FinalResult::Trivia(TriviaResult {
                    score,
                    answered: 3,
                    correct: score / 100,
                    outcome: Some(Outcome::Completed),
                }),
            )
            .unwrap();
        creds
    }

    #[tokio::test]
    async fn ranking_orders_company_sessions_by_score() {
        let backend = InMemoryBackend::new();
        backend.set_clock(fixed_clock()).unwrap();
        let own = finished_trivia(&backend, Player::new("ana", "acme"), 200);
        finished_trivia(&backend, Player::new("leo", "acme"), 300);
        finished_trivia(&backend, Player::new("eva", "globex"), 900);

        // Still playing: not ranked.
        let playing = creds();
        backend.open_session(&playing, json!({}), false).unwrap();
        backend.register_player(playing.session_id(), Player::new("max", "acme")).unwrap();

        let ranking = backend.ranking(&own).await.unwrap();
        let names: Vec<&str> = ranking.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, ["leo", "ana"]);
        assert_eq!(ranking[0].score, 300);
        assert_eq!(ranking[0].ended_at, Some(fixed_now()));
    }

    #[tokio::test]
    async fn ranking_keeps_the_top_ten_and_breaks_ties_by_end_time() {
        let backend = InMemoryBackend::new();
        backend.set_clock(fixed_clock()).unwrap();
        let early = finished_trivia(&backend, Player::new("zoe", "acme"), 500);
        backend
            .set_clock(Clock::fixed(fixed_now() + Duration::minutes(5)))
            .unwrap();
        finished_trivia(&backend, Player::new("abe", "acme"), 500);
        for n in 0..12 {
            finished_trivia(&backend, Player::new(format!("p{n}"), "acme"), 100 + n);
        }

        let ranking = backend.ranking(&early).await.unwrap();
        assert_eq!(ranking.len(), RANKING_SIZE);
        assert_eq!(ranking[0].username, "zoe");
        assert_eq!(ranking[1].username, "abe");
        assert_eq!(ranking[2].score, 111);
    }

    #[tokio::test]
    async fn ranking_is_served_for_finished_sessions_only_with_a_company() {
        let (backend, creds) = seeded(1);
        let err = backend.ranking(&creds).await.unwrap_err();
        assert_eq!(err.code(), Some("usuario_sin_company"));

        backend.register_player(creds.session_id(), Player::new("ana", "acme")).unwrap();
        backend.next_question(&creds).await.unwrap();
        backend.submit_answer(&creds, ChoiceId::new(10)).await.unwrap();
        backend.next_question(&creds).await.unwrap();
        assert_eq!(
            backend.session_status(creds.session_id()).unwrap(),
            Some(SessionStatus::Finished)
        );

        let ranking = backend.ranking(&creds).await.unwrap();
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].score, 100);
        assert_eq!(backend.calls().unwrap().ranking, 2);
    }

    #[tokio::test]
    async fn bad_token_is_rejected() {
        let (backend, creds) = seeded(10);
        let other = SessionCredentials::new(
            creds.session_id(),
            creds.user_id(),
            SessionToken::parse("nope").unwrap(),
        );
        let err = backend.validate(&other).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn word_is_sticky() {
        let (backend, creds) = seeded(10);
        backend.add_word(HangmanWord::new("casa", "hogar").unwrap()).unwrap();
        backend.add_word(HangmanWord::new("perro", "").unwrap()).unwrap();
        backend.set_shuffle(true).unwrap();

        let first = backend.sticky_word(&creds).await.unwrap();
        for _ in 0..5 {
            assert_eq!(backend.sticky_word(&creds).await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn empty_word_bank_is_a_conflict() {
        let (backend, creds) = seeded(10);
        let err = backend.sticky_word(&creds).await.unwrap_err();
        assert_eq!(err.code(), Some("sin_palabras_cargadas"));
    }

    #[tokio::test]
    async fn finalize_is_idempotent_for_finished_sessions() {
        let (backend, creds) = seeded(10);
        let request = FinalizeRequest::new(
            FinalResult::Trivia(TriviaResult {
                score: 1,
                answered: 1,
                correct: 1,
                outcome: Some(Outcome::Completed),
            }),
            Outcome::Completed,
            fixed_now(),
        );
        backend.finalize(&creds, &request).await.unwrap();
        let snapshot = backend.finalize(&creds, &request).await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Finished);
        assert_eq!(backend.calls().unwrap().finalize, 2);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let (backend, creds) = seeded(10);
        backend
            .fail_next(Operation::Validate, GatewayError::Transport("down".into()))
            .unwrap();
        assert!(backend.validate(&creds).await.is_err());
        assert!(backend.validate(&creds).await.is_ok());
        assert_eq!(backend.calls().unwrap().validate, 2);
    }
}
