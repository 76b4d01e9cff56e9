use gateway::{Gateway, InMemoryBackend, Player};
use runner_core::model::{
    Choice, ChoiceId, FinalResult, HangmanWord, Outcome, Question, QuestionId, SessionCredentials,
    SessionStatus,
};
use runner_core::time::fixed_clock;
use serde_json::json;
use services::{GuessOutcome, HangmanRunner, RunnerError, RunnerState, TriviaRunner};

const RUNNER_URL: &str = "https://games.example.com/runner/trivia?session_id=0b6d1c9e-2f7a-4c3e-8a5b-9d4e1f2a3b4c&user_id=12&session_token=s3cr3t";

fn credentials() -> SessionCredentials {
    SessionCredentials::from_runner_url(RUNNER_URL).unwrap()
}

fn seed_questions(backend: &InMemoryBackend, count: u64) {
    for id in 1..=count {
        let question = Question {
            id: QuestionId::new(id),
            text: format!("Question {id}"),
            choices: (0..4)
                .map(|n| Choice {
                    id: ChoiceId::new(id * 10 + n),
                    text: format!("Option {n}"),
                })
                .collect(),
        };
        backend.add_question(question, ChoiceId::new(id * 10)).unwrap();
    }
}

#[tokio::test]
async fn trivia_full_run_is_closed_by_the_server() {
    let backend = InMemoryBackend::new();
    let creds = credentials();
    backend
        .open_session(
            &creds,
            json!({ "rules": { "max_questions": 3, "points_per_correct": 50, "use_lives": false } }),
            false,
        )
        .unwrap();
    seed_questions(&backend, 5);

    let (mut runner, _events) =
        TriviaRunner::new(creds.clone(), Gateway::in_memory(&backend), fixed_clock());
    runner.load().await.unwrap();

    let mut picks = 0;
    while runner.state() != RunnerState::Done {
        runner.next_question().await.unwrap();
        let Some(question) = runner.current_question().cloned() else {
            continue;
        };
        let choice = if picks % 2 == 0 {
            question.choices[0].id
        } else {
            question.choices[1].id
        };
        runner.submit_answer(choice).await.unwrap();
        picks += 1;
    }

    let summary = runner.summary().unwrap();
    assert_eq!(summary.answered(), 3);
    assert_eq!(summary.correct(), 2);
    assert_eq!(summary.score(), 100);
    assert_eq!(summary.outcome(), Some(Outcome::Completed));
    assert_eq!(backend.calls().unwrap().finalize, 0);
    assert_eq!(
        backend.session_status(creds.session_id()).unwrap(),
        Some(SessionStatus::Finished)
    );
}

#[tokio::test]
async fn finished_run_sees_its_company_ranking() {
    let backend = InMemoryBackend::new();
    let creds = credentials();
    backend
        .open_session(&creds, json!({ "rules": { "max_questions": 2 } }), false)
        .unwrap();
    backend
        .register_player(creds.session_id(), Player::new("ana", "acme"))
        .unwrap();
    seed_questions(&backend, 2);

    let rival = SessionCredentials::new(
        runner_core::model::SessionId::random(),
        runner_core::model::UserId::new(99),
        creds.token().clone(),
    );
    backend.open_session(&rival, json!({}), false).unwrap();
    backend
        .register_player(rival.session_id(), Player::new("leo", "acme"))
        .unwrap();
    backend
        .record_result(
            rival.session_id(),
            FinalResult::Trivia(runner_core::model::TriviaResult {
                score: 150,
                answered: 2,
                correct: 1,
                outcome: Some(Outcome::Completed),
            }),
        )
        .unwrap();

    let (mut runner, _events) =
        TriviaRunner::new(creds.clone(), Gateway::in_memory(&backend), fixed_clock());
    runner.load().await.unwrap();
    while runner.state() != RunnerState::Done {
        runner.next_question().await.unwrap();
        if let Some(question) = runner.current_question().cloned() {
            runner.submit_answer(question.choices[0].id).await.unwrap();
        }
    }

    let ranking = runner.load_ranking().await.unwrap();
    let rows: Vec<(&str, u32)> = ranking
        .iter()
        .map(|entry| (entry.username.as_str(), entry.score))
        .collect();
    assert_eq!(rows, [("ana", 200), ("leo", 150)]);
}

#[tokio::test]
async fn inactive_session_never_fetches_questions() {
    let backend = InMemoryBackend::new();
    let creds = credentials();
    backend.open_session(&creds, json!({}), false).unwrap();
    seed_questions(&backend, 2);
    backend
        .set_status(creds.session_id(), SessionStatus::Finished)
        .unwrap();

    let (mut runner, _events) =
        TriviaRunner::new(creds, Gateway::in_memory(&backend), fixed_clock());
    let err = runner.load().await.unwrap_err();
    assert!(matches!(err, RunnerError::SessionNotActive { .. }));
    assert_eq!(runner.state(), RunnerState::ErrorTerminal);

    assert!(runner.next_question().await.is_err());
    let calls = backend.calls().unwrap();
    assert_eq!(calls.next_question, 0);
    assert_eq!(calls.customization, 0);
    assert_eq!(calls.finalize, 0);
}

#[tokio::test]
async fn hangman_word_survives_reload_and_finalizes_once() {
    let backend = InMemoryBackend::new();
    backend.set_shuffle(true).unwrap();
    for (word, hint) in [("luna", "satelite"), ("sol", "estrella"), ("mar", "agua")] {
        backend.add_word(HangmanWord::new(word, hint).unwrap()).unwrap();
    }
    let creds = credentials();
    backend.open_session(&creds, json!({}), true).unwrap();

    let mut first = HangmanRunner::new(creds.clone(), Gateway::in_memory(&backend), fixed_clock());
    first.load().await.unwrap();
    let secret = first.board().unwrap().secret();

    // Reload: a fresh runner for the same session sees the same word.
    let mut runner = HangmanRunner::new(creds.clone(), Gateway::in_memory(&backend), fixed_clock());
    runner.load().await.unwrap();
    assert_eq!(runner.board().unwrap().secret(), secret);
    assert!(runner.view().watermark.is_some());

    let mut letters: Vec<char> = secret.chars().collect();
    letters.sort_unstable();
    letters.dedup();
    for letter in letters {
        let outcome = runner.play(&letter.to_string()).await;
        assert!(matches!(outcome, Ok(GuessOutcome::Applied(_)) | Ok(GuessOutcome::Repeated(_))));
    }
    runner.check_terminal().await;
    runner.check_terminal().await;

    assert_eq!(runner.state(), RunnerState::Done);
    assert_eq!(backend.calls().unwrap().finalize, 1);
    match backend.stored_result(creds.session_id()).unwrap() {
        Some(FinalResult::Hangman { outcome, word, mistakes, .. }) => {
            assert_eq!(outcome, Outcome::Win);
            assert_eq!(word, secret);
            assert_eq!(mistakes, 0);
        }
        other => panic!("unexpected stored result: {other:?}"),
    }

    // The first tab keeps playing against a session that is already finished.
    assert!(matches!(first.play("z").await, Ok(GuessOutcome::Applied(_))));
    assert_eq!(
        backend.session_status(creds.session_id()).unwrap(),
        Some(SessionStatus::Finished)
    );
}

#[tokio::test]
async fn running_out_of_lives_finalizes_exactly_once() {
    let backend = InMemoryBackend::new();
    let creds = credentials();
    backend
        .open_session(
            &creds,
            json!({ "rules": { "use_lives": true, "lives": 1, "show_timer": false } }),
            false,
        )
        .unwrap();
    seed_questions(&backend, 4);

    let (mut runner, _events) =
        TriviaRunner::new(creds.clone(), Gateway::in_memory(&backend), fixed_clock());
    runner.load().await.unwrap();
    runner.next_question().await.unwrap();
    let wrong = runner.current_question().unwrap().choices[3].id;
    runner.submit_answer(wrong).await.unwrap();

    assert_eq!(runner.state(), RunnerState::Done);
    assert!(runner.finalize().await.is_none());
    assert_eq!(backend.calls().unwrap().finalize, 1);

    let summary = runner.summary().unwrap();
    assert_eq!(summary.outcome(), Some(Outcome::Lose));
    assert!(summary.finalized());
    assert_eq!(
        backend.session_status(creds.session_id()).unwrap(),
        Some(SessionStatus::Finished)
    );
}
