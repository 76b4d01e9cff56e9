//! Offline backend for `--demo`: one active session and a small content bank.

use gateway::{GatewayError, InMemoryBackend, Player};
use runner_core::model::{
    Choice, ChoiceId, FinalResult, HangmanWord, Outcome, Question, QuestionId,
    SessionCredentials, SessionId, SessionToken, TriviaResult, UserId,
};
use serde_json::json;

use crate::Command;

const DEMO_USER: u64 = 1;
const DEMO_TOKEN: &str = "demo-session-token";
const DEMO_COMPANY: &str = "Demo Co";

/// Earlier finished trivia runs of the demo company: `(username, score, correct)`.
const RIVALS: &[(&str, u32, u32)] = &[("marta", 400, 4), ("tomas", 300, 3), ("lucia", 100, 1)];

/// `(prompt, options, index of the correct option)`
const QUESTIONS: &[(&str, &[&str], usize)] = &[
    ("Which planet is known as the red planet?", &["Venus", "Mars", "Jupiter", "Mercury"], 1),
    ("How many sides does a hexagon have?", &["Five", "Six", "Seven", "Eight"], 1),
    ("What is the chemical symbol for gold?", &["Ag", "Gd", "Au", "Go"], 2),
    ("Which ocean is the largest?", &["Atlantic", "Indian", "Arctic", "Pacific"], 3),
    ("In which year did the first Moon landing happen?", &["1969", "1972", "1965", "1959"], 0),
    ("What is the capital of Canada?", &["Toronto", "Vancouver", "Ottawa", "Montreal"], 2),
    ("Which gas do plants absorb from the air?", &["Oxygen", "Nitrogen", "Helium", "Carbon dioxide"], 3),
];

const WORDS: &[(&str, &str)] = &[
    ("guitarra", "Six strings"),
    ("volcán", "It erupts"),
    ("biblioteca", "Full of books"),
    ("montaña", "Tall and rocky"),
];

/// Build a seeded backend with a fresh active session for `game`.
///
/// # Errors
///
/// Returns an error if the seed data is rejected by the backend.
pub fn seed(
    game: Command,
) -> Result<(InMemoryBackend, SessionCredentials), Box<dyn std::error::Error>> {
    let backend = InMemoryBackend::new();
    backend.set_shuffle(true)?;

    let credentials = SessionCredentials::new(
        SessionId::random(),
        UserId::new(DEMO_USER),
        SessionToken::parse(DEMO_TOKEN)?,
    );
    let customization = match game {
        Command::Trivia => json!({
            "texts": { "welcome_title": "Demo trivia" },
            "rules": {
                "show_timer": true,
                "timer_seconds": 20,
                "points_per_correct": 100,
                "max_questions": 5,
                "use_lives": true,
                "lives": 3
            }
        }),
        Command::Hangman => json!({
            "texts": { "welcome_title": "Demo hangman" }
        }),
    };
    backend.open_session(&credentials, customization, true)?;
    backend.register_player(credentials.session_id(), Player::new("you", DEMO_COMPANY))?;

    seed_questions(&backend)?;
    seed_rivals(&backend, credentials.token())?;
    for (word, hint) in WORDS {
        backend.add_word(HangmanWord::new(word, hint)?)?;
    }

    Ok((backend, credentials))
}

fn seed_rivals(backend: &InMemoryBackend, token: &SessionToken) -> Result<(), GatewayError> {
    for (user, (username, score, correct)) in (DEMO_USER + 1..).zip(RIVALS) {
        let credentials = SessionCredentials::new(
            SessionId::random(),
            UserId::new(user),
            token.clone(),
        );
        backend.open_session(&credentials, json!({}), false)?;
        backend.register_player(credentials.session_id(), Player::new(*username, DEMO_COMPANY))?;
        backend.record_result(
            credentials.session_id(),
            FinalResult::Trivia(TriviaResult {
                score: *score,
                answered: 5,
                correct: *correct,
                outcome: Some(Outcome::Completed),
            }),
        )?;
    }
    Ok(())
}

fn seed_questions(backend: &InMemoryBackend) -> Result<(), GatewayError> {
    let mut next_choice = 1;
    for (number, (prompt, options, correct)) in (1..).zip(QUESTIONS) {
        let choices: Vec<Choice> = options
            .iter()
            .map(|text| {
                let choice = Choice {
                    id: ChoiceId::new(next_choice),
                    text: (*text).to_owned(),
                };
                next_choice += 1;
                choice
            })
            .collect();
        let Some(answer) = choices.get(*correct).map(|choice| choice.id) else {
            continue;
        };
        backend.add_question(
            Question {
                id: QuestionId::new(number),
                text: (*prompt).to_owned(),
                choices,
            },
            answer,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_session_is_active() {
        let (backend, credentials) = seed(Command::Trivia).unwrap();
        assert_eq!(
            backend.session_status(credentials.session_id()).unwrap(),
            Some(runner_core::model::SessionStatus::Active)
        );
    }

    #[tokio::test]
    async fn demo_ranking_lists_rivals() {
        use gateway::RankingSupplier;

        let (backend, credentials) = seed(Command::Trivia).unwrap();
        let ranking = backend.ranking(&credentials).await.unwrap();
        let names: Vec<&str> = ranking.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, ["marta", "tomas", "lucia"]);
    }

    #[test]
    fn every_demo_answer_is_one_of_its_options() {
        for (_, options, correct) in QUESTIONS {
            assert!(*correct < options.len());
        }
    }
}
