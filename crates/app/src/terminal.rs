//! Line-oriented terminal front end for both runners.

use std::error::Error;
use std::io::{self, Stdout, Write};

use runner_core::model::{ChoiceId, RankingEntry, ReadinessError, Texts, Watermark};
use services::{
    GuessOutcome, HangmanRunner, HangmanView, RunnerError, RunnerState, TimerEvents,
    TriviaRunner, TriviaView,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

type AppResult = Result<(), Box<dyn Error>>;

/// Player input during a trivia round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TriviaInput {
    Pick(usize),
    Next,
    Quit,
    Unknown,
}

impl TriviaInput {
    fn parse(line: &str) -> Self {
        match line.trim() {
            "n" | "N" => Self::Next,
            "q" | "Q" => Self::Quit,
            other => other
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map_or(Self::Unknown, Self::Pick),
        }
    }
}

struct Screen {
    out: Stdout,
}

impl Screen {
    /// Fails when stdout cannot take output at all.
    fn open() -> Result<Self, ReadinessError> {
        let mut out = io::stdout();
        out.flush()
            .map_err(|_| ReadinessError::MissingSurface { name: "stdout" })?;
        Ok(Self { out })
    }

    fn banner(&mut self, texts: &Texts, watermark: Option<&Watermark>) -> io::Result<()> {
        writeln!(self.out, "== {} ==", texts.welcome_title)?;
        if !texts.welcome_subtitle.is_empty() {
            writeln!(self.out, "{}", texts.welcome_subtitle)?;
        }
        if let Some(watermark) = watermark {
            writeln!(self.out, "[{}]", watermark.text)?;
        }
        self.out.flush()
    }

    fn trivia(&mut self, view: &TriviaView) -> io::Result<()> {
        writeln!(self.out)?;
        let mut header = format!("Score {} · Answered {}", view.score, view.answered);
        if view.max_questions > 0 {
            header.push_str(&format!("/{}", view.max_questions));
        }
        if let Some(lives) = view.lives_remaining {
            header.push_str(&format!(" · Lives {lives}"));
        }
        writeln!(self.out, "-- {header} --")?;

        if let Some(question) = &view.question {
            writeln!(self.out, "{}", question.text)?;
            for (n, choice) in question.choices.iter().enumerate() {
                writeln!(self.out, "  {}) {}", n + 1, choice.text)?;
            }
        }
        if let Some(status) = &view.status {
            writeln!(self.out, "{status}")?;
        }
        if let Some(timer) = view.timer.filter(|t| !t.expired) {
            writeln!(self.out, "{}s left", timer.remaining)?;
        }

        let mut hints = Vec::new();
        if view.choices_enabled {
            hints.push("number = answer");
        }
        if view.results_ready {
            hints.push("n = results");
        } else if view.next_enabled {
            hints.push("n = next");
        }
        if !view.state.is_terminal() {
            hints.push("q = quit");
        }
        if !hints.is_empty() {
            writeln!(self.out, "({})", hints.join(", "))?;
        }
        self.out.flush()
    }

    fn tick(&mut self, view: &TriviaView) -> io::Result<()> {
        match view.timer {
            Some(timer) if timer.expired => {
                if let Some(status) = &view.status {
                    writeln!(self.out, "{status}")?;
                }
            }
            Some(timer) if timer.remaining <= 5 || timer.remaining % 10 == 0 => {
                writeln!(self.out, "{}s left", timer.remaining)?;
            }
            _ => {}
        }
        self.out.flush()
    }

    fn ranking(&mut self, entries: &[RankingEntry]) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "-- Ranking --")?;
        if entries.is_empty() {
            writeln!(self.out, "No finished games yet.")?;
        }
        for (place, entry) in (1..).zip(entries) {
            writeln!(
                self.out,
                "{place:>2}. {:<16} {:>6}  ({}/{})",
                entry.username, entry.score, entry.correct, entry.answered
            )?;
        }
        self.out.flush()
    }

    fn hangman(&mut self, view: &HangmanView) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "{}", view.masked)?;
        if let Some(hint) = &view.hint {
            writeln!(self.out, "Hint: {hint}")?;
        }
        let wrong: String = view.wrong_letters.iter().collect();
        writeln!(
            self.out,
            "Mistakes {}/{}  {}",
            view.mistakes, view.max_mistakes, wrong
        )?;
        if let Some(status) = &view.status {
            writeln!(self.out, "{status}")?;
        }
        if view.input_enabled {
            writeln!(self.out, "(one letter per line)")?;
        } else if view.restart_allowed {
            writeln!(self.out, "(start a new game from the catalog)")?;
        }
        self.out.flush()
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }
}

/// Runner errors that only need a redraw; terminal ones end the loop.
fn keep_playing(err: &RunnerError) -> bool {
    debug!(error = %err, "runner rejected action");
    !err.is_terminal()
}

// ─── TRIVIA ────────────────────────────────────────────────────────────────────

/// Drive a trivia session until it is done or the player quits.
///
/// # Errors
///
/// Returns an error when the session cannot start or the terminal fails.
pub async fn play_trivia(mut runner: TriviaRunner, mut events: TimerEvents) -> AppResult {
    let mut screen = Screen::open()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if let Err(err) = runner.load().await {
        screen.trivia(&runner.view())?;
        return Err(err.into());
    }
    let view = runner.view();
    screen.banner(&view.texts, view.watermark.as_ref())?;
    if let Err(err) = runner.next_question().await {
        debug!(error = %err, "first question unavailable");
    }
    screen.trivia(&runner.view())?;

    while !runner.state().is_terminal() {
        tokio::select! {
            Some(event) = events.recv() => {
                if runner.apply_timer_event(event) {
                    screen.tick(&runner.view())?;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let result = match TriviaInput::parse(&line) {
                    TriviaInput::Quit => break,
                    TriviaInput::Unknown => {
                        screen.line("?")?;
                        continue;
                    }
                    TriviaInput::Next => runner.next_question().await.map(drop),
                    TriviaInput::Pick(n) => match choice_at(&runner, n) {
                        Some(choice) => runner.submit_answer(choice).await.map(drop),
                        None => {
                            screen.line("No such option.")?;
                            continue;
                        }
                    },
                };
                if let Err(err) = result {
                    if !keep_playing(&err) {
                        screen.trivia(&runner.view())?;
                        break;
                    }
                }
                screen.trivia(&runner.view())?;
            }
        }
    }

    runner.teardown();
    if let Ok(summary) = runner.summary() {
        screen.line(&format!(
            "Final score {} ({} of {} correct)",
            summary.score(),
            summary.correct(),
            summary.answered()
        ))?;
    }
    if runner.state() == RunnerState::Done {
        match runner.load_ranking().await {
            Ok(entries) => screen.ranking(entries)?,
            Err(err) => debug!(error = %err, "ranking not shown"),
        }
    }
    Ok(())
}

fn choice_at(runner: &TriviaRunner, n: usize) -> Option<ChoiceId> {
    runner
        .current_question()
        .and_then(|question| question.choices.get(n - 1))
        .map(|choice| choice.id)
}

// ─── HANGMAN ───────────────────────────────────────────────────────────────────

/// Drive a hangman round until it is won, lost, or stdin closes.
///
/// # Errors
///
/// Returns an error when the session cannot start or the terminal fails.
pub async fn play_hangman(mut runner: HangmanRunner) -> AppResult {
    let mut screen = Screen::open()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if let Err(err) = runner.load().await {
        screen.hangman(&runner.view())?;
        return Err(err.into());
    }
    let view = runner.view();
    screen.banner(&view.texts, view.watermark.as_ref())?;
    screen.hangman(&view)?;

    while !runner.state().is_terminal() {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match runner.play(&line).await {
            Ok(GuessOutcome::Applied(_)) => screen.hangman(&runner.view())?,
            Ok(GuessOutcome::Invalid(_) | GuessOutcome::Repeated(_)) => {}
            Err(err) => {
                if !keep_playing(&err) {
                    screen.hangman(&runner.view())?;
                    break;
                }
            }
        }
    }

    if let Ok(summary) = runner.summary() {
        screen.line(&format!(
            "{} mistakes{}",
            summary.mistakes(),
            if summary.finalized() { "" } else { " (result not saved)" }
        ))?;
    }
    Ok(())
}
