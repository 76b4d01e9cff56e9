/// Partial progress reported by the server. `None` fields leave local values untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub answered: Option<u32>,
    pub score: Option<u32>,
    pub correct: Option<u32>,
    pub mistakes: Option<u32>,
}

/// Client-side cache of a session's progress.
///
/// The server is authoritative: [`RunnerProgress::reconcile`] overwrites fields
/// instead of incrementing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerProgress {
    answered: u32,
    score: u32,
    correct: u32,
    mistakes: u32,
    max_questions: u32,
    lives: Option<u32>,
    finished: bool,
}

impl RunnerProgress {
    /// `lives` is `None` when the session does not play with lives.
    #[must_use]
    pub fn new(max_questions: u32, lives: Option<u32>) -> Self {
        Self {
            answered: 0,
            score: 0,
            correct: 0,
            mistakes: 0,
            max_questions: max_questions.max(1),
            lives,
            finished: false,
        }
    }

    /// Replace every field the snapshot provides.
    ///
    /// When the server reports `answered`/`correct` but no explicit mistakes,
    /// mistakes are derived as `answered - correct`.
    pub fn reconcile(&mut self, snapshot: ProgressSnapshot) {
        if let Some(answered) = snapshot.answered {
            self.answered = answered;
        }
        if let Some(score) = snapshot.score {
            self.score = score;
        }
        if let Some(correct) = snapshot.correct {
            self.correct = correct;
        }
        match snapshot.mistakes {
            Some(mistakes) => self.mistakes = mistakes,
            None if snapshot.answered.is_some() || snapshot.correct.is_some() => {
                self.mistakes = self.answered.saturating_sub(self.correct);
            }
            None => {}
        }
    }

    #[must_use]
    pub fn answered(&self) -> u32 {
        self.answered
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn mistakes(&self) -> u32 {
        self.mistakes
    }

    #[must_use]
    pub fn max_questions(&self) -> u32 {
        self.max_questions
    }

    #[must_use]
    pub fn lives_remaining(&self) -> Option<u32> {
        self.lives.map(|lives| lives.saturating_sub(self.mistakes))
    }

    /// True once the failure threshold (lives or mistakes) is reached.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.lives_remaining() == Some(0)
    }

    /// Every question of the round has an answer; the next request closes it.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.answered >= self.max_questions
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn mark_finished(&mut self) {
        self.finished = true;
    }
}
