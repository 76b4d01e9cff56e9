use std::fmt;
use thiserror::Error;

use crate::model::question::HangmanWord;

/// Wrong guesses allowed before the round is lost.
pub const MAX_MISTAKES: u32 = 6;

const MASK: char = '_';

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum LetterError {
    #[error("no letter given")]
    Empty,
    #[error("only one letter may be guessed at a time")]
    TooLong,
    #[error("not a guessable letter")]
    NotALetter,
}

/// A single uppercase guess in `A-Z` or `Ñ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Letter(char);

impl Letter {
    /// Validate raw player input.
    ///
    /// # Errors
    ///
    /// Returns `LetterError` when the input is blank, longer than one character,
    /// or not a guessable letter.
    pub fn parse(input: &str) -> Result<Self, LetterError> {
        let trimmed = input.trim();
        let mut chars = trimmed.chars();
        let Some(first) = chars.next() else {
            return Err(LetterError::Empty);
        };
        if chars.next().is_some() {
            return Err(LetterError::TooLong);
        }

        let mut upper = first.to_uppercase();
        let (Some(letter), None) = (upper.next(), upper.next()) else {
            return Err(LetterError::NotALetter);
        };
        if is_guessable(letter) {
            Ok(Self(letter))
        } else {
            Err(LetterError::NotALetter)
        }
    }

    #[must_use]
    pub fn as_char(self) -> char {
        self.0
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn is_guessable(ch: char) -> bool {
    ch.is_ascii_uppercase() || ch == 'Ñ'
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessResult {
    Hit,
    Miss,
    /// Already tried; nothing changed.
    Repeated,
}

/// Guess bookkeeping for one hangman round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HangmanBoard {
    secret: Vec<char>,
    hint: Option<String>,
    guessed: Vec<char>,
    wrong: Vec<char>,
}

impl HangmanBoard {
    #[must_use]
    pub fn new(word: &HangmanWord) -> Self {
        Self {
            secret: word.word().chars().collect(),
            hint: word.hint().map(str::to_owned),
            guessed: Vec::new(),
            wrong: Vec::new(),
        }
    }

    pub fn guess(&mut self, letter: Letter) -> GuessResult {
        if self.has_tried(letter) {
            return GuessResult::Repeated;
        }
        let ch = letter.as_char();
        if self.secret.contains(&ch) {
            self.guessed.push(ch);
            GuessResult::Hit
        } else {
            self.wrong.push(ch);
            GuessResult::Miss
        }
    }

    #[must_use]
    pub fn has_tried(&self, letter: Letter) -> bool {
        let ch = letter.as_char();
        self.guessed.contains(&ch) || self.wrong.contains(&ch)
    }

    /// The secret with unguessed letters masked, characters separated by single spaces.
    #[must_use]
    pub fn masked(&self) -> String {
        let mut out = String::with_capacity(self.secret.len() * 2);
        for (idx, ch) in self.secret.iter().enumerate() {
            if idx > 0 {
                out.push(' ');
            }
            out.push(if self.is_revealed(*ch) { *ch } else { MASK });
        }
        out
    }

    fn is_revealed(&self, ch: char) -> bool {
        !is_guessable(ch) || self.guessed.contains(&ch)
    }

    #[must_use]
    pub fn is_won(&self) -> bool {
        self.secret.iter().all(|ch| self.is_revealed(*ch))
    }

    #[must_use]
    pub fn is_lost(&self) -> bool {
        self.mistakes() >= MAX_MISTAKES
    }

    #[must_use]
    pub fn secret(&self) -> String {
        self.secret.iter().collect()
    }

    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Wrong letters in the order they were tried.
    #[must_use]
    pub fn wrong_letters(&self) -> &[char] {
        &self.wrong
    }

    #[must_use]
    pub fn guessed_letters(&self) -> &[char] {
        &self.guessed
    }

    #[must_use]
    pub fn mistakes(&self) -> u32 {
        u32::try_from(self.wrong.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn moves(&self) -> u32 {
        u32::try_from(self.guessed.len() + self.wrong.len()).unwrap_or(u32::MAX)
    }
}
