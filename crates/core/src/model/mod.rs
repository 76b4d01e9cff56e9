pub mod customization;
pub mod finalize;
pub mod hangman;
mod ids;
pub mod progress;
pub mod question;
pub mod session;

pub use ids::{ChoiceId, ParseIdError, QuestionId, SessionId, UserId};

pub use customization::{
    deep_merge, merge_customization, Branding, EffectiveConfig, Rules, Texts, Visual, Watermark,
    WatermarkPosition,
};
pub use finalize::{
    ClientState, FinalResult, FinalizeRequest, Outcome, RunSummary, RunSummaryError, RunTotals,
};
pub use hangman::{GuessResult, HangmanBoard, Letter, LetterError, MAX_MISTAKES};
pub use progress::{ProgressSnapshot, RunnerProgress};
pub use question::{
    AnswerReceipt, Choice, HangmanWord, NextQuestion, Question, RankingEntry, TriviaResult,
    WordError, RANKING_SIZE,
};
pub use session::{
    ReadinessError, SessionCredentials, SessionSnapshot, SessionStatus, SessionToken,
};
