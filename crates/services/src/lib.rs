#![forbid(unsafe_code)]

pub mod error;
pub mod runner;

pub use runner_core::Clock;

pub use error::RunnerError;
pub use runner::{
    Applied, Countdown, FinalizeGuard, FinalizeStatus, GuessOutcome, HangmanRunner, HangmanView,
    RunnerState, StatusMessage, Ticket, TimerEvent, TimerEvents, TimerView, TriviaRunner,
    TriviaView,
};
