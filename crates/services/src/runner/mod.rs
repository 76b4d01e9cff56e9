mod bootstrap;
mod finalize;
mod hangman;
mod state;
mod timer;
mod trivia;
mod view;

// Public API of the runner subsystem.
pub use bootstrap::{resolve_config, validate_session};
pub use finalize::{FinalizeGuard, FinalizeStatus};
pub use hangman::{GuessOutcome, HangmanRunner};
pub use state::{Applied, RunnerState, Ticket};
pub use timer::{Countdown, TimerEvent, TimerEvents};
pub use trivia::TriviaRunner;
pub use view::{HangmanView, StatusMessage, TimerView, TriviaView};
