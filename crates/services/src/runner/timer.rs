use std::time::Duration;

use runner_core::model::customization::DEFAULT_TIMER_SECONDS;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

const TICK: Duration = Duration::from_secs(1);

/// One countdown tick. `remaining == 0` marks expiry and is the last event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub generation: u64,
    pub remaining: u32,
}

pub type TimerEvents = mpsc::UnboundedReceiver<TimerEvent>;

/// Zero falls back to the default question time.
#[must_use]
pub fn clamp_seconds(seconds: u32) -> u32 {
    if seconds == 0 {
        DEFAULT_TIMER_SECONDS
    } else {
        seconds
    }
}

/// Per-question countdown running as its own task.
///
/// Dropping the countdown cancels it, so replacing the runner's countdown always
/// stops the previous one.
#[derive(Debug)]
pub struct Countdown {
    generation: u64,
    seconds: u32,
    handle: JoinHandle<()>,
}

impl Countdown {
    /// Spawn a countdown on the current tokio runtime.
    #[must_use]
    pub fn start(generation: u64, seconds: u32, events: mpsc::UnboundedSender<TimerEvent>) -> Self {
        let seconds = clamp_seconds(seconds);
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + TICK, TICK);
            let mut remaining = seconds;
            while remaining > 0 {
                interval.tick().await;
                remaining -= 1;
                if events.send(TimerEvent { generation, remaining }).is_err() {
                    break;
                }
            }
        });
        Self {
            generation,
            seconds,
            handle,
        }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut TimerEvents) -> Vec<TimerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn zero_seconds_uses_default() {
        assert_eq!(clamp_seconds(0), DEFAULT_TIMER_SECONDS);
        assert_eq!(clamp_seconds(5), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_second_until_zero() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let countdown = Countdown::start(1, 3, tx);

        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(drain(&mut rx), vec![TimerEvent { generation: 1, remaining: 2 }]);

        time::sleep(Duration::from_secs(5)).await;
        let rest: Vec<u32> = drain(&mut rx).iter().map(|e| e.remaining).collect();
        assert_eq!(rest, vec![1, 0]);
        assert!(!countdown.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let countdown = Countdown::start(1, 10, tx);
        time::sleep(Duration::from_millis(2500)).await;
        countdown.cancel();
        let before = drain(&mut rx).len();

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(before, 2);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_a_countdown_leaves_one_ticking() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut current = Countdown::start(1, 20, tx.clone());
        time::sleep(Duration::from_millis(2500)).await;

        current = Countdown::start(2, 20, tx);
        drain(&mut rx);
        time::sleep(Duration::from_millis(4500)).await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e.generation == 2));
        assert_eq!(current.generation(), 2);
    }
}
