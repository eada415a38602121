//! One-second countdown source, scoped to a running attempt.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Background task that emits one tick per period.
///
/// The task is aborted when the timer is stopped or dropped, so a timer can
/// never outlive the attempt that owns it.
pub struct CountdownTimer {
    handle: JoinHandle<()>,
    ticks: mpsc::Receiver<()>,
}

impl CountdownTimer {
    /// Spawn the ticking task on the current tokio runtime.
    #[must_use]
    pub fn start(period: Duration) -> Self {
        let (tx, ticks) = mpsc::channel(4);
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });
        Self { handle, ticks }
    }

    /// Wait for the next tick. `None` once the timer has stopped.
    pub async fn tick(&mut self) -> Option<()> {
        self.ticks.recv().await
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.handle.is_finished()
    }

    /// Observer for the ticking task that outlives the timer itself.
    #[cfg(test)]
    pub(crate) fn task(&self) -> tokio::task::AbortHandle {
        self.handle.abort_handle()
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let start = time::Instant::now();
        let mut timer = CountdownTimer::start(TICK_PERIOD);

        for expected in 1..=3 {
            assert_eq!(timer.tick().await, Some(()));
            assert_eq!(start.elapsed(), TICK_PERIOD * expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_tick_stream() {
        let mut timer = CountdownTimer::start(TICK_PERIOD);
        assert_eq!(timer.tick().await, Some(()));

        timer.stop();
        while timer.tick().await.is_some() {}
        assert!(timer.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_timer_aborts_its_task() {
        let mut timer = CountdownTimer::start(TICK_PERIOD);
        assert_eq!(timer.tick().await, Some(()));
        let task = timer.task();

        drop(timer);
        for _ in 0..8 {
            if task.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        // No time has passed, so the task cannot have noticed the closed
        // channel on its own.
        assert!(task.is_finished());
    }
}
