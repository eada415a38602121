//! Async loop that feeds learner events and countdown ticks into one attempt.

use std::time::Duration;

use tokio::sync::mpsc;

use quiz_core::session::SessionProgress;
use quiz_core::{SessionError, SessionEvent, SessionStatus, Transition};

use crate::timer::{CountdownTimer, TICK_PERIOD};
use crate::{AttemptServiceError, AttemptSession, QuizAttemptService};

/// Notifications for whoever renders the attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverUpdate {
    Applied {
        event: &'static str,
        transition: Transition,
        progress: SessionProgress,
    },
    Rejected {
        event: &'static str,
        error: SessionError,
    },
    /// The attempt completed but could not be stored.
    StoreFailed(String),
}

enum Step {
    Tick,
    Event(Option<SessionEvent>),
}

/// Owns a running attempt and its countdown.
///
/// The timer exists only while the session is in progress: it is released as
/// soon as the attempt is submitted, expires, or is abandoned, and when the
/// driver itself is dropped.
pub struct QuizDriver {
    service: QuizAttemptService,
    attempt: AttemptSession,
    timer: Option<CountdownTimer>,
    tick_period: Duration,
    updates: Option<mpsc::UnboundedSender<DriverUpdate>>,
}

impl QuizDriver {
    #[must_use]
    pub fn new(service: QuizAttemptService, attempt: AttemptSession) -> Self {
        Self {
            service,
            attempt,
            timer: None,
            tick_period: TICK_PERIOD,
            updates: None,
        }
    }

    #[must_use]
    pub fn with_tick_period(mut self, tick_period: Duration) -> Self {
        self.tick_period = tick_period;
        self
    }

    #[must_use]
    pub fn with_updates(mut self, updates: mpsc::UnboundedSender<DriverUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    #[must_use]
    pub fn attempt(&self) -> &AttemptSession {
        &self.attempt
    }

    #[must_use]
    pub fn is_timer_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Drive the attempt until it completes.
    ///
    /// Learner events and ticks go through the same service call, one at a
    /// time. Rejected events are reported and the loop carries on. If the
    /// event channel closes while the attempt is running, the attempt is
    /// abandoned.
    ///
    /// The returned attempt may still need [`QuizAttemptService::finalize`]
    /// if storing it failed.
    pub async fn run(mut self, mut events: mpsc::Receiver<SessionEvent>) -> AttemptSession {
        self.sync_timer();

        while !self.attempt.is_complete() {
            let step = tokio::select! {
                Some(()) = next_tick(&mut self.timer) => Step::Tick,
                event = events.recv() => Step::Event(event),
            };

            let event = match step {
                Step::Tick => SessionEvent::Tick,
                Step::Event(Some(event)) => event,
                Step::Event(None) => {
                    if self.attempt.session().status() != SessionStatus::InProgress {
                        break;
                    }
                    log::warn!("event channel closed; abandoning attempt");
                    SessionEvent::Abandon
                }
            };
            self.handle(event).await;
        }

        self.release_timer();
        self.attempt
    }

    /// Apply one event through the service and report the outcome.
    ///
    /// [`Self::run`] calls this for every event and tick. Callers that own
    /// their event loop can call it directly; the countdown is started on
    /// the first call that finds the attempt in progress and released once
    /// it is not.
    pub async fn handle(&mut self, event: SessionEvent) {
        self.sync_timer();
        let name = event.name();
        let was_complete = self.attempt.is_complete();
        let outcome = self.service.apply(&mut self.attempt, event).await;
        self.sync_timer();

        match outcome {
            Ok(update) => {
                if matches!(update.transition, Transition::Ticked { .. }) {
                    log::debug!("{}s left", self.attempt.session().remaining_seconds());
                }
                self.notify(DriverUpdate::Applied {
                    event: name,
                    transition: update.transition,
                    progress: self.attempt.session().progress(),
                });
            }
            Err(AttemptServiceError::Session(error)) => {
                log::debug!("{name} rejected: {error}");
                self.notify(DriverUpdate::Rejected { event: name, error });
            }
            Err(other) => {
                // The session may have completed before the write failed.
                if !was_complete {
                    if let Some(reason) = self.attempt.session().completion() {
                        self.notify(DriverUpdate::Applied {
                            event: name,
                            transition: Transition::Completed(reason),
                            progress: self.attempt.session().progress(),
                        });
                    }
                }
                self.notify(DriverUpdate::StoreFailed(other.to_string()));
            }
        }
    }

    fn sync_timer(&mut self) {
        let armed = self.attempt.session().is_timer_armed();
        if armed && self.timer.is_none() {
            self.timer = Some(CountdownTimer::start(self.tick_period));
        } else if !armed {
            self.release_timer();
        }
    }

    fn release_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }
    }

    fn notify(&self, update: DriverUpdate) {
        if let Some(updates) = &self.updates {
            let _ = updates.send(update);
        }
    }
}

async fn next_tick(timer: &mut Option<CountdownTimer>) -> Option<()> {
    match timer {
        Some(timer) => timer.tick().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quiz_core::model::{
        Answer, LearnerId, QuestionDraft, QuestionId, QuestionKind, Quiz, QuizId,
    };
    use quiz_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;
    use tokio::task::AbortHandle;

    use super::*;

    fn quiz() -> Arc<Quiz> {
        let question = QuestionDraft {
            id: QuestionId::new(1),
            prompt: "Water boils at 100 C at sea level.".into(),
            kind: QuestionKind::TrueFalse,
            options: Vec::new(),
            correct_answer: Answer::single("True"),
            points: 1,
            explanation: None,
        }
        .validate()
        .unwrap();
        Arc::new(Quiz::new(QuizId::new(7), "Boiling", vec![question], 30, 50, 3).unwrap())
    }

    async fn driver() -> QuizDriver {
        let service = QuizAttemptService::new(fixed_clock(), Arc::new(InMemoryRepository::new()));
        let attempt = service
            .start_attempt(quiz(), LearnerId::new(1))
            .await
            .unwrap();
        QuizDriver::new(service, attempt)
    }

    fn timer_task(driver: &QuizDriver) -> AbortHandle {
        driver.timer.as_ref().map(CountdownTimer::task).unwrap()
    }

    async fn ended(task: &AbortHandle) -> bool {
        for _ in 0..8 {
            if task.is_finished() {
                return true;
            }
            tokio::task::yield_now().await;
        }
        task.is_finished()
    }

    #[tokio::test(start_paused = true)]
    async fn submit_releases_the_countdown() {
        let mut driver = driver().await;
        driver.handle(SessionEvent::Flag(QuestionId::new(1))).await;
        assert!(driver.is_timer_running());
        let task = timer_task(&driver);

        driver.handle(SessionEvent::Submit).await;
        assert!(!driver.is_timer_running());
        assert!(ended(&task).await);

        driver.handle(SessionEvent::Tick).await;
        assert!(!driver.is_timer_running());
    }

    #[tokio::test(start_paused = true)]
    async fn abandon_releases_the_countdown() {
        let mut driver = driver().await;
        driver.handle(SessionEvent::Next).await;
        let task = timer_task(&driver);

        driver.handle(SessionEvent::Abandon).await;
        assert!(!driver.is_timer_running());
        assert!(ended(&task).await);
        assert_eq!(driver.attempt().session().status(), SessionStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_waits_for_start_before_counting_down() {
        let mut driver = driver().await;
        driver.handle(SessionEvent::Submit).await;
        driver.handle(SessionEvent::Restart).await;
        assert!(!driver.is_timer_running());

        driver.handle(SessionEvent::Start).await;
        assert!(driver.is_timer_running());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_driver_ends_the_countdown_task() {
        let mut driver = driver().await;
        driver.handle(SessionEvent::Next).await;
        let task = timer_task(&driver);
        assert!(!ended(&task).await);

        drop(driver);
        assert!(ended(&task).await);
    }
}
