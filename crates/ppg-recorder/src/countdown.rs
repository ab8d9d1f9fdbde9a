//! Cancellable countdown timers feeding the session event stream

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::debug;

use crate::machine::{CountdownEvent, SessionEvent, TimerId};
use crate::ui_events::CountdownPhase;

/// Spawn one countdown
///
/// Emits a `Tick` right away and then once per `tick`, followed by a single
/// `Finished` at the deadline. Aborting the returned handle stops it.
pub fn spawn_countdown(
    id: TimerId,
    phase: CountdownPhase,
    duration: Duration,
    tick: Duration,
    events: mpsc::Sender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let deadline = Instant::now() + duration;
        let mut ticker = time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let expiry = time::sleep_until(deadline);
        tokio::pin!(expiry);

        loop {
            tokio::select! {
                biased;

                _ = &mut expiry => break,

                _ = ticker.tick() => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    let tick = CountdownEvent::Tick { id, phase, remaining };
                    if events.send(SessionEvent::Countdown(tick)).await.is_err() {
                        return;
                    }
                }
            }
        }

        let _ = events
            .send(SessionEvent::Countdown(CountdownEvent::Finished { id, phase }))
            .await;
    })
}

/// Owns the single running countdown
#[derive(Debug)]
pub struct CountdownScheduler {
    tick: Duration,
    events: mpsc::Sender<SessionEvent>,
    running: Option<(TimerId, JoinHandle<()>)>,
}

impl CountdownScheduler {
    pub fn new(tick: Duration, events: mpsc::Sender<SessionEvent>) -> Self {
        CountdownScheduler {
            tick,
            events,
            running: None,
        }
    }

    /// Start a countdown, aborting whichever one is still running
    pub fn start(&mut self, id: TimerId, phase: CountdownPhase, duration: Duration) {
        if let Some((old, handle)) = self.running.take() {
            debug!("Aborting countdown {} before starting {}", old, id);
            handle.abort();
        }
        let handle = spawn_countdown(id, phase, duration, self.tick, self.events.clone());
        self.running = Some((id, handle));
    }

    /// Cancel countdown `id` if it is the running one
    pub fn cancel(&mut self, id: TimerId) {
        match self.running.take() {
            Some((running, handle)) if running == id => {
                debug!("Countdown {} cancelled", id);
                handle.abort();
            }
            other => self.running = other,
        }
    }

    pub fn running_id(&self) -> Option<TimerId> {
        self.running
            .as_ref()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(id, _)| *id)
    }

    pub fn cancel_all(&mut self) {
        if let Some((_, handle)) = self.running.take() {
            handle.abort();
        }
    }
}

impl Drop for CountdownScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
