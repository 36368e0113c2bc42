//! Per-timer periodic task
//!
//! Every running timer owns one `Ticker`. The task wakes once per period,
//! takes the shared state lock, and re-checks its cancellation token before
//! touching anything, so a cancelled ticker never fires again even when its
//! wakeup was already queued.

use std::sync::{Mutex, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{lock, Shared, TickOutcome, TimerEvent};
use crate::timer::TimerId;

/// Cancellation handle for one running timer
///
/// Dropping the ticker cancels it.
#[derive(Debug)]
pub(super) struct Ticker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Spawn the periodic task for `id`; the first tick lands one period from now
    pub(super) fn spawn(
        runtime: &Handle,
        id: TimerId,
        period: Duration,
        shared: Weak<Mutex<Shared>>,
        events: broadcast::Sender<TimerEvent>,
    ) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let first_tick = Instant::now() + period;

        let handle = runtime.spawn(async move {
            let mut interval = time::interval_at(first_tick, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let Some(shared) = shared.upgrade() else {
                    break;
                };
                let mut state = lock(&shared);
                if task_token.is_cancelled() {
                    break;
                }
                if state.tick(&id, &events) == TickOutcome::Stop {
                    break;
                }
            }
            trace!(timer_id = %id, "Ticker exited");
        });

        Self { token, handle }
    }

    /// Stop the task; idempotent
    pub(super) fn cancel(&self) {
        self.token.cancel();
        self.handle.abort();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel();
    }
}
