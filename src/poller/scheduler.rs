//! Poll timing
//!
//! A [`Schedule`] decides when each poll attempt fires. Fixed schedules fire on
//! a regular period; jittered schedules draw every interval at random from
//! `[base - offset, base + offset]` so that pollers started together drift
//! apart instead of hitting their targets in bursts.

use crate::config::PollPlan;
use rand::Rng;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Stand-in deadline for intervals too long to represent as an instant
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Timing strategy for one poller, fixed for its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Fire every `every`
    Fixed { every: Duration },

    /// Fire after a random interval in `[base - offset, base + offset]`
    Jittered { base: Duration, offset: Duration },
}

/// State of the timing loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    /// Next poll fires at the deadline
    Scheduled(Instant),
    /// No further polls
    Cancelled,
}

impl Schedule {
    /// Picks the strategy matching a resolved poll plan
    pub fn from_plan(plan: &PollPlan) -> Self {
        if plan.randomized && !plan.offset_range.is_zero() {
            Self::Jittered {
                base: plan.frequency,
                offset: plan.offset_range,
            }
        } else {
            Self::Fixed {
                every: plan.frequency,
            }
        }
    }

    /// Time from the current firing to the next one
    pub fn next_delay(&self) -> Duration {
        match *self {
            Self::Fixed { every } => every,
            Self::Jittered { base, offset } => {
                let low = millis(base.saturating_sub(offset));
                let high = millis(base.saturating_add(offset));
                Duration::from_millis(rand::thread_rng().gen_range(low..=high))
            }
        }
    }

    fn next_deadline(&self, fired_at: Instant) -> Instant {
        match self {
            // Advance from the previous deadline so the period does not drift,
            // but drop firings that were missed entirely
            Self::Fixed { every } => {
                let now = Instant::now();
                let next = deadline_after(fired_at, *every);
                if next < now {
                    deadline_after(now, *every)
                } else {
                    next
                }
            }
            Self::Jittered { .. } => deadline_after(Instant::now(), self.next_delay()),
        }
    }

    /// Runs the timing loop until `cancel` fires
    ///
    /// `on_fire` is called once per poll attempt and must not block; the
    /// actual request work belongs on a spawned task. When `begin_immediately`
    /// is set, one attempt fires before the first interval elapses.
    /// Cancellation wins over a deadline that is due at the same time.
    pub async fn run<F>(&self, cancel: &CancellationToken, begin_immediately: bool, mut on_fire: F)
    where
        F: FnMut(),
    {
        if cancel.is_cancelled() {
            return;
        }

        if begin_immediately {
            on_fire();
        }

        let mut state = LoopState::Scheduled(deadline_after(Instant::now(), self.next_delay()));

        while let LoopState::Scheduled(deadline) = state {
            state = tokio::select! {
                biased;
                _ = cancel.cancelled() => LoopState::Cancelled,
                _ = sleep_until(deadline) => {
                    on_fire();
                    LoopState::Scheduled(self.next_deadline(deadline))
                }
            };
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn deadline_after(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}
