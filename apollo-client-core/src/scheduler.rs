//! Decides which queries hit the network, and when.

use tokio::time::Instant;

use crate::actions::QueryId;
use crate::queries::QueryState;
use crate::queries::QueryStore;

/// What to do after a state change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Queries to fetch now, each at most once, in query id order.
    pub fire: Vec<QueryId>,
    /// When the next polling query is due, if any.
    pub next_wakeup: Option<Instant>,
    /// Whether the pending wake-up changed.
    pub timer_replaced: bool,
}

/// Keeps the single pending wake-up shared by all polling queries.
#[derive(Debug, Default)]
pub struct Scheduler {
    pending_wakeup: Option<Instant>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_wakeup(&self) -> Option<Instant> {
        self.pending_wakeup
    }

    /// Looks at every query and returns the ones that must be fetched at
    /// `now`, along with the next time this should be asked again.
    ///
    /// Stopped and in-flight queries are never fired. A query fires when it
    /// was initialized and not fetched since, unless its data came from the
    /// store, or when its poll interval elapsed.
    pub fn schedule(&mut self, queries: &QueryStore, now: Instant) -> Schedule {
        let mut fire = Vec::new();
        let mut next_wakeup: Option<Instant> = None;

        for (query_id, state) in queries {
            if state.stopped || state.in_flight {
                continue;
            }
            let due = match due_at(state) {
                Due::Now => true,
                Due::At(at) => at <= now,
                Due::Never => false,
            };
            if due {
                fire.push(query_id.clone());
            }
            if let Some(interval) = state.poll_interval {
                let next = match state.last_request_time {
                    Some(last) if !due => last + interval,
                    _ => now + interval,
                };
                next_wakeup = Some(next_wakeup.map_or(next, |wakeup| wakeup.min(next)));
            }
        }

        let timer_replaced = self.pending_wakeup != next_wakeup;
        if timer_replaced {
            tracing::trace!(
                "next wake-up in {:?}",
                next_wakeup.map(|wakeup| wakeup.saturating_duration_since(now))
            );
        }
        self.pending_wakeup = next_wakeup;

        Schedule {
            fire,
            next_wakeup,
            timer_replaced,
        }
    }
}

enum Due {
    Now,
    At(Instant),
    Never,
}

fn due_at(state: &QueryState) -> Due {
    match (state.last_request_time, state.poll_interval) {
        // initialized and not fetched since
        (None, _) if state.loading || state.force_fetch => Due::Now,
        // answered from the store: polling starts right away
        (None, Some(_)) => Due::Now,
        (None, None) => Due::Never,
        (Some(last), Some(interval)) => Due::At(last + interval),
        (Some(_), None) => Due::Never,
    }
}
