//! Adaptive per-worker concurrency throttle
//!
//! Each worker owns one [`Throttle`]. It admits at most `budget` enrichment
//! calls at a time and moves the budget one step at a time:
//!
//! - every failure bumps an error counter; once the counter reaches the
//!   threshold the budget drops by one and the counter resets,
//! - a success while the counter is zero raises the budget by one.
//!
//! The budget stays within `[1, ceiling]`, so a worker always makes progress.

use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::{debug, info};

/// Default admitted-concurrency ceiling per worker.
pub const DEFAULT_MAX_CONCURRENCY: usize = 50;

/// Default number of failures that shrinks the budget.
pub const DEFAULT_ERROR_THRESHOLD: u32 = 5;

/// Budget change caused by one recorded result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Unchanged,
    /// Budget lowered to the contained value
    Shrunk(usize),
    /// Budget raised to the contained value
    Grown(usize),
}

/// Additive-increase/additive-decrease budget bookkeeping.
#[derive(Debug, Clone)]
pub struct BudgetController {
    budget: usize,
    ceiling: usize,
    threshold: u32,
    consecutive_errors: u32,
}

impl BudgetController {
    /// Start at the ceiling. Zero values are raised to one.
    pub fn new(ceiling: usize, threshold: u32) -> Self {
        let ceiling = ceiling.max(1);
        Self {
            budget: ceiling,
            ceiling,
            threshold: threshold.max(1),
            consecutive_errors: 0,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Record the result of one admitted call.
    ///
    /// A success does not clear the error counter; only a shrink does.
    pub fn record(&mut self, success: bool) -> Adjustment {
        if success {
            if self.consecutive_errors == 0 && self.budget < self.ceiling {
                self.budget += 1;
                return Adjustment::Grown(self.budget);
            }
            return Adjustment::Unchanged;
        }

        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        if self.consecutive_errors >= self.threshold && self.budget > 1 {
            self.budget -= 1;
            self.consecutive_errors = 0;
            return Adjustment::Shrunk(self.budget);
        }
        Adjustment::Unchanged
    }
}

#[derive(Debug)]
struct ThrottleState {
    controller: BudgetController,
    in_flight: usize,
}

/// Async gate over a [`BudgetController`].
#[derive(Debug)]
pub struct Throttle {
    state: Mutex<ThrottleState>,
    slot_freed: Notify,
}

impl Throttle {
    pub fn new(ceiling: usize, threshold: u32) -> Self {
        Self {
            state: Mutex::new(ThrottleState {
                controller: BudgetController::new(ceiling, threshold),
                in_flight: 0,
            }),
            slot_freed: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ThrottleState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait until fewer than `budget` calls are admitted, then take a slot.
    pub async fn acquire(&self) -> ThrottlePermit<'_> {
        loop {
            let notified = self.slot_freed.notified();
            tokio::pin!(notified);
            // Register before checking so a release between the check and
            // the await still wakes us.
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.in_flight < state.controller.budget() {
                    state.in_flight += 1;
                    return ThrottlePermit {
                        throttle: self,
                        released: false,
                    };
                }
            }

            notified.await;
        }
    }

    /// Current admitted-concurrency budget
    pub fn budget(&self) -> usize {
        self.lock().controller.budget()
    }

    pub fn ceiling(&self) -> usize {
        self.lock().controller.ceiling()
    }

    /// Calls currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.lock().controller.consecutive_errors()
    }

    fn finish(&self, outcome: Option<bool>) -> Adjustment {
        let adjustment = {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            match outcome {
                Some(success) => state.controller.record(success),
                None => Adjustment::Unchanged,
            }
        };

        match adjustment {
            Adjustment::Shrunk(budget) => info!(budget, "Reduced max concurrent requests"),
            Adjustment::Grown(budget) => debug!(budget, "Increased max concurrent requests"),
            Adjustment::Unchanged => {},
        }

        self.slot_freed.notify_waiters();
        adjustment
    }
}

/// One admitted call. Release it with the call's result; dropping it frees
/// the slot without touching the error bookkeeping.
#[derive(Debug)]
pub struct ThrottlePermit<'a> {
    throttle: &'a Throttle,
    released: bool,
}

impl ThrottlePermit<'_> {
    pub fn release(mut self, success: bool) -> Adjustment {
        self.released = true;
        self.throttle.finish(Some(success))
    }
}

impl Drop for ThrottlePermit<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.throttle.finish(None);
        }
    }
}
