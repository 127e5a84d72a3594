//! Cooperative cancellation and wall-clock budget, shared by the
//! visibility engine and the scheduler so neither has to invent its own
//! copy (spec §5: "a single wall-clock budget covers the entire request").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cheap-to-clone cooperative cancellation flag. Checked at
/// (satellite,target) boundaries in the visibility engine and at every
/// opportunity in the scheduler; never forcibly interrupts a thread.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A single wall-clock deadline for an entire planning request. Expiry is
/// surfaced by callers as cancellation, not as a distinct error variant
/// (spec §7: `BudgetExceeded` manifests as `Cancelled`).
#[derive(Clone, Copy)]
pub struct Budget {
    deadline: Instant,
}

impl Budget {
    pub fn from_duration(duration: Duration) -> Self {
        Self {
            deadline: Instant::now() + duration,
        }
    }

    /// A budget that never expires, for callers who don't want a timeout.
    pub fn unbounded() -> Self {
        Self {
            deadline: Instant::now() + Duration::from_secs(u32::MAX as u64),
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_token_starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancellation_token_clone_shares_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn budget_expires_after_duration() {
        let budget = Budget::from_duration(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(budget.is_expired());
    }

    #[test]
    fn unbounded_budget_has_remaining_time() {
        let budget = Budget::unbounded();
        assert!(!budget.is_expired());
        assert!(budget.remaining() > Duration::from_secs(1));
    }
}
