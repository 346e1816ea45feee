//! Transfer Attempt State Definitions
//!
//! ```text
//! START → LOCKS_ACQUIRING ⟲ → LOCKS_HELD → VALIDATING → APPLY → RELEASED → SUCCESS
//!   │            │                              │
//!   │            │                              └→ INSUFFICIENT_FUNDS → RELEASED → FAILED
//!   └────────────┴──────────────────────────────────────────────────────────────→ FAILED
//! ```
//!
//! `LOCKS_ACQUIRING` may loop on itself (try-lock backoff) but no state holds
//! one lock while blocking on another that is unavailable.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferPhase {
    /// Transaction id assigned, request not yet validated
    Start,
    /// Acquiring the two account locks (may loop under backoff)
    LocksAcquiring,
    /// Both locks held
    LocksHeld,
    /// Re-checking funds and overflow under both locks
    Validating,
    /// Debit source, credit destination
    Apply,
    /// Source balance too low at validation time
    InsufficientFunds,
    /// Both locks dropped
    Released,
    /// Terminal: funds moved
    Success,
    /// Terminal: nothing moved
    Failed,
}

impl TransferPhase {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferPhase::Success | TransferPhase::Failed)
    }

    /// True while at least one account lock may be held
    #[inline]
    pub fn holds_locks(&self) -> bool {
        matches!(
            self,
            TransferPhase::LocksHeld
                | TransferPhase::Validating
                | TransferPhase::Apply
                | TransferPhase::InsufficientFunds
        )
    }

    pub fn can_transition_to(&self, next: TransferPhase) -> bool {
        use TransferPhase::*;
        matches!(
            (self, next),
            (Start, LocksAcquiring)
                | (Start, Failed)
                | (LocksAcquiring, LocksAcquiring)
                | (LocksAcquiring, LocksHeld)
                | (LocksAcquiring, Failed)
                | (LocksHeld, Validating)
                | (Validating, Apply)
                | (Validating, InsufficientFunds)
                | (Validating, Released)
                | (Apply, Released)
                | (InsufficientFunds, Released)
                | (Released, Success)
                | (Released, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferPhase::Start => "START",
            TransferPhase::LocksAcquiring => "LOCKS_ACQUIRING",
            TransferPhase::LocksHeld => "LOCKS_HELD",
            TransferPhase::Validating => "VALIDATING",
            TransferPhase::Apply => "APPLY",
            TransferPhase::InsufficientFunds => "INSUFFICIENT_FUNDS",
            TransferPhase::Released => "RELEASED",
            TransferPhase::Success => "SUCCESS",
            TransferPhase::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Walks one attempt through the phase graph, asserting every edge in debug builds.
#[derive(Debug)]
pub(crate) struct PhaseTracker {
    phase: TransferPhase,
}

impl PhaseTracker {
    pub(crate) fn new() -> Self {
        Self {
            phase: TransferPhase::Start,
        }
    }

    pub(crate) fn current(&self) -> TransferPhase {
        self.phase
    }

    pub(crate) fn advance(&mut self, next: TransferPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal transfer phase transition {} -> {}",
            self.phase,
            next
        );
        tracing::trace!(target: "TRANSFER", from = %self.phase, to = %next, "phase");
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransferPhase::*;

    #[test]
    fn test_terminal_states() {
        assert!(Success.is_terminal());
        assert!(Failed.is_terminal());

        for phase in [
            Start,
            LocksAcquiring,
            LocksHeld,
            Validating,
            Apply,
            InsufficientFunds,
            Released,
        ] {
            assert!(!phase.is_terminal(), "{phase} should not be terminal");
        }
    }

    #[test]
    fn test_success_path() {
        let path = [
            Start,
            LocksAcquiring,
            LocksAcquiring,
            LocksHeld,
            Validating,
            Apply,
            Released,
            Success,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_insufficient_funds_path() {
        let path = [
            Start,
            LocksAcquiring,
            LocksHeld,
            Validating,
            InsufficientFunds,
            Released,
            Failed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_cannot_finish_while_holding_locks() {
        for phase in [LocksHeld, Validating, Apply, InsufficientFunds] {
            assert!(phase.holds_locks());
            assert!(!phase.can_transition_to(Success));
            assert!(!phase.can_transition_to(Failed));
        }
    }

    #[test]
    fn test_no_backward_edges() {
        assert!(!LocksHeld.can_transition_to(LocksAcquiring));
        assert!(!Apply.can_transition_to(Validating));
        assert!(!Success.can_transition_to(Start));
        assert!(!Failed.can_transition_to(LocksAcquiring));
    }

    #[test]
    fn test_tracker_follows_graph() {
        let mut tracker = PhaseTracker::new();
        assert_eq!(tracker.current(), Start);
        tracker.advance(LocksAcquiring);
        tracker.advance(LocksHeld);
        tracker.advance(Validating);
        tracker.advance(Apply);
        tracker.advance(Released);
        tracker.advance(Success);
        assert!(tracker.current().is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(LocksAcquiring.to_string(), "LOCKS_ACQUIRING");
        assert_eq!(InsufficientFunds.to_string(), "INSUFFICIENT_FUNDS");
    }
}
