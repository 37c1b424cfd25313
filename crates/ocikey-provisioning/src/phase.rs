use std::fmt;

use tracing::info;

use crate::error::ProvisioningError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingLogin,
    ProfileDiscovery,
    KeyUpload,
    FingerprintVerification,
    TenancyDiscovery,
    Persisting,
    Done,
    Aborted,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingLogin => "awaiting_login",
            Self::ProfileDiscovery => "profile_discovery",
            Self::KeyUpload => "key_upload",
            Self::FingerprintVerification => "fingerprint_verification",
            Self::TenancyDiscovery => "tenancy_discovery",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }

    /// The only phase reachable from `self` on success.
    pub fn successor(self) -> Option<Phase> {
        match self {
            Self::AwaitingLogin => Some(Self::ProfileDiscovery),
            Self::ProfileDiscovery => Some(Self::KeyUpload),
            Self::KeyUpload => Some(Self::FingerprintVerification),
            Self::FingerprintVerification => Some(Self::TenancyDiscovery),
            Self::TenancyDiscovery => Some(Self::Persisting),
            Self::Persisting => Some(Self::Done),
            Self::Done | Self::Aborted => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single gate for phase changes: strictly linear forward progress, with
/// `Aborted` reachable from any non-terminal phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTracker {
    current: Phase,
    history: Vec<Phase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: Phase::AwaitingLogin,
            history: vec![Phase::AwaitingLogin],
        }
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn advance(&mut self, next: Phase) -> Result<(), ProvisioningError> {
        if self.current.successor() != Some(next) {
            return Err(ProvisioningError::OutOfOrderTransition {
                from: self.current,
                to: next,
            });
        }
        info!(from = %self.current, to = %next, "phase transition");
        self.current = next;
        self.history.push(next);
        Ok(())
    }

    /// Moves to `Aborted`; a no-op once a terminal phase was reached.
    pub fn abort(&mut self, reason: &str) {
        if self.current.is_terminal() {
            return;
        }
        info!(from = %self.current, reason, "phase transition to aborted");
        self.current = Phase::Aborted;
        self.history.push(Phase::Aborted);
    }
}

#[cfg(test)]
mod tests {
    use super::{Phase, PhaseTracker};
    use crate::error::ProvisioningError;

    #[test]
    fn functional_tracker_walks_the_linear_flow() {
        let mut tracker = PhaseTracker::new();
        for next in [
            Phase::ProfileDiscovery,
            Phase::KeyUpload,
            Phase::FingerprintVerification,
            Phase::TenancyDiscovery,
            Phase::Persisting,
            Phase::Done,
        ] {
            tracker.advance(next).expect("advance");
        }
        assert_eq!(tracker.current(), Phase::Done);
        assert_eq!(tracker.history().len(), 7);
    }

    #[test]
    fn regression_tenancy_discovery_cannot_skip_fingerprint_verification() {
        let mut tracker = PhaseTracker::new();
        tracker.advance(Phase::ProfileDiscovery).expect("profile");
        tracker.advance(Phase::KeyUpload).expect("upload");
        let error = tracker
            .advance(Phase::TenancyDiscovery)
            .expect_err("skip rejected");
        assert_eq!(
            error,
            ProvisioningError::OutOfOrderTransition {
                from: Phase::KeyUpload,
                to: Phase::TenancyDiscovery,
            }
        );
        assert_eq!(tracker.current(), Phase::KeyUpload);
    }

    #[test]
    fn regression_repeated_transition_is_rejected() {
        let mut tracker = PhaseTracker::new();
        tracker.advance(Phase::ProfileDiscovery).expect("profile");
        assert!(tracker.advance(Phase::ProfileDiscovery).is_err());
    }

    #[test]
    fn unit_abort_is_reachable_from_any_live_phase_and_sticks() {
        let mut tracker = PhaseTracker::new();
        tracker.advance(Phase::ProfileDiscovery).expect("profile");
        tracker.abort("test");
        assert_eq!(tracker.current(), Phase::Aborted);
        assert!(tracker.advance(Phase::KeyUpload).is_err());
        tracker.abort("again");
        assert_eq!(tracker.history().last(), Some(&Phase::Aborted));
        assert_eq!(tracker.history().len(), 3);
    }
}
