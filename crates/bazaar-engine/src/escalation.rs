//! Tiered failure recovery.
//!
//! One policy instance per scan run replaces the per-script retry counters
//! the site's flakiness otherwise breeds. Hard failures climb a small
//! hierarchy: retry, replace one session, restart the whole pool, abort.
//! Forward cursor progress only ever happens in the normal state; the other
//! tiers are recovery-only.

use serde::{Deserialize, Serialize};

/// What the driver must do about the latest hard failure.
///
/// Ordered by severity; a batch with several failures takes the strongest
/// action any of them produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Below threshold: cool down and retry the same targets
    Retry,
    /// Tier 1: replace one session, then retry
    ReplaceSession,
    /// Tier 2: restart the whole pool, then retry
    RestartPool,
    /// Tier 2 exhausted: flush the checkpoint and stop
    Abort,
}

/// Recovery tier, derived for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationTier {
    /// Making forward progress
    Normal,
    /// At least one replacement round since the last success
    Tier1,
    /// A pool restart happened since the last success
    Tier2,
}

/// Counts consecutive hard failures and decides when to climb tiers.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    replace_after: u32,
    restart_after_rounds: u32,
    consecutive_errors: u32,
    escalation_rounds: u32,
    restarts_since_success: u32,
}

impl EscalationPolicy {
    /// Policy with thresholds E1 (`replace_after`) and R1
    /// (`restart_after_rounds`).
    #[must_use]
    pub fn new(replace_after: u32, restart_after_rounds: u32) -> Self {
        Self {
            replace_after: replace_after.max(1),
            restart_after_rounds: restart_after_rounds.max(1),
            consecutive_errors: 0,
            escalation_rounds: 0,
            restarts_since_success: 0,
        }
    }

    /// Any successful fetch (including a clean not-found) clears the slate.
    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
        self.escalation_rounds = 0;
        self.restarts_since_success = 0;
    }

    /// Record one hard failure and return the action it triggers.
    pub fn record_failure(&mut self) -> RecoveryAction {
        self.consecutive_errors += 1;
        if self.consecutive_errors < self.replace_after {
            return RecoveryAction::Retry;
        }

        // Threshold reached: one escalation round begins
        self.consecutive_errors = 0;
        self.escalation_rounds += 1;
        if self.escalation_rounds < self.restart_after_rounds {
            return RecoveryAction::ReplaceSession;
        }

        self.escalation_rounds = 0;
        if self.restarts_since_success > 0 {
            // The previous restart did not restore throughput
            return RecoveryAction::Abort;
        }
        self.restarts_since_success += 1;
        RecoveryAction::RestartPool
    }

    /// Current tier.
    #[must_use]
    pub fn tier(&self) -> EscalationTier {
        if self.restarts_since_success > 0 {
            EscalationTier::Tier2
        } else if self.escalation_rounds > 0 || self.consecutive_errors > 0 {
            EscalationTier::Tier1
        } else {
            EscalationTier::Normal
        }
    }

    /// Consecutive hard failures since the last success or escalation.
    #[must_use]
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fail_n(policy: &mut EscalationPolicy, n: u32) -> Vec<RecoveryAction> {
        (0..n).map(|_| policy.record_failure()).collect()
    }

    #[test]
    fn test_three_failures_trigger_one_replacement() {
        let mut policy = EscalationPolicy::new(3, 2);

        let actions = fail_n(&mut policy, 3);
        assert_eq!(
            actions,
            vec![
                RecoveryAction::Retry,
                RecoveryAction::Retry,
                RecoveryAction::ReplaceSession
            ]
        );

        // Success resets everything; no restart ever got close
        policy.record_success();
        assert_eq!(policy.tier(), EscalationTier::Normal);
        assert_eq!(policy.consecutive_errors(), 0);
    }

    #[test]
    fn test_two_replace_rounds_trigger_one_restart() {
        let mut policy = EscalationPolicy::new(3, 2);

        assert_eq!(fail_n(&mut policy, 3).pop(), Some(RecoveryAction::ReplaceSession));
        assert_eq!(fail_n(&mut policy, 3).pop(), Some(RecoveryAction::RestartPool));
        assert_eq!(policy.tier(), EscalationTier::Tier2);
    }

    #[test]
    fn test_failures_after_restart_abort() {
        let mut policy = EscalationPolicy::new(3, 2);

        fail_n(&mut policy, 6); // replace, then restart
        assert_eq!(fail_n(&mut policy, 3).pop(), Some(RecoveryAction::ReplaceSession));
        assert_eq!(fail_n(&mut policy, 3).pop(), Some(RecoveryAction::Abort));
    }

    #[test]
    fn test_success_between_failures_prevents_escalation() {
        let mut policy = EscalationPolicy::new(3, 2);

        fail_n(&mut policy, 2);
        policy.record_success();
        let actions = fail_n(&mut policy, 2);
        assert_eq!(actions, vec![RecoveryAction::Retry, RecoveryAction::Retry]);
    }

    #[test]
    fn test_action_severity_ordering() {
        assert!(RecoveryAction::Retry < RecoveryAction::ReplaceSession);
        assert!(RecoveryAction::ReplaceSession < RecoveryAction::RestartPool);
        assert!(RecoveryAction::RestartPool < RecoveryAction::Abort);
    }
}
