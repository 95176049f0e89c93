use crate::escalation::session::{SessionState, SessionView};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    Safe,
    Warning,
    CrashDetected,
    Emergency,
}

/// Coarse rider status for the UI. Pure projection of the ride-activity flag
/// and the current session; it has no lifecycle of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetyStatus {
    pub level: SafetyLevel,
    pub riding: bool,
}

impl Default for SafetyStatus {
    fn default() -> Self {
        Self {
            level: SafetyLevel::Safe,
            riding: false,
        }
    }
}

pub fn derive_status(
    riding: bool,
    session: Option<&SessionView>,
    emergency_latched: bool,
) -> SafetyStatus {
    SafetyStatus {
        level: derive_level(riding, session, emergency_latched),
        riding,
    }
}

/// Escalated outcomes read Emergency through the latch, which the engine sets
/// on the transition and the ride-ended/acknowledged signal clears. A stale
/// terminal session therefore stops alarming once the rider acknowledged it.
pub fn derive_level(
    _riding: bool,
    session: Option<&SessionView>,
    emergency_latched: bool,
) -> SafetyLevel {
    if emergency_latched {
        return SafetyLevel::Emergency;
    }
    match session.map(|view| view.state) {
        Some(SessionState::CountdownActive) => SafetyLevel::CrashDetected,
        Some(SessionState::CandidateDetected) => SafetyLevel::Warning,
        Some(SessionState::Idle)
        | Some(SessionState::Cancelled)
        | Some(SessionState::Escalated)
        | None => SafetyLevel::Safe,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(state: SessionState) -> SessionView {
        SessionView {
            id: 1,
            state,
            kind: None,
            peak_probability: 0.9,
            deadline: None,
            resolved_at: None,
            resolution: None,
        }
    }

    #[test]
    fn no_session_is_safe_riding_or_not() {
        assert_eq!(derive_level(true, None, false), SafetyLevel::Safe);
        assert_eq!(derive_level(false, None, false), SafetyLevel::Safe);
    }

    #[test]
    fn session_states_map_to_levels() {
        let cases = [
            (SessionState::CandidateDetected, SafetyLevel::Warning),
            (SessionState::CountdownActive, SafetyLevel::CrashDetected),
            (SessionState::Cancelled, SafetyLevel::Safe),
        ];
        for (state, expected) in cases {
            assert_eq!(derive_level(true, Some(&view(state)), false), expected);
        }
    }

    #[test]
    fn escalated_session_alarms_through_the_latch_until_acknowledged() {
        let escalated = view(SessionState::Escalated);
        assert_eq!(
            derive_level(true, Some(&escalated), true),
            SafetyLevel::Emergency
        );
        // Latch cleared by the ride-ended signal: the stale terminal session
        // no longer alarms.
        assert_eq!(
            derive_level(false, Some(&escalated), false),
            SafetyLevel::Safe
        );
    }

    #[test]
    fn emergency_latch_dominates_even_without_a_session() {
        assert_eq!(derive_level(true, None, true), SafetyLevel::Emergency);
        assert_eq!(
            derive_level(false, Some(&view(SessionState::Cancelled)), true),
            SafetyLevel::Emergency
        );
    }

    #[test]
    fn status_carries_the_riding_flag() {
        let status = derive_status(true, None, false);
        assert!(status.riding);
        assert_eq!(status.level, SafetyLevel::Safe);
    }
}
