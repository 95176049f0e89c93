use crate::classify::model::{CrashAssessment, CrashKind};
use crate::escalation::countdown::CountdownClock;
use serde::Serialize;
use std::time::{Duration, SystemTime};
use tracing::info;

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    CandidateDetected,
    CountdownActive,
    Cancelled,
    Escalated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionReason {
    UserConfirmedSafe,
    Escalated,
}

/// Side effect requested by a transition. The session never performs effects;
/// the coordinator turns these into events for collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEffect {
    CountdownStarted { deadline: SystemTime },
    Cancelled,
    Escalate,
}

/// Escalation timing and thresholds, sourced from `[detection]` config.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Probability at or above which an assessment opens a candidate.
    pub trigger_probability: f64,
    /// A candidate retracts if a later assessment falls below this.
    pub retraction_probability: f64,
    /// Grace period between candidate detection and countdown start.
    pub corroboration: Duration,
    /// Countdown duration before escalation.
    pub countdown: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            trigger_probability: 0.75,
            retraction_probability: 0.375,
            corroboration: Duration::from_secs(2),
            countdown: Duration::from_secs(45),
        }
    }
}

/// One candidate-crash lifecycle from detection to terminal resolution.
///
/// Terminal states are immutable: every method checks the exact current state
/// before transitioning (compare-and-set against the whole state, not a
/// flag), which is what makes the Escalate effect single-fire under duplicate
/// ticks.
#[derive(Debug)]
pub struct EscalationSession {
    id: SessionId,
    state: SessionState,
    triggering: Option<CrashAssessment>,
    peak_probability: f64,
    candidate_since: Option<SystemTime>,
    countdown: Option<CountdownClock>,
    resolved_at: Option<SystemTime>,
    resolution: Option<ResolutionReason>,
}

impl EscalationSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: SessionState::Idle,
            triggering: None,
            peak_probability: 0.0,
            candidate_since: None,
            countdown: None,
            resolved_at: None,
            resolution: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, SessionState::Cancelled | SessionState::Escalated)
    }

    /// Live means a candidate or countdown is in flight.
    pub fn is_live(&self) -> bool {
        matches!(
            self.state,
            SessionState::CandidateDetected | SessionState::CountdownActive
        )
    }

    pub fn triggering_assessment(&self) -> Option<&CrashAssessment> {
        self.triggering.as_ref()
    }

    pub fn countdown(&self) -> Option<&CountdownClock> {
        self.countdown.as_ref()
    }

    /// Feed one classifier assessment into the machine.
    pub fn observe_assessment(
        &mut self,
        assessment: &CrashAssessment,
        config: &SessionConfig,
        now: SystemTime,
    ) -> Option<SessionEffect> {
        match self.state {
            SessionState::Idle => {
                if assessment.probability >= config.trigger_probability {
                    self.state = SessionState::CandidateDetected;
                    self.triggering = Some(assessment.clone());
                    self.peak_probability = assessment.probability;
                    self.candidate_since = Some(now);
                    info!(
                        session_id = self.id,
                        probability = assessment.probability,
                        kind = ?assessment.kind,
                        "Candidate crash detected"
                    );
                }
                None
            }
            SessionState::CandidateDetected => {
                if assessment.probability < config.retraction_probability {
                    // Single-tick noise: discard the candidate entirely.
                    self.state = SessionState::Idle;
                    self.triggering = None;
                    self.peak_probability = 0.0;
                    self.candidate_since = None;
                    info!(
                        session_id = self.id,
                        probability = assessment.probability,
                        "Candidate retracted before corroboration"
                    );
                } else {
                    self.peak_probability = self.peak_probability.max(assessment.probability);
                }
                None
            }
            SessionState::CountdownActive => {
                // Severity is recorded but the deadline never moves; repeated
                // tremors must not extend the countdown indefinitely.
                self.peak_probability = self.peak_probability.max(assessment.probability);
                None
            }
            SessionState::Cancelled | SessionState::Escalated => None,
        }
    }

    /// Advance time-driven transitions: corroboration completion and expiry.
    pub fn poll(&mut self, config: &SessionConfig, now: SystemTime) -> Option<SessionEffect> {
        match self.state {
            SessionState::CandidateDetected => {
                let since = self.candidate_since?;
                if now >= since + config.corroboration {
                    let clock = CountdownClock::starting_at(now, config.countdown);
                    self.state = SessionState::CountdownActive;
                    self.countdown = Some(clock);
                    info!(
                        session_id = self.id,
                        countdown_secs = config.countdown.as_secs(),
                        "Countdown started"
                    );
                    return Some(SessionEffect::CountdownStarted {
                        deadline: clock.deadline(),
                    });
                }
                None
            }
            SessionState::CountdownActive => {
                let clock = self.countdown?;
                if clock.is_expired(now) {
                    self.state = SessionState::Escalated;
                    self.resolved_at = Some(now);
                    self.resolution = Some(ResolutionReason::Escalated);
                    info!(
                        session_id = self.id,
                        peak_probability = self.peak_probability,
                        "Countdown expired without confirmation, escalating"
                    );
                    return Some(SessionEffect::Escalate);
                }
                None
            }
            SessionState::Idle | SessionState::Cancelled | SessionState::Escalated => None,
        }
    }

    /// Rider confirmed they are okay. No-op unless a candidate or countdown is
    /// in flight; terminal states never change.
    pub fn confirm_safe(&mut self, now: SystemTime) -> Option<SessionEffect> {
        match self.state {
            SessionState::CandidateDetected => {
                self.state = SessionState::Cancelled;
                self.resolved_at = Some(now);
                self.resolution = Some(ResolutionReason::UserConfirmedSafe);
                info!(session_id = self.id, "Candidate dismissed by rider");
                None
            }
            SessionState::CountdownActive => {
                self.state = SessionState::Cancelled;
                self.resolved_at = Some(now);
                self.resolution = Some(ResolutionReason::UserConfirmedSafe);
                info!(session_id = self.id, "Countdown cancelled by rider");
                Some(SessionEffect::Cancelled)
            }
            SessionState::Idle | SessionState::Cancelled | SessionState::Escalated => None,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            state: self.state,
            kind: self.triggering.as_ref().map(|a| a.kind),
            peak_probability: self.peak_probability,
            deadline: self.countdown.map(|c| c.deadline()),
            resolved_at: self.resolved_at,
            resolution: self.resolution,
        }
    }
}

/// Read-only projection of a session for the UI and collaborators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionView {
    pub id: SessionId,
    pub state: SessionState,
    pub kind: Option<CrashKind>,
    pub peak_probability: f64,
    pub deadline: Option<SystemTime>,
    pub resolved_at: Option<SystemTime>,
    pub resolution: Option<ResolutionReason>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalWindow;
    use std::time::UNIX_EPOCH;

    fn assessment(probability: f64) -> CrashAssessment {
        CrashAssessment {
            kind: CrashKind::Impact,
            probability,
            evidence: SignalWindow::new(Vec::new(), Duration::from_secs(8)),
            produced_at: UNIX_EPOCH,
        }
    }

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn config() -> SessionConfig {
        SessionConfig::default()
    }

    fn session_in_countdown(config: &SessionConfig) -> (EscalationSession, SystemTime) {
        let mut session = EscalationSession::new(1);
        assert!(
            session
                .observe_assessment(&assessment(0.9), config, at(10))
                .is_none()
        );
        let effect = session.poll(config, at(13)).expect("countdown starts");
        let SessionEffect::CountdownStarted { deadline } = effect else {
            panic!("expected countdown start, got {effect:?}");
        };
        (session, deadline)
    }

    #[test]
    fn sub_threshold_assessment_never_leaves_idle() {
        let mut session = EscalationSession::new(1);
        for probability in [0.0, 0.05, 0.5, 0.74] {
            session.observe_assessment(&assessment(probability), &config(), at(10));
            assert_eq!(session.state(), SessionState::Idle);
        }
    }

    #[test]
    fn trigger_opens_candidate_without_countdown() {
        let mut session = EscalationSession::new(1);
        let effect = session.observe_assessment(&assessment(0.9), &config(), at(10));
        assert!(effect.is_none());
        assert_eq!(session.state(), SessionState::CandidateDetected);
        assert!(session.countdown().is_none());
    }

    #[test]
    fn candidate_retracts_below_retraction_threshold() {
        let mut session = EscalationSession::new(1);
        session.observe_assessment(&assessment(0.9), &config(), at(10));
        session.observe_assessment(&assessment(0.1), &config(), at(11));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.triggering_assessment().is_none());
    }

    #[test]
    fn candidate_survives_between_retraction_and_trigger() {
        let mut session = EscalationSession::new(1);
        session.observe_assessment(&assessment(0.9), &config(), at(10));
        session.observe_assessment(&assessment(0.5), &config(), at(11));
        assert_eq!(session.state(), SessionState::CandidateDetected);
    }

    #[test]
    fn corroboration_window_gates_the_countdown() {
        let config = config();
        let mut session = EscalationSession::new(1);
        session.observe_assessment(&assessment(0.9), &config, at(10));

        assert!(session.poll(&config, at(11)).is_none());
        assert_eq!(session.state(), SessionState::CandidateDetected);

        let effect = session.poll(&config, at(12)).expect("countdown starts");
        assert!(matches!(effect, SessionEffect::CountdownStarted { .. }));
        assert_eq!(session.state(), SessionState::CountdownActive);
    }

    #[test]
    fn countdown_deadline_is_now_plus_configured_duration() {
        let (session, deadline) = session_in_countdown(&config());
        assert_eq!(deadline, at(13) + Duration::from_secs(45));
        assert_eq!(session.view().deadline, Some(deadline));
    }

    #[test]
    fn confirm_during_countdown_cancels_and_reports() {
        let config = config();
        let (mut session, _deadline) = session_in_countdown(&config);

        let effect = session.confirm_safe(at(20));
        assert_eq!(effect, Some(SessionEffect::Cancelled));
        assert_eq!(session.state(), SessionState::Cancelled);
        assert_eq!(
            session.view().resolution,
            Some(ResolutionReason::UserConfirmedSafe)
        );
    }

    #[test]
    fn expiry_escalates_exactly_once() {
        let config = config();
        let (mut session, deadline) = session_in_countdown(&config);

        let effect = session.poll(&config, deadline);
        assert_eq!(effect, Some(SessionEffect::Escalate));
        assert_eq!(session.state(), SessionState::Escalated);

        // Duplicate ticks and re-entrant polls must not fire again.
        for _ in 0..5 {
            assert!(session.poll(&config, deadline + Duration::from_secs(1)).is_none());
        }
        assert_eq!(session.view().resolution, Some(ResolutionReason::Escalated));
    }

    #[test]
    fn confirmation_applied_before_expiry_check_wins_the_tie() {
        let config = config();
        let (mut session, deadline) = session_in_countdown(&config);

        // Both arrive in the same evaluation tick; confirmation is evaluated
        // first, so the later expiry check sees a terminal session.
        let confirm = session.confirm_safe(deadline);
        let expiry = session.poll(&config, deadline);

        assert_eq!(confirm, Some(SessionEffect::Cancelled));
        assert!(expiry.is_none());
        assert_eq!(session.state(), SessionState::Cancelled);
    }

    #[test]
    fn cancelled_session_ignores_everything_afterwards() {
        let config = config();
        let (mut session, deadline) = session_in_countdown(&config);
        session.confirm_safe(at(20));

        assert!(session.observe_assessment(&assessment(0.99), &config, at(21)).is_none());
        assert!(session.poll(&config, deadline + Duration::from_secs(60)).is_none());
        assert!(session.confirm_safe(at(22)).is_none());
        assert_eq!(session.state(), SessionState::Cancelled);
    }

    #[test]
    fn severity_during_countdown_never_moves_the_deadline() {
        let config = config();
        let (mut session, deadline) = session_in_countdown(&config);

        session.observe_assessment(&assessment(0.99), &config, at(30));

        assert_eq!(session.view().deadline, Some(deadline));
        assert!((session.view().peak_probability - 0.99).abs() < 1e-9);
    }

    #[test]
    fn expiry_spanning_a_suspension_escalates_on_first_poll() {
        let config = config();
        let (mut session, deadline) = session_in_countdown(&config);

        // No polls for a long stretch, then one far past the deadline.
        let effect = session.poll(&config, deadline + Duration::from_secs(600));
        assert_eq!(effect, Some(SessionEffect::Escalate));
    }

    #[test]
    fn confirm_on_idle_session_is_a_no_op() {
        let mut session = EscalationSession::new(1);
        assert!(session.confirm_safe(at(10)).is_none());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn confirm_during_candidate_cancels_silently() {
        let config = config();
        let mut session = EscalationSession::new(1);
        session.observe_assessment(&assessment(0.9), &config, at(10));

        let effect = session.confirm_safe(at(11));
        assert!(effect.is_none());
        assert_eq!(session.state(), SessionState::Cancelled);
    }
}
