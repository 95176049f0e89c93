use crate::classify::model::{CrashAssessment, CrashClassifier};
use crate::escalation::EscalationEvent;
use crate::escalation::session::{
    EscalationSession, SessionConfig, SessionEffect, SessionId, SessionState, SessionView,
};
use crate::signal::buffer::SignalBuffer;
use crate::signal::{GeoPoint, MotionSample};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

/// Orchestrates buffer, classifier and the single live session.
///
/// Exclusively owns both the buffer and the session. All transitions happen
/// under the engine's one mutex; side effects leave as events on the channel
/// and are never performed here.
pub struct EscalationCoordinator {
    buffer: SignalBuffer,
    classifier: Box<dyn CrashClassifier>,
    config: SessionConfig,
    cadence: Duration,
    session: EscalationSession,
    next_session_id: SessionId,
    last_evaluation: Option<SystemTime>,
    last_location: Option<GeoPoint>,
    confirm_requested: Arc<AtomicBool>,
    events: UnboundedSender<EscalationEvent>,
}

impl EscalationCoordinator {
    pub fn new(
        classifier: Box<dyn CrashClassifier>,
        window: Duration,
        cadence: Duration,
        config: SessionConfig,
        events: UnboundedSender<EscalationEvent>,
    ) -> Self {
        Self {
            buffer: SignalBuffer::new(window),
            classifier,
            config,
            cadence,
            session: EscalationSession::new(1),
            next_session_id: 2,
            last_evaluation: None,
            last_location: None,
            confirm_requested: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    /// Flag that can be raised without holding the coordinator lock; the next
    /// tick honors it before any expiry check.
    pub fn confirm_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.confirm_requested)
    }

    pub fn ingest(&mut self, sample: MotionSample) {
        if let Some(location) = sample.location {
            self.last_location = Some(location);
        }
        self.buffer.push(sample);
    }

    /// One evaluation tick. Order is fixed: pending confirmation first, then
    /// classification on cadence, then confirmation again, then expiry — a
    /// rider who tapped "I'm okay" in the same tick as the deadline always
    /// wins.
    pub fn tick(&mut self, now: SystemTime) {
        self.apply_pending_confirm(now);

        if self.evaluation_due(now) {
            self.last_evaluation = Some(now);
            if let Some(assessment) = self.evaluate_classifier(now) {
                self.observe(&assessment, now);
            }
        }

        self.apply_pending_confirm(now);
        let effect = self.session.poll(&self.config, now);
        self.emit(effect);
    }

    /// Rider confirmed safety. Applies immediately; harmless no-op without a
    /// live session.
    pub fn confirm_safe(&mut self, now: SystemTime) {
        let effect = self.session.confirm_safe(now);
        self.emit(effect);
    }

    /// Process resumed from suspension: re-check the deadline right now
    /// instead of waiting for the next scheduled tick. A countdown that
    /// expired while suspended escalates here.
    pub fn handle_resume(&mut self, now: SystemTime) {
        self.apply_pending_confirm(now);
        let effect = self.session.poll(&self.config, now);
        self.emit(effect);
    }

    pub fn current_session(&self) -> Option<SessionView> {
        if self.session.state() == SessionState::Idle {
            None
        } else {
            Some(self.session.view())
        }
    }

    /// Remaining countdown for display. Expiry never trusts this.
    pub fn countdown_remaining(&self, now: SystemTime) -> Option<Duration> {
        if self.session.state() != SessionState::CountdownActive {
            return None;
        }
        self.session.countdown().map(|clock| clock.remaining(now))
    }

    pub fn apply_pending_confirm(&mut self, now: SystemTime) {
        if self.confirm_requested.swap(false, Ordering::SeqCst) {
            self.confirm_safe(now);
        }
    }

    fn evaluation_due(&self, now: SystemTime) -> bool {
        match self.last_evaluation {
            Some(last) => now >= last + self.cadence,
            None => true,
        }
    }

    fn evaluate_classifier(&self, now: SystemTime) -> Option<CrashAssessment> {
        let window = self.buffer.snapshot();
        let classifier = self.classifier.as_ref();
        let outcome = catch_unwind(AssertUnwindSafe(|| classifier.evaluate(&window, now)));
        let assessment = match outcome {
            Ok(assessment) => assessment?,
            Err(_) => {
                warn!("Classifier panicked; treating as no assessment this tick");
                return None;
            }
        };

        if !assessment.probability.is_finite() || !(0.0..=1.0).contains(&assessment.probability) {
            warn!(
                probability = assessment.probability,
                "Classifier returned invalid probability; discarding assessment"
            );
            return None;
        }
        Some(assessment)
    }

    fn observe(&mut self, assessment: &CrashAssessment, now: SystemTime) {
        // A terminal session is history: a fresh triggering assessment opens
        // a new session with a new id. While a session is live, no second
        // session may open; the live one absorbs the assessment instead.
        if self.session.is_terminal()
            && assessment.probability >= self.config.trigger_probability
        {
            self.session = EscalationSession::new(self.next_session_id);
            self.next_session_id += 1;
        }

        let effect = self.session.observe_assessment(assessment, &self.config, now);
        self.emit(effect);
    }

    fn emit(&mut self, effect: Option<SessionEffect>) {
        let Some(effect) = effect else {
            return;
        };
        let session_id = self.session.id();
        let event = match effect {
            SessionEffect::CountdownStarted { deadline } => EscalationEvent::CountdownStarted {
                session_id,
                deadline,
            },
            SessionEffect::Cancelled => EscalationEvent::Cancelled { session_id },
            SessionEffect::Escalate => {
                let Some(assessment) = self.session.triggering_assessment().cloned() else {
                    warn!(session_id, "Escalated session has no triggering assessment");
                    return;
                };
                let location = self
                    .last_location
                    .or_else(|| assessment.evidence.last_location());
                EscalationEvent::Escalate {
                    session_id,
                    location,
                    assessment,
                }
            }
        };
        if self.events.send(event).is_err() {
            warn!(session_id, "Event channel closed; collaborator will miss events");
        }
    }
}
