use crate::classify::model::{CrashAssessment, CrashClassifier};
use crate::error::AppError;
use crate::signal::source::SampleSource;
use crate::signal::{GeoPoint, MotionSample};
use crate::state::AppState;
use crate::status;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::warn;

pub mod coordinator;
pub mod countdown;
pub mod session;

use coordinator::EscalationCoordinator;
use session::{SessionConfig, SessionId, SessionView};

/// Side-effect requests for external collaborators. The notification/telephony
/// collaborator performs the actual contact; `session_id` lets it deduplicate
/// as defense in depth.
#[derive(Debug, Clone)]
pub enum EscalationEvent {
    CountdownStarted {
        session_id: SessionId,
        deadline: SystemTime,
    },
    Cancelled {
        session_id: SessionId,
    },
    Escalate {
        session_id: SessionId,
        location: Option<GeoPoint>,
        assessment: CrashAssessment,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub window: Duration,
    pub cadence: Duration,
    pub session: SessionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(8),
            cadence: Duration::from_secs(1),
            session: SessionConfig::default(),
        }
    }
}

/// Shared entry points for collaborators: the API handlers submit samples,
/// confirm safety and read the session through this handle while the engine
/// thread drives evaluation.
#[derive(Clone)]
pub struct EngineHandle {
    coordinator: Arc<Mutex<EscalationCoordinator>>,
    confirm_flag: Arc<AtomicBool>,
    ingress: UnboundedSender<MotionSample>,
}

impl EngineHandle {
    /// Queue a sample for the evaluation loop. The loop is the single writer
    /// of the signal buffer; producers never touch it directly.
    pub fn submit_sample(&self, sample: MotionSample) -> Result<(), AppError> {
        self.ingress
            .send(sample)
            .map_err(|_| AppError::EngineStopped)
    }

    /// Rider confirmed safety. The flag is raised first so an in-flight tick
    /// honors it before any expiry check, then the transition is applied
    /// immediately under the coordinator lock.
    pub fn confirm_safe(&self) -> Result<(), AppError> {
        self.confirm_flag.store(true, Ordering::SeqCst);
        let mut guard = self.coordinator.lock().map_err(|_| AppError::StateLock)?;
        guard.apply_pending_confirm(SystemTime::now());
        Ok(())
    }

    /// App lifecycle signal: resumed from suspension. Re-checks the countdown
    /// deadline right away instead of waiting for the next cycle.
    pub fn notify_resumed(&self) -> Result<(), AppError> {
        let mut guard = self.coordinator.lock().map_err(|_| AppError::StateLock)?;
        guard.handle_resume(SystemTime::now());
        Ok(())
    }

    pub fn current_session(&self) -> Result<Option<SessionView>, AppError> {
        let guard = self.coordinator.lock().map_err(|_| AppError::StateLock)?;
        Ok(guard.current_session())
    }
}

/// Loop-owned half of the engine: the ingress receiver cannot be shared.
pub struct EngineCore {
    coordinator: Arc<Mutex<EscalationCoordinator>>,
    ingress: UnboundedReceiver<MotionSample>,
}

pub fn new_engine(
    classifier: Box<dyn CrashClassifier>,
    config: &EngineConfig,
    events: UnboundedSender<EscalationEvent>,
) -> (EngineHandle, EngineCore) {
    let coordinator = EscalationCoordinator::new(
        classifier,
        config.window,
        config.cadence,
        config.session.clone(),
        events,
    );
    let confirm_flag = coordinator.confirm_flag();
    let coordinator = Arc::new(Mutex::new(coordinator));
    let (ingress_tx, ingress_rx) = unbounded_channel();

    (
        EngineHandle {
            coordinator: Arc::clone(&coordinator),
            confirm_flag,
            ingress: ingress_tx,
        },
        EngineCore {
            coordinator,
            ingress: ingress_rx,
        },
    )
}

/// One evaluation cycle: pull samples, tick the coordinator, publish the
/// resulting projections into shared state.
pub fn run_cycle<'a>(
    core: &mut EngineCore,
    source: Option<&mut (dyn SampleSource + Send + 'a)>,
    state: &Arc<RwLock<AppState>>,
    now: SystemTime,
) -> Result<(), AppError> {
    let polled = match source {
        Some(source) => match source.next_batch() {
            Ok(batch) => batch,
            Err(err) => {
                warn!(error = %err, "Sample source poll failed");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let (session_view, remaining) = {
        let mut coordinator = core.coordinator.lock().map_err(|_| AppError::StateLock)?;
        for sample in polled {
            coordinator.ingest(sample);
        }
        while let Ok(sample) = core.ingress.try_recv() {
            coordinator.ingest(sample);
        }
        coordinator.tick(now);
        (
            coordinator.current_session(),
            coordinator.countdown_remaining(now),
        )
    };

    let mut guard = state.write().map_err(|_| AppError::StateLock)?;
    // Latch only on the transition into Escalated; re-latching a stale
    // terminal session would undo a rider's acknowledgement.
    let is_escalated = matches!(
        session_view.map(|v| v.state),
        Some(session::SessionState::Escalated)
    );
    let was_escalated = guard.session().is_some_and(|previous| {
        previous.state == session::SessionState::Escalated
            && Some(previous.id) == session_view.map(|v| v.id)
    });
    if is_escalated && !was_escalated {
        guard.latch_emergency();
    }
    let safety = status::derive_status(
        guard.riding(),
        session_view.as_ref(),
        guard.emergency_latched(),
    );
    guard.set_session(session_view)?;
    guard.set_countdown_remaining(remaining);
    guard.set_safety(safety)?;
    Ok(())
}

/// Spawn the continuous evaluation loop.
pub fn spawn_engine_thread(
    mut core: EngineCore,
    mut source: Option<Box<dyn SampleSource + Send>>,
    state: Arc<RwLock<AppState>>,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();

            if let Err(e) = run_cycle(&mut core, source.as_deref_mut(), &state, SystemTime::now()) {
                warn!("Error running evaluation cycle: {}", e);
            }

            sleep_with_stop(interval, &stop, cycle_start);
        }
    })
}

fn sleep_with_stop(duration: Duration, stop: &AtomicBool, start: Instant) {
    let elapsed = start.elapsed();
    if elapsed >= duration {
        return;
    }
    let remaining = duration - elapsed;
    let step = Duration::from_millis(100);
    let mut slept = Duration::ZERO;

    while slept < remaining {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        std::thread::sleep(step);
        slept += step;
    }
}
