use crate::error::AppError;
use crate::escalation::session::SessionView;
use crate::status::SafetyStatus;
use std::time::Duration;
use tokio::sync::watch;

/// Shared projections published by the evaluation loop and read by the API.
///
/// The loop writes; handlers read or subscribe. The emergency latch lives
/// here because it must outlast the session that set it.
#[derive(Debug)]
pub struct AppState {
    riding: bool,
    safety: SafetyStatus,
    safety_tx: watch::Sender<SafetyStatus>,
    session: Option<SessionView>,
    session_tx: watch::Sender<Option<SessionView>>,
    countdown_remaining: Option<Duration>,
    emergency_latched: bool,
}

impl AppState {
    pub fn new() -> Self {
        let (safety_tx, _safety_rx) = watch::channel(SafetyStatus::default());
        let (session_tx, _session_rx) = watch::channel(None);
        Self {
            riding: false,
            safety: SafetyStatus::default(),
            safety_tx,
            session: None,
            session_tx,
            countdown_remaining: None,
            emergency_latched: false,
        }
    }

    pub fn riding(&self) -> bool {
        self.riding
    }

    /// Ride-activity signal from the companion app. Ending a ride is the
    /// acknowledged-outcome signal that clears the emergency latch.
    pub fn set_riding(&mut self, riding: bool) {
        self.riding = riding;
        if !riding {
            self.emergency_latched = false;
        }
    }

    pub fn safety(&self) -> SafetyStatus {
        self.safety
    }

    pub fn subscribe_safety(&self) -> watch::Receiver<SafetyStatus> {
        self.safety_tx.subscribe()
    }

    pub fn set_safety(&mut self, safety: SafetyStatus) -> Result<(), AppError> {
        self.safety = safety;
        self.safety_tx.send(safety).map_err(|_| AppError::WatchSend)
    }

    pub fn session(&self) -> Option<&SessionView> {
        self.session.as_ref()
    }

    pub fn subscribe_session(&self) -> watch::Receiver<Option<SessionView>> {
        self.session_tx.subscribe()
    }

    pub fn set_session(&mut self, session: Option<SessionView>) -> Result<(), AppError> {
        self.session = session;
        self.session_tx.send(session).map_err(|_| AppError::WatchSend)
    }

    pub fn countdown_remaining(&self) -> Option<Duration> {
        self.countdown_remaining
    }

    pub fn set_countdown_remaining(&mut self, remaining: Option<Duration>) {
        self.countdown_remaining = remaining;
    }

    pub fn emergency_latched(&self) -> bool {
        self.emergency_latched
    }

    pub fn latch_emergency(&mut self) {
        self.emergency_latched = true;
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
