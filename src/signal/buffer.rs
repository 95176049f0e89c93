use crate::signal::{MotionSample, SignalWindow};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

/// Out-of-order samples older than this relative to the newest accepted
/// sample are dropped. Covers normal delivery jitter between the motion and
/// location providers on the companion device.
pub const CLOCK_SKEW_TOLERANCE: Duration = Duration::from_millis(250);

/// Sliding time window over motion samples.
///
/// The evaluation loop is the only writer; readers get an immutable
/// `SignalWindow` copy via `snapshot()`.
#[derive(Debug)]
pub struct SignalBuffer {
    samples: VecDeque<MotionSample>,
    window: Duration,
    newest_ms: Option<u64>,
}

impl SignalBuffer {
    pub fn new(window: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            window,
            newest_ms: None,
        }
    }

    /// Append a sample, evicting anything older than the window relative to
    /// the newest sample. Returns false when the sample is dropped as
    /// out-of-order or a duplicate; that is expected jitter, not a failure.
    pub fn push(&mut self, sample: MotionSample) -> bool {
        if let Some(newest_ms) = self.newest_ms {
            let tolerance_ms = CLOCK_SKEW_TOLERANCE.as_millis() as u64;
            if sample.monotonic_ms == newest_ms {
                debug!(monotonic_ms = sample.monotonic_ms, "Dropping duplicate sample");
                return false;
            }
            if sample.monotonic_ms < newest_ms.saturating_sub(tolerance_ms) {
                debug!(
                    monotonic_ms = sample.monotonic_ms,
                    newest_ms, "Dropping out-of-order sample"
                );
                return false;
            }
        }

        self.newest_ms = Some(self.newest_ms.map_or(sample.monotonic_ms, |newest| {
            newest.max(sample.monotonic_ms)
        }));
        self.samples.push_back(sample);
        self.evict();
        true
    }

    /// Immutable copy of the current window contents.
    pub fn snapshot(&self) -> SignalWindow {
        SignalWindow::new(self.samples.iter().copied().collect(), self.window)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn evict(&mut self) {
        let Some(newest_ms) = self.newest_ms else {
            return;
        };
        let window_ms = self.window.as_millis() as u64;
        while let Some(front) = self.samples.front() {
            if newest_ms.saturating_sub(front.monotonic_ms) > window_ms {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}
