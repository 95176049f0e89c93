use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

pub mod buffer;
pub mod mock;
pub mod source;

pub const GRAVITY_MPS2: f64 = 9.80665;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// One motion/location sample from the companion device.
///
/// `recorded_at` is the wall-clock capture time; `monotonic_ms` is the
/// device-monotonic capture time used for interval arithmetic, since wall
/// clocks can step while riding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub recorded_at: SystemTime,
    pub monotonic_ms: u64,
    /// Linear acceleration [x, y, z] in m/s².
    pub accel: [f64; 3],
    /// Angular rate [x, y, z] in rad/s.
    pub gyro: [f64; 3],
    /// Instantaneous speed in m/s, derived from location.
    pub speed_mps: f64,
    pub location: Option<GeoPoint>,
    pub altitude_m: Option<f64>,
    pub heading_deg: Option<f64>,
}

impl MotionSample {
    pub fn accel_magnitude(&self) -> f64 {
        let [x, y, z] = self.accel;
        (x * x + y * y + z * z).sqrt()
    }

    pub fn gyro_magnitude(&self) -> f64 {
        let [x, y, z] = self.gyro;
        (x * x + y * y + z * z).sqrt()
    }

    pub fn accel_g(&self) -> f64 {
        self.accel_magnitude() / GRAVITY_MPS2
    }
}

/// Immutable snapshot of the signal buffer handed to the classifier.
///
/// Samples are in insertion order; the snapshot never aliases live buffer
/// state, so the classifier can hold it for as long as it likes.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalWindow {
    samples: Vec<MotionSample>,
    window: Duration,
}

impl SignalWindow {
    pub fn new(samples: Vec<MotionSample>, window: Duration) -> Self {
        Self { samples, window }
    }

    pub fn samples(&self) -> &[MotionSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn newest(&self) -> Option<&MotionSample> {
        self.samples.last()
    }

    /// Fraction of the configured window currently covered by samples, in [0, 1].
    pub fn fill_ratio(&self) -> f64 {
        if self.samples.len() < 2 || self.window.is_zero() {
            return 0.0;
        }
        let first = self.samples[0].monotonic_ms;
        let last = self.samples[self.samples.len() - 1].monotonic_ms;
        let span_ms = last.saturating_sub(first) as f64;
        (span_ms / self.window.as_millis() as f64).min(1.0)
    }

    /// Most recent reported location within the window, if any.
    pub fn last_location(&self) -> Option<GeoPoint> {
        self.samples.iter().rev().find_map(|s| s.location)
    }
}
