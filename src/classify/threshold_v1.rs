//! Threshold V1 classifier.
//!
//! Three kinematic signatures are each mapped through a monotonic ramp onto
//! [0, 1]; the overall probability is the maximum sub-score. A strictly more
//! extreme impulse can therefore never score lower than a milder one.

use crate::classify::model::{ClassifierTuning, CrashAssessment, CrashClassifier, CrashKind};
use crate::signal::SignalWindow;
use std::time::SystemTime;

use serde::Deserialize;

/// Horizon over which a speed drop counts as one braking/impact event.
const DECEL_HORIZON_MS: u64 = 1_000;
/// Floor for the drop interval, so two nearly-coincident samples cannot
/// manufacture an absurd deceleration rate.
const MIN_DECEL_INTERVAL_S: f64 = 0.1;
/// Sub-scores closer together than this do not pick a single kind.
const KIND_MARGIN: f64 = 0.05;

/// Threshold V1 parameters. Low/high bound the ramp for each signature.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdV1Params {
    pub impact_low_g: f64,
    pub impact_high_g: f64,
    pub decel_low_mps2: f64,
    pub decel_high_mps2: f64,
    pub roll_low_rps: f64,
    pub roll_high_rps: f64,
}

impl Default for ThresholdV1Params {
    fn default() -> Self {
        Self {
            // Street-riding impacts read well above 1.6 g total acceleration.
            impact_low_g: 1.6,
            impact_high_g: 3.5,
            decel_low_mps2: 6.0,
            decel_high_mps2: 14.0,
            roll_low_rps: 3.0,
            roll_high_rps: 7.0,
        }
    }
}

#[derive(Debug)]
pub struct ThresholdV1Classifier {
    pub params: ThresholdV1Params,
    pub tuning: ClassifierTuning,
}

impl ThresholdV1Classifier {
    pub fn new(params: ThresholdV1Params, tuning: ClassifierTuning) -> Self {
        Self { params, tuning }
    }

    pub fn with_defaults() -> Self {
        Self::new(ThresholdV1Params::default(), ClassifierTuning::default())
    }

    fn peak_accel_g(&self, window: &SignalWindow) -> f64 {
        window
            .samples()
            .iter()
            .map(|s| s.accel_g())
            .fold(0.0, f64::max)
    }

    fn peak_roll_rate(&self, window: &SignalWindow) -> f64 {
        window
            .samples()
            .iter()
            .map(|s| s.gyro_magnitude())
            .fold(0.0, f64::max)
    }

    /// Largest sustained speed-drop rate (m/s²) within the decel horizon.
    fn peak_decel(&self, window: &SignalWindow) -> f64 {
        let samples = window.samples();
        let mut peak = 0.0_f64;
        for (i, earlier) in samples.iter().enumerate() {
            for later in &samples[i + 1..] {
                let dt_ms = later.monotonic_ms.saturating_sub(earlier.monotonic_ms);
                if dt_ms > DECEL_HORIZON_MS {
                    break;
                }
                let drop = earlier.speed_mps - later.speed_mps;
                if drop <= 0.0 {
                    continue;
                }
                let dt_s = (dt_ms as f64 / 1_000.0).max(MIN_DECEL_INTERVAL_S);
                peak = peak.max(drop / dt_s);
            }
        }
        peak
    }
}

fn ramp(value: f64, low: f64, high: f64) -> f64 {
    if high <= low {
        return if value >= high { 1.0 } else { 0.0 };
    }
    ((value - low) / (high - low)).clamp(0.0, 1.0)
}

impl CrashClassifier for ThresholdV1Classifier {
    fn evaluate(&self, window: &SignalWindow, now: SystemTime) -> Option<CrashAssessment> {
        if window.fill_ratio() < self.tuning.min_fill_ratio {
            return None;
        }

        let impact = ramp(
            self.peak_accel_g(window),
            self.params.impact_low_g,
            self.params.impact_high_g,
        );
        let decel = ramp(
            self.peak_decel(window),
            self.params.decel_low_mps2,
            self.params.decel_high_mps2,
        );
        let roll = ramp(
            self.peak_roll_rate(window),
            self.params.roll_low_rps,
            self.params.roll_high_rps,
        );

        let probability = impact.max(decel).max(roll);
        if probability < self.tuning.report_floor {
            return None;
        }

        let mut scored = [
            (CrashKind::Impact, impact),
            (CrashKind::SuddenDeceleration, decel),
            (CrashKind::Rollover, roll),
        ];
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        let kind = if scored[0].1 - scored[1].1 < KIND_MARGIN {
            CrashKind::Unknown
        } else {
            scored[0].0
        };

        Some(CrashAssessment {
            kind,
            probability,
            evidence: window.clone(),
            produced_at: now,
        })
    }

    fn tuning(&self) -> &ClassifierTuning {
        &self.tuning
    }
}
