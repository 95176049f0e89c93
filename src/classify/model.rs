//! Classifier trait for pluggable crash scoring.
//!
//! Models are selected via `tuning.json` and loaded at startup. A classifier
//! is a pure function of the window it is given: same window, same tuning,
//! same answer. The engine treats anything else it might do (panic, NaN) as
//! "no assessment this tick".

use crate::signal::SignalWindow;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Best-effort classification of what the signal looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashKind {
    Impact,
    SuddenDeceleration,
    Rollover,
    Unknown,
}

/// One evaluation result. Value type; never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CrashAssessment {
    pub kind: CrashKind,
    /// Relative confidence in [0, 1].
    pub probability: f64,
    /// The window snapshot that produced this assessment.
    pub evidence: SignalWindow,
    pub produced_at: SystemTime,
}

/// Thresholds shared by all classifiers, loaded from `tuning.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierTuning {
    /// Probabilities below this are not reported at all; keeps benign riding
    /// from manufacturing assessments every tick.
    pub report_floor: f64,
    /// Minimum window fill ratio before the classifier will evaluate.
    pub min_fill_ratio: f64,
}

impl Default for ClassifierTuning {
    fn default() -> Self {
        Self {
            report_floor: 0.10,
            min_fill_ratio: 0.25,
        }
    }
}

/// Trait for crash scoring models.
///
/// Implementations must be deterministic over the provided window (`now` only
/// stamps `produced_at`) and must not retain state between calls.
pub trait CrashClassifier: Send + Sync + std::fmt::Debug {
    /// Score a window snapshot. Returns `None` while the window is still
    /// filling or when the signal is clearly benign.
    fn evaluate(&self, window: &SignalWindow, now: SystemTime) -> Option<CrashAssessment>;

    fn tuning(&self) -> &ClassifierTuning;
}
