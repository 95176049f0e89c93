use crate::error::AppError;
use crate::signal::source::SampleSource;
use crate::signal::{GRAVITY_MPS2, GeoPoint, MotionSample};
use std::collections::VecDeque;
use std::time::{Duration, UNIX_EPOCH};

/// Baseline cruising sample: gravity on the z axis, no rotation, steady speed.
pub fn sample_at(monotonic_ms: u64) -> MotionSample {
    MotionSample {
        recorded_at: UNIX_EPOCH + Duration::from_millis(monotonic_ms),
        monotonic_ms,
        accel: [0.0, 0.0, GRAVITY_MPS2],
        gyro: [0.0, 0.0, 0.0],
        speed_mps: 20.0,
        location: Some(GeoPoint {
            latitude: 57.70,
            longitude: 11.97,
        }),
        altitude_m: None,
        heading_deg: None,
    }
}

/// Steady cruise at `step_ms` sample spacing.
pub fn cruise(start_ms: u64, count: usize, step_ms: u64) -> Vec<MotionSample> {
    (0..count)
        .map(|i| sample_at(start_ms + i as u64 * step_ms))
        .collect()
}

/// A single hard impact sample of `peak_g` total acceleration.
pub fn impact_spike(monotonic_ms: u64, peak_g: f64) -> MotionSample {
    let mut sample = sample_at(monotonic_ms);
    sample.accel = [peak_g * GRAVITY_MPS2, 0.0, 0.0];
    sample
}

/// Sharp speed drop from `from_mps` to `to_mps` across `steps` samples.
pub fn decel_ramp(
    start_ms: u64,
    from_mps: f64,
    to_mps: f64,
    steps: usize,
    step_ms: u64,
) -> Vec<MotionSample> {
    (0..steps)
        .map(|i| {
            let mut sample = sample_at(start_ms + i as u64 * step_ms);
            let progress = i as f64 / (steps.max(2) - 1) as f64;
            sample.speed_mps = from_mps + (to_mps - from_mps) * progress;
            sample
        })
        .collect()
}

/// A violent roll-rate burst of `roll_rps` around the longitudinal axis.
pub fn rollover_burst(monotonic_ms: u64, roll_rps: f64) -> MotionSample {
    let mut sample = sample_at(monotonic_ms);
    sample.gyro = [roll_rps, 0.0, 0.0];
    sample
}

/// Scripted sample source for tests: yields one prepared batch per poll, with
/// optional injected failures.
pub struct ScriptedSource {
    script: VecDeque<Result<Vec<MotionSample>, String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
        }
    }

    pub fn push_batch(mut self, batch: Vec<MotionSample>) -> Self {
        self.script.push_back(Ok(batch));
        self
    }

    pub fn push_failure(mut self, reason: &str) -> Self {
        self.script.push_back(Err(reason.to_string()));
        self
    }
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for ScriptedSource {
    fn next_batch(&mut self) -> Result<Vec<MotionSample>, AppError> {
        match self.script.pop_front() {
            Some(Ok(batch)) => Ok(batch),
            Some(Err(reason)) => Err(AppError::Source(reason)),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_source_yields_batches_then_runs_dry() -> Result<(), AppError> {
        let mut source = ScriptedSource::new()
            .push_batch(cruise(0, 3, 100))
            .push_batch(vec![impact_spike(300, 4.0)]);

        assert_eq!(source.next_batch()?.len(), 3);
        assert_eq!(source.next_batch()?.len(), 1);
        assert!(source.next_batch()?.is_empty());
        Ok(())
    }

    #[test]
    fn scripted_source_can_fail() {
        let mut source = ScriptedSource::new().push_failure("device unplugged");
        let err = source.next_batch().unwrap_err();
        assert_eq!(err.to_string(), "sample source error: device unplugged");
    }

    #[test]
    fn decel_ramp_ends_at_target_speed() {
        let ramp = decel_ramp(0, 25.0, 0.0, 5, 200);
        assert_eq!(ramp.len(), 5);
        assert!((ramp[0].speed_mps - 25.0).abs() < 1e-9);
        assert!(ramp[4].speed_mps.abs() < 1e-9);
    }
}
