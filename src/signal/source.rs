use crate::error::AppError;
use crate::signal::MotionSample;
use std::collections::VecDeque;
use std::path::Path;

/// Where motion samples come from.
///
/// The engine loop polls the configured source once per cycle; collaborators
/// can also push samples directly through the API, so a source is optional.
pub trait SampleSource {
    fn next_batch(&mut self) -> Result<Vec<MotionSample>, AppError>;
}

/// Replays a captured ride from a JSONL file, one `MotionSample` per line.
///
/// Used for development and tuning runs without a paired device.
#[derive(Debug)]
pub struct ReplaySource {
    pending: VecDeque<MotionSample>,
    batch_size: usize,
}

pub const DEFAULT_REPLAY_BATCH: usize = 32;

impl ReplaySource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let contents = std::fs::read_to_string(&path)
            .map_err(|err| AppError::Source(format!("failed to read replay file: {err}")))?;
        let mut pending = VecDeque::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let sample: MotionSample = serde_json::from_str(line).map_err(|err| {
                AppError::Source(format!("replay line {}: {err}", line_no + 1))
            })?;
            pending.push_back(sample);
        }
        Ok(Self {
            pending,
            batch_size: DEFAULT_REPLAY_BATCH,
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl SampleSource for ReplaySource {
    fn next_batch(&mut self) -> Result<Vec<MotionSample>, AppError> {
        let take = self.batch_size.min(self.pending.len());
        Ok(self.pending.drain(..take).collect())
    }
}
