use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub mod model;
pub mod threshold_v1;

use model::{ClassifierTuning, CrashClassifier};
use threshold_v1::{ThresholdV1Classifier, ThresholdV1Params};

/// On-disk tuning file selecting the classifier and its parameters.
#[derive(Debug, Deserialize)]
pub struct TuningFile {
    pub model: String,
    pub report_floor: Option<f64>,
    pub min_fill_ratio: Option<f64>,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum TuningError {
    #[error("failed to read tuning file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse tuning file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid tuning: {0}")]
    Invalid(String),
}

// Classifier factory
pub fn create_classifier(
    tuning_file: &TuningFile,
) -> Result<Box<dyn CrashClassifier>, TuningError> {
    let defaults = ClassifierTuning::default();
    let tuning = ClassifierTuning {
        report_floor: tuning_file.report_floor.unwrap_or(defaults.report_floor),
        min_fill_ratio: tuning_file
            .min_fill_ratio
            .unwrap_or(defaults.min_fill_ratio),
    };

    match tuning_file.model.as_str() {
        "threshold_v1" => {
            let params: ThresholdV1Params = if tuning_file.params.is_null() {
                ThresholdV1Params::default()
            } else {
                serde_json::from_value(tuning_file.params.clone())?
            };
            Ok(Box::new(ThresholdV1Classifier::new(params, tuning)))
        }
        other => Err(TuningError::Invalid(format!("unknown model: {other}"))),
    }
}

pub fn load_tuning_from_path(
    path: impl AsRef<Path>,
) -> Result<Box<dyn CrashClassifier>, TuningError> {
    let contents = std::fs::read_to_string(path)?;
    let tuning_file: TuningFile = serde_json::from_str(&contents)?;
    create_classifier(&tuning_file)
}
