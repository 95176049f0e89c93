use crate::classify::model::CrashKind;
use crate::escalation::session::{ResolutionReason, SessionId, SessionState};
use crate::signal::{GeoPoint, MotionSample};
use crate::status::SafetyLevel;
use serde::{Deserialize, Serialize};
use std::time::{Duration, UNIX_EPOCH};

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StatusSuccessResponse {
    pub level: SafetyLevel,
    pub riding: bool,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StatusErrorResponse {
    pub error_code: StatusErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusErrorCode {
    InternalError,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionBody {
    pub session_id: SessionId,
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<CrashKind>,
    pub peak_probability: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown_remaining_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionReason>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionSuccessResponse {
    pub session: SessionBody,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionErrorResponse {
    pub error_code: SessionErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionErrorCode {
    NoSession,
    InternalError,
}

/// One sample as submitted by the companion app.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SampleBody {
    pub recorded_at_unix_ms: u64,
    pub monotonic_ms: u64,
    pub accel: [f64; 3],
    pub gyro: [f64; 3],
    pub speed_mps: f64,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub altitude_m: Option<f64>,
    #[serde(default)]
    pub heading_deg: Option<f64>,
}

impl SampleBody {
    pub fn into_sample(self) -> MotionSample {
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        };
        MotionSample {
            recorded_at: UNIX_EPOCH + Duration::from_millis(self.recorded_at_unix_ms),
            monotonic_ms: self.monotonic_ms,
            accel: self.accel,
            gyro: self.gyro,
            speed_mps: self.speed_mps,
            location,
            altitude_m: self.altitude_m,
            heading_deg: self.heading_deg,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SampleBatchRequest {
    pub samples: Vec<SampleBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SamplesSuccessResponse {
    pub accepted: usize,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SamplesErrorResponse {
    pub error_code: SamplesErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SamplesErrorCode {
    EngineUnavailable,
    InternalError,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RideRequest {
    pub riding: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RideSuccessResponse {
    pub riding: bool,
    pub level: SafetyLevel,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AckSuccessResponse {
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AckErrorResponse {
    pub error_code: AckErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AckErrorCode {
    InternalError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_body_omits_absent_fields() -> Result<(), serde_json::Error> {
        let body = SessionBody {
            session_id: 3,
            state: SessionState::CandidateDetected,
            kind: None,
            peak_probability: 0.8,
            deadline: None,
            countdown_remaining_secs: None,
            resolution: None,
        };
        let value = serde_json::to_value(&body)?;

        assert_eq!(value["state"], json!("candidate_detected"));
        assert!(value.get("deadline").is_none());
        assert!(value.get("kind").is_none());
        Ok(())
    }

    #[test]
    fn error_codes_serialize_screaming_snake_case() -> Result<(), serde_json::Error> {
        assert_eq!(
            serde_json::to_value(SessionErrorCode::NoSession)?,
            json!("NO_SESSION")
        );
        assert_eq!(
            serde_json::to_value(SamplesErrorCode::EngineUnavailable)?,
            json!("ENGINE_UNAVAILABLE")
        );
        Ok(())
    }

    #[test]
    fn sample_body_converts_to_motion_sample() {
        let body = SampleBody {
            recorded_at_unix_ms: 1_000,
            monotonic_ms: 42,
            accel: [0.0, 0.0, 9.8],
            gyro: [0.1, 0.0, 0.0],
            speed_mps: 18.0,
            latitude: Some(57.7),
            longitude: Some(11.97),
            altitude_m: None,
            heading_deg: Some(270.0),
        };

        let sample = body.into_sample();

        assert_eq!(sample.monotonic_ms, 42);
        assert_eq!(sample.recorded_at, UNIX_EPOCH + Duration::from_millis(1_000));
        assert!(sample.location.is_some());
    }

    #[test]
    fn sample_without_full_fix_has_no_location() {
        let body = SampleBody {
            recorded_at_unix_ms: 0,
            monotonic_ms: 0,
            accel: [0.0; 3],
            gyro: [0.0; 3],
            speed_mps: 0.0,
            latitude: Some(57.7),
            longitude: None,
            altitude_m: None,
            heading_deg: None,
        };
        assert!(body.into_sample().location.is_none());
    }
}
