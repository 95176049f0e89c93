use crate::api::responses::{
    AckErrorCode, AckErrorResponse, AckSuccessResponse, RideRequest, RideSuccessResponse,
    SampleBatchRequest, SamplesErrorCode, SamplesErrorResponse, SamplesSuccessResponse,
    SessionBody, SessionErrorCode, SessionErrorResponse, SessionSuccessResponse, StatusErrorCode,
    StatusErrorResponse, StatusSuccessResponse,
};
use crate::error::AppError;
use crate::escalation::EngineHandle;
use crate::state::AppState;
use crate::status::derive_status;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::error;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Everything the handlers need: the published projections plus the engine
/// entry points for samples, confirmation and lifecycle signals.
#[derive(Clone)]
pub struct ApiContext {
    pub state: Arc<RwLock<AppState>>,
    pub engine: EngineHandle,
}

pub enum StatusResponse {
    Success(StatusSuccessResponse),
    Error {
        status: StatusCode,
        body: StatusErrorResponse,
    },
}

impl IntoResponse for StatusResponse {
    fn into_response(self) -> Response {
        match self {
            StatusResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            StatusResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_status(State(context): State<ApiContext>) -> impl IntoResponse {
    build_status_response(&context.state, SystemTime::now())
}

pub enum SessionResponse {
    Success(SessionSuccessResponse),
    Error {
        status: StatusCode,
        body: SessionErrorResponse,
    },
}

impl IntoResponse for SessionResponse {
    fn into_response(self) -> Response {
        match self {
            SessionResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            SessionResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_session(State(context): State<ApiContext>) -> impl IntoResponse {
    build_session_response(&context.state, SystemTime::now())
}

pub enum SamplesResponse {
    Success(SamplesSuccessResponse),
    Error {
        status: StatusCode,
        body: SamplesErrorResponse,
    },
}

impl IntoResponse for SamplesResponse {
    fn into_response(self) -> Response {
        match self {
            SamplesResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            SamplesResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn post_samples(
    State(context): State<ApiContext>,
    Json(request): Json<SampleBatchRequest>,
) -> impl IntoResponse {
    build_samples_response(&context.engine, request, SystemTime::now())
}

pub enum RideResponse {
    Success(RideSuccessResponse),
    Error {
        status: StatusCode,
        body: AckErrorResponse,
    },
}

impl IntoResponse for RideResponse {
    fn into_response(self) -> Response {
        match self {
            RideResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            RideResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn post_ride(
    State(context): State<ApiContext>,
    Json(request): Json<RideRequest>,
) -> impl IntoResponse {
    build_ride_response(&context.state, request, SystemTime::now())
}

pub enum AckResponse {
    Success(AckSuccessResponse),
    Error {
        status: StatusCode,
        body: AckErrorResponse,
    },
}

impl IntoResponse for AckResponse {
    fn into_response(self) -> Response {
        match self {
            AckResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            AckResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn post_confirm(State(context): State<ApiContext>) -> impl IntoResponse {
    build_confirm_response(&context.engine, SystemTime::now())
}

pub async fn post_resume(State(context): State<ApiContext>) -> impl IntoResponse {
    build_resume_response(&context.engine, SystemTime::now())
}

fn build_status_response(state: &Arc<RwLock<AppState>>, now: SystemTime) -> StatusResponse {
    let safety = match state.read() {
        Ok(guard) => guard.safety(),
        Err(_) => {
            return status_internal_error("state lock poisoned while reading safety status");
        }
    };

    match format_timestamp(now) {
        Ok(timestamp) => StatusResponse::Success(StatusSuccessResponse {
            level: safety.level,
            riding: safety.riding,
            timestamp,
        }),
        Err(_) => status_internal_error("timestamp formatting failure"),
    }
}

fn status_internal_error(message: &str) -> StatusResponse {
    error!(message = message, "Internal error while handling /api/status");
    StatusResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: StatusErrorResponse {
            error_code: StatusErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

fn build_session_response(state: &Arc<RwLock<AppState>>, now: SystemTime) -> SessionResponse {
    let (session, remaining) = match state.read() {
        Ok(guard) => (guard.session().copied(), guard.countdown_remaining()),
        Err(_) => {
            return session_internal_error("state lock poisoned while reading session");
        }
    };

    let Some(view) = session else {
        let timestamp = match format_timestamp(now) {
            Ok(formatted) => formatted,
            Err(_) => return session_internal_error("timestamp formatting failure"),
        };
        return SessionResponse::Error {
            status: StatusCode::NOT_FOUND,
            body: SessionErrorResponse {
                error_code: SessionErrorCode::NoSession,
                error_message: "No escalation session".to_string(),
                timestamp,
            },
        };
    };

    let deadline = match view.deadline.map(format_timestamp).transpose() {
        Ok(formatted) => formatted,
        Err(_) => return session_internal_error("deadline formatting failure"),
    };
    let timestamp = match format_timestamp(now) {
        Ok(formatted) => formatted,
        Err(_) => return session_internal_error("timestamp formatting failure"),
    };

    SessionResponse::Success(SessionSuccessResponse {
        session: SessionBody {
            session_id: view.id,
            state: view.state,
            kind: view.kind,
            peak_probability: view.peak_probability,
            deadline,
            countdown_remaining_secs: remaining.map(|r| r.as_secs()),
            resolution: view.resolution,
        },
        timestamp,
    })
}

fn session_internal_error(message: &str) -> SessionResponse {
    error!(message = message, "Internal error while handling /api/session");
    SessionResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: SessionErrorResponse {
            error_code: SessionErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

fn build_samples_response(
    engine: &EngineHandle,
    request: SampleBatchRequest,
    now: SystemTime,
) -> SamplesResponse {
    let mut accepted = 0;
    for body in request.samples {
        match engine.submit_sample(body.into_sample()) {
            Ok(()) => accepted += 1,
            Err(AppError::EngineStopped) => {
                return samples_error(
                    StatusCode::SERVICE_UNAVAILABLE,
                    SamplesErrorCode::EngineUnavailable,
                    "Evaluation engine is not running",
                );
            }
            Err(err) => {
                error!(error = %err, "Failed to submit sample");
                return samples_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    SamplesErrorCode::InternalError,
                    INTERNAL_ERROR_MESSAGE,
                );
            }
        }
    }

    match format_timestamp(now) {
        Ok(timestamp) => SamplesResponse::Success(SamplesSuccessResponse {
            accepted,
            timestamp,
        }),
        Err(_) => samples_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            SamplesErrorCode::InternalError,
            INTERNAL_ERROR_MESSAGE,
        ),
    }
}

fn samples_error(
    status: StatusCode,
    error_code: SamplesErrorCode,
    message: &str,
) -> SamplesResponse {
    SamplesResponse::Error {
        status,
        body: SamplesErrorResponse {
            error_code,
            error_message: message.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

fn build_ride_response(
    state: &Arc<RwLock<AppState>>,
    request: RideRequest,
    now: SystemTime,
) -> RideResponse {
    let mut guard = match state.write() {
        Ok(guard) => guard,
        Err(_) => {
            return ride_internal_error("state lock poisoned while updating ride activity");
        }
    };

    guard.set_riding(request.riding);
    let safety = derive_status(
        guard.riding(),
        guard.session(),
        guard.emergency_latched(),
    );
    if guard.set_safety(safety).is_err() {
        return ride_internal_error("failed to publish safety status");
    }
    drop(guard);

    match format_timestamp(now) {
        Ok(timestamp) => RideResponse::Success(RideSuccessResponse {
            riding: request.riding,
            level: safety.level,
            timestamp,
        }),
        Err(_) => ride_internal_error("timestamp formatting failure"),
    }
}

fn ride_internal_error(message: &str) -> RideResponse {
    error!(message = message, "Internal error while handling /api/ride");
    RideResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ack_error_body(),
    }
}

fn build_confirm_response(engine: &EngineHandle, now: SystemTime) -> AckResponse {
    if let Err(err) = engine.confirm_safe() {
        error!(error = %err, "Failed to apply safety confirmation");
        return ack_internal_error();
    }
    ack_success(now)
}

fn build_resume_response(engine: &EngineHandle, now: SystemTime) -> AckResponse {
    if let Err(err) = engine.notify_resumed() {
        error!(error = %err, "Failed to apply resume signal");
        return ack_internal_error();
    }
    ack_success(now)
}

fn ack_success(now: SystemTime) -> AckResponse {
    match format_timestamp(now) {
        Ok(timestamp) => AckResponse::Success(AckSuccessResponse { timestamp }),
        Err(_) => ack_internal_error(),
    }
}

fn ack_internal_error() -> AckResponse {
    AckResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ack_error_body(),
    }
}

fn ack_error_body() -> AckErrorResponse {
    AckErrorResponse {
        error_code: AckErrorCode::InternalError,
        error_message: INTERNAL_ERROR_MESSAGE.to_string(),
        timestamp: fallback_timestamp(),
    }
}

fn format_timestamp(timestamp: SystemTime) -> Result<String, time::error::Format> {
    OffsetDateTime::from(timestamp).format(&Rfc3339)
}

fn fallback_timestamp() -> String {
    format_timestamp(SystemTime::now()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format error timestamp");
        "1970-01-01T00:00:00Z".to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::threshold_v1::ThresholdV1Classifier;
    use crate::escalation::session::{SessionState, SessionView};
    use crate::escalation::{EngineConfig, new_engine};
    use crate::status::{SafetyLevel, SafetyStatus};
    use std::time::{Duration, UNIX_EPOCH};
    use tokio::sync::mpsc::unbounded_channel;

    // The core must stay alive or sample submission reports EngineStopped.
    fn test_engine() -> (EngineHandle, crate::escalation::EngineCore) {
        let (events_tx, _events_rx) = unbounded_channel();
        new_engine(
            Box::new(ThresholdV1Classifier::with_defaults()),
            &EngineConfig::default(),
            events_tx,
        )
    }

    fn shared_state() -> Arc<RwLock<AppState>> {
        Arc::new(RwLock::new(AppState::new()))
    }

    fn view(state: SessionState) -> SessionView {
        SessionView {
            id: 1,
            state,
            kind: None,
            peak_probability: 0.9,
            deadline: Some(UNIX_EPOCH + Duration::from_secs(100)),
            resolved_at: None,
            resolution: None,
        }
    }

    #[test]
    fn status_reflects_published_safety() {
        let state = shared_state();
        state
            .write()
            .expect("state lock")
            .set_safety(SafetyStatus {
                level: SafetyLevel::CrashDetected,
                riding: true,
            })
            .expect("set safety");

        let response = build_status_response(&state, UNIX_EPOCH);
        let StatusResponse::Success(body) = response else {
            panic!("expected success");
        };
        assert_eq!(body.level, SafetyLevel::CrashDetected);
        assert!(body.riding);
    }

    #[test]
    fn session_endpoint_returns_not_found_without_a_session() {
        let state = shared_state();
        let response = build_session_response(&state, UNIX_EPOCH);
        let SessionResponse::Error { status, body } = response else {
            panic!("expected error");
        };
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error_code, SessionErrorCode::NoSession);
    }

    #[test]
    fn session_endpoint_renders_countdown_details() {
        let state = shared_state();
        {
            let mut guard = state.write().expect("state lock");
            guard
                .set_session(Some(view(SessionState::CountdownActive)))
                .expect("set session");
            guard.set_countdown_remaining(Some(Duration::from_secs(30)));
        }

        let response = build_session_response(&state, UNIX_EPOCH);
        let SessionResponse::Success(body) = response else {
            panic!("expected success");
        };
        assert_eq!(body.session.state, SessionState::CountdownActive);
        assert_eq!(body.session.countdown_remaining_secs, Some(30));
        assert!(body.session.deadline.is_some());
    }

    #[test]
    fn samples_are_accepted_while_the_engine_lives() {
        let (engine, _core) = test_engine();
        let request = SampleBatchRequest {
            samples: vec![
                crate::api::responses::SampleBody {
                    recorded_at_unix_ms: 0,
                    monotonic_ms: 0,
                    accel: [0.0, 0.0, 9.8],
                    gyro: [0.0; 3],
                    speed_mps: 15.0,
                    latitude: None,
                    longitude: None,
                    altitude_m: None,
                    heading_deg: None,
                },
                crate::api::responses::SampleBody {
                    recorded_at_unix_ms: 100,
                    monotonic_ms: 100,
                    accel: [0.0, 0.0, 9.8],
                    gyro: [0.0; 3],
                    speed_mps: 15.1,
                    latitude: None,
                    longitude: None,
                    altitude_m: None,
                    heading_deg: None,
                },
            ],
        };

        let response = build_samples_response(&engine, request, UNIX_EPOCH);
        let SamplesResponse::Success(body) = response else {
            panic!("expected success");
        };
        assert_eq!(body.accepted, 2);
    }

    #[test]
    fn confirm_without_a_live_session_is_still_ok() {
        let (engine, _core) = test_engine();
        let response = build_confirm_response(&engine, UNIX_EPOCH);
        assert!(matches!(response, AckResponse::Success(_)));
    }

    #[test]
    fn ending_the_ride_clears_emergency_and_reports_safe() {
        let state = shared_state();
        {
            let mut guard = state.write().expect("state lock");
            guard.set_riding(true);
            guard.latch_emergency();
        }

        let response = build_ride_response(&state, RideRequest { riding: false }, UNIX_EPOCH);
        let RideResponse::Success(body) = response else {
            panic!("expected success");
        };
        assert!(!body.riding);
        assert_eq!(body.level, SafetyLevel::Safe);
        assert!(!state.read().expect("state lock").emergency_latched());
    }
}
