use moto_sentinel::classify::threshold_v1::ThresholdV1Classifier;
use moto_sentinel::escalation::EscalationEvent;
use moto_sentinel::signal::source::{ReplaySource, SampleSource};
use moto_sentinel::{api, classify, config, escalation, state};
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::Level;

fn init_tracing(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(config.log_level());
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        "moto-sentinel starting"
    );

    // Load classifier tuning
    let classifier = match config.tuning_path() {
        Some(path) => match classify::load_tuning_from_path(path) {
            Ok(classifier) => {
                tracing::info!(path = %path.display(), "Classifier tuning loaded");
                classifier
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load tuning, using default classifier");
                Box::new(ThresholdV1Classifier::with_defaults())
            }
        },
        None => {
            tracing::info!("No tuning path configured, using default classifier");
            Box::new(ThresholdV1Classifier::with_defaults())
        }
    };

    let state = Arc::new(RwLock::new(state::AppState::new()));
    let engine_config = config.engine_config();
    tracing::info!(
        window_secs = engine_config.window.as_secs(),
        cadence_ms = engine_config.cadence.as_millis(),
        countdown_secs = engine_config.session.countdown.as_secs(),
        trigger = engine_config.session.trigger_probability,
        "Detection engine configured"
    );

    let (events_tx, events_rx) = unbounded_channel();
    let (engine, core) = escalation::new_engine(classifier, &engine_config, events_tx);
    spawn_event_dispatcher(events_rx);

    let source = build_replay_source(&config);

    // Start the continuous evaluation loop
    let stop_flag = Arc::new(AtomicBool::new(false));
    let _engine_thread = escalation::spawn_engine_thread(
        core,
        source,
        Arc::clone(&state),
        engine_config.cadence,
        Arc::clone(&stop_flag),
    );

    let app = api::router(api::ApiContext {
        state: Arc::clone(&state),
        engine,
    });
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    // Signal the evaluation loop to stop
    stop_flag.store(true, std::sync::atomic::Ordering::Relaxed);

    Ok(())
}

/// Forward engine events to the notification/telephony side.
///
/// This build logs them; a deployment replaces the logging with the real
/// dispatcher, which deduplicates on session id as defense in depth.
fn spawn_event_dispatcher(mut events: UnboundedReceiver<EscalationEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                EscalationEvent::CountdownStarted {
                    session_id,
                    deadline,
                } => {
                    tracing::info!(session_id, deadline = ?deadline, "Countdown started, notifying rider");
                }
                EscalationEvent::Cancelled { session_id } => {
                    tracing::info!(session_id, "Escalation cancelled by rider");
                }
                EscalationEvent::Escalate {
                    session_id,
                    location,
                    assessment,
                } => {
                    tracing::warn!(
                        session_id,
                        kind = ?assessment.kind,
                        probability = assessment.probability,
                        location = ?location,
                        "Escalating to emergency contacts"
                    );
                }
            }
        }
    });
}

fn build_replay_source(config: &config::Config) -> Option<Box<dyn SampleSource + Send>> {
    let path = config.replay_path()?;
    match ReplaySource::from_path(path) {
        Ok(source) => {
            tracing::info!(
                path = %path.display(),
                samples = source.remaining(),
                "Replaying captured ride"
            );
            Some(Box::new(source))
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to open replay file; live ingestion only");
            None
        }
    }
}
