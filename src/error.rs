use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("sample source error: {0}")]
    Source(String),
    #[error("engine not running")]
    EngineStopped,
    #[error("watch channel send failed")]
    WatchSend,
    #[error("state lock poisoned")]
    StateLock,
}
