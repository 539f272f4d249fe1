use thiserror::Error;

/// Failures at the engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("ffmpeg is not installed")]
    NotInstalled,
    #[error("engine is not loaded")]
    NotLoaded,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Batch-level failures. Per-task transcode failures are recorded on the
/// task itself and never surface here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("engine has not finished loading")]
    EngineUnavailable,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ffprobe did not exit successfully")]
    Failed,
    #[error("no video stream found")]
    NoVideoStream,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
}
