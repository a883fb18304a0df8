use thiserror::Error;

/// Error taxonomy for the capture pipeline. Hardware callback errors are
/// converted into these at the boundary; no raw backend failure reaches the
/// host in any other form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    /// Camera missing, disconnected, or failed to open. Aborts the current
    /// operation without crashing the process.
    #[error("camera hardware unavailable: {0}")]
    HardwareUnavailable(String),

    /// The capture session could not be configured; state reverts to preview.
    #[error("session configuration failed: {0}")]
    SessionConfigureFailed(String),

    /// A single still capture failed. Per-request; the session survives.
    #[error("capture failed: {0}")]
    CaptureFailed(String),

    /// Recording failed or was interrupted. The partial output is deleted.
    #[error("recording failed: {0}")]
    RecordingFailed(String),

    /// Camera, microphone, or storage permission missing for the requested mode.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Decoding a captured buffer failed, typically under memory pressure.
    /// Soft failure: no image is delivered.
    #[error("image decode failed: {0}")]
    DecodeError(String),

    #[error("io error: {0}")]
    IoError(String),

    #[error("config error: {0}")]
    ConfigError(String),

    /// The camera open lock was not acquired within the bounded wait.
    /// Fatal to that open attempt; never retried automatically.
    #[error("timed out waiting to lock camera opening")]
    OpenTimeout,
}
