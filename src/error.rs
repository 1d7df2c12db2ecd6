use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecorderError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecorderError {
    #[error("Invalid note format: {0}")]
    InvalidNoteFormat(String),

    #[error("Device error: {0}")]
    DeviceError(String),

    #[error("Capture error: {0}")]
    CaptureError(String),

    #[error("Write error: {0}")]
    IoWriteError(String),

    #[error("Read error: {0}")]
    IoReadError(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // Orchestrator operation called from a state that does not allow it
    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

impl RecorderError {
    /// Errors the orchestrator may recover from by repeating the same step.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RecorderError::DeviceError(_)
                | RecorderError::CaptureError(_)
                | RecorderError::IoWriteError(_)
                | RecorderError::IoReadError(_)
        )
    }
}
