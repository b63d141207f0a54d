#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Worker pool is closed: {0}")]
    CapacityError(String),

    #[error("Task processing failed: {0}")]
    ProcessingError(String),

    #[error("No async runtime available to schedule the task")]
    NoRuntime,
}

pub type WorkerResult<T> = Result<T, WorkerError>;

impl From<tokio::sync::AcquireError> for WorkerError {
    fn from(err: tokio::sync::AcquireError) -> Self {
        WorkerError::CapacityError(format!("Failed to acquire worker: {}", err))
    }
}

impl From<tokio::task::JoinError> for WorkerError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            WorkerError::ProcessingError("Worker panicked while optimizing".to_string())
        } else {
            WorkerError::ProcessingError(format!("Worker task did not complete: {}", err))
        }
    }
}

impl From<tokio::runtime::TryCurrentError> for WorkerError {
    fn from(_: tokio::runtime::TryCurrentError) -> Self {
        WorkerError::NoRuntime
    }
}
