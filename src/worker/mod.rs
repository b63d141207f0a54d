mod pool;
mod task;
mod error;

pub use pool::WorkerPool;
pub use task::OptimizeHandle;
pub use error::{WorkerError, WorkerResult};
