// Module declarations in dependency order
pub mod codec;
pub mod utils;
pub mod processing;
pub mod worker;
pub mod core;

#[cfg(test)]
mod test_support;

// Public exports for external consumers
pub use crate::core::{
    OptimizationResult, OptimizeOptions, OptimizeOutput, OptimizeTask, OptimizedImage, Optimizer,
    OutputTarget, PoolConfig, StripFlags, Versions, versions,
};
pub use crate::utils::{OptimizeError, OptimizeResult, PreconditionError};
pub use crate::worker::{OptimizeHandle, WorkerError};
